//! HSTX command lists.
//!
//! The serialiser's command expander consumes a stream of command words:
//! each carries an opcode in the upper bits and a pixel-clock count in the
//! lower 12, followed by inline data words. A scanout line is one such
//! stream; the DMA ping/pong channels feed one line's stream per IRQ. The
//! lists are built once at mode set from the output timing, so the ISR only
//! ever patches read addresses and the island slot.
//!
//! Three line shapes exist: plain blanking (vsync on or off), blanking with
//! a data island spliced into the back porch, and the active-line prefix
//! that ends in TMDS pixel data.

use crate::timing::OutputTiming;
use packet::terc4::{ctrl_symbol, CTRL_00};
use packet::{preamble_symbol, DataIsland, SyncLevels, W_DATA_ISLAND, W_PREAMBLE};

/// Command opcodes, in bits 12+ of the command word.
pub const CMD_RAW: u32 = 0x0 << 12;
pub const CMD_RAW_REPEAT: u32 = 0x1 << 12;
pub const CMD_TMDS: u32 = 0x2 << 12;
pub const CMD_TMDS_REPEAT: u32 = 0x3 << 12;
pub const CMD_NOP: u32 = 0xF << 12;

/// A 30-bit symbol triplet with `sym` on lane 0 and idle control symbols on
/// the data lanes.
fn sync_word(hsync: bool, vsync: bool) -> u32 {
    ctrl_symbol(hsync, vsync) | (CTRL_00 << 10) | (CTRL_00 << 20)
}

/// A preamble triplet announcing a data island.
fn preamble_word(vsync: bool) -> u32 {
    preamble_symbol(SyncLevels { hsync: true, vsync })
}

/// Plain blanking line: front porch, sync pulse, back porch + unlit active.
/// Sync levels are logical; the pulse drives hsync low (and vsync low on
/// vsync lines) for this negative-polarity mode.
pub fn vblank_line(t: &OutputTiming, vsync_pulse: bool) -> [u32; 7] {
    let v = !vsync_pulse;
    [
        CMD_RAW_REPEAT | t.h_front_porch as u32,
        sync_word(true, v),
        CMD_RAW_REPEAT | t.h_sync_width as u32,
        sync_word(false, v),
        CMD_RAW_REPEAT | (t.h_back_porch + t.h_active) as u32,
        sync_word(true, v),
        CMD_NOP,
    ]
}

/// Length of an island-bearing blanking line, in words: the seven-word
/// blanking prefix (whose last word announces the island), the 36 island
/// words, and the two-word idle tail.
pub const ISLAND_LINE_WORDS: usize = 7 + W_DATA_ISLAND + 2;

/// Word offset of the island slot inside [`island_line`]'s output.
pub const ISLAND_SLOT_OFFSET: usize = 7;

/// Blanking line with a data island in the back half: front porch, sync,
/// eight clocks of island preamble, the 36-symbol island slot, then idle
/// control symbols for the rest of the line.
///
/// The slot is initialised to `island`; the scanout ISR overwrites it in
/// place with whatever the queue offers next.
pub fn island_line(t: &OutputTiming, island: &DataIsland) -> [u32; ISLAND_LINE_WORDS] {
    let mut words = [CMD_NOP; ISLAND_LINE_WORDS];
    let tail = t.h_back_porch + t.h_active - W_PREAMBLE - W_DATA_ISLAND;

    words[0] = CMD_RAW_REPEAT | t.h_front_porch as u32;
    words[1] = sync_word(true, true);
    words[2] = CMD_RAW_REPEAT | t.h_sync_width as u32;
    words[3] = sync_word(false, true);
    words[4] = CMD_RAW_REPEAT | W_PREAMBLE as u32;
    words[5] = preamble_word(true);
    words[6] = CMD_RAW | W_DATA_ISLAND as u32;
    words[ISLAND_SLOT_OFFSET..ISLAND_SLOT_OFFSET + W_DATA_ISLAND]
        .copy_from_slice(&island.words);
    words[ISLAND_SLOT_OFFSET + W_DATA_ISLAND] = CMD_RAW_REPEAT | tail as u32;
    words[ISLAND_SLOT_OFFSET + W_DATA_ISLAND + 1] = sync_word(true, true);
    words
}

/// Length of the active-line prefix, in words: like an island line but the
/// tail ends in the TMDS pixel command.
pub const VACTIVE_LINE_WORDS: usize = 7 + W_DATA_ISLAND + 3;

/// Word offset of the island slot inside [`vactive_line`]'s output.
pub const VACTIVE_SLOT_OFFSET: usize = 7;

/// Active-line prefix: blanking with a data island in the back porch, then
/// a TMDS command whose pixel data (the composed scanline) follows as the
/// next DMA transfer.
///
/// Audio needs ~12000 sample packets per second, far more than the
/// vertical blanking interval alone can carry, so every line's horizontal
/// blanking offers an island slot.
pub fn vactive_line(t: &OutputTiming, island: &DataIsland) -> [u32; VACTIVE_LINE_WORDS] {
    let mut words = [CMD_NOP; VACTIVE_LINE_WORDS];
    let tail = t.h_back_porch - W_PREAMBLE - W_DATA_ISLAND;

    words[0] = CMD_RAW_REPEAT | t.h_front_porch as u32;
    words[1] = sync_word(true, true);
    words[2] = CMD_RAW_REPEAT | t.h_sync_width as u32;
    words[3] = sync_word(false, true);
    words[4] = CMD_RAW_REPEAT | W_PREAMBLE as u32;
    words[5] = preamble_word(true);
    words[6] = CMD_RAW | W_DATA_ISLAND as u32;
    words[VACTIVE_SLOT_OFFSET..VACTIVE_SLOT_OFFSET + W_DATA_ISLAND]
        .copy_from_slice(&island.words);
    words[VACTIVE_SLOT_OFFSET + W_DATA_ISLAND] = CMD_RAW_REPEAT | tail as u32;
    words[VACTIVE_SLOT_OFFSET + W_DATA_ISLAND + 1] = sync_word(true, true);
    words[VACTIVE_SLOT_OFFSET + W_DATA_ISLAND + 2] = CMD_TMDS | t.h_active as u32;
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::VGA_640X480_60;

    /// Walks a command list the way the expander would, returning the total
    /// pixel clocks it emits and how many inline data words it consumed.
    fn expand(words: &[u32]) -> (u32, usize) {
        let mut clocks = 0;
        let mut i = 0;
        while i < words.len() {
            let cmd = words[i] & 0xF000;
            let count = words[i] & 0x0FFF;
            i += 1;
            match cmd {
                CMD_RAW_REPEAT | CMD_TMDS_REPEAT => {
                    clocks += count;
                    i += 1; // one data word, repeated
                }
                CMD_RAW => {
                    clocks += count;
                    i += count as usize;
                }
                CMD_TMDS => {
                    // Pixel data follows in a separate transfer; count the
                    // clocks but no inline words.
                    clocks += count;
                }
                CMD_NOP => {}
                _ => panic!("unknown command {:#x}", words[i - 1]),
            }
        }
        (clocks, i)
    }

    #[test]
    fn blank_lines_fill_the_horizontal_period() {
        let (clocks, words) = expand(&vblank_line(&VGA_640X480_60, false));
        assert_eq!(clocks, 800);
        assert_eq!(words, 7);
        let (clocks, _) = expand(&vblank_line(&VGA_640X480_60, true));
        assert_eq!(clocks, 800);
    }

    #[test]
    fn island_line_fills_the_horizontal_period_too() {
        let island = DataIsland::null(SyncLevels::IDLE);
        let line = island_line(&VGA_640X480_60, &island);
        let (clocks, words) = expand(&line);
        assert_eq!(clocks, 800);
        assert_eq!(words, ISLAND_LINE_WORDS);
    }

    #[test]
    fn island_slot_sits_where_the_constant_says() {
        let island = DataIsland::null(SyncLevels::IDLE);
        let line = island_line(&VGA_640X480_60, &island);
        assert_eq!(
            &line[ISLAND_SLOT_OFFSET..ISLAND_SLOT_OFFSET + W_DATA_ISLAND],
            &island.words[..],
        );
        // The word before the slot announces exactly the island's length.
        assert_eq!(line[ISLAND_SLOT_OFFSET - 1], CMD_RAW | W_DATA_ISLAND as u32);
    }

    #[test]
    fn active_line_ends_in_the_pixel_command() {
        let island = DataIsland::null(SyncLevels::IDLE);
        let line = vactive_line(&VGA_640X480_60, &island);
        let (clocks, words) = expand(&line);
        assert_eq!(clocks, 800);
        assert_eq!(words, VACTIVE_LINE_WORDS);
        assert_eq!(line[VACTIVE_LINE_WORDS - 1], CMD_TMDS | 640);
        assert_eq!(
            &line[VACTIVE_SLOT_OFFSET..VACTIVE_SLOT_OFFSET + W_DATA_ISLAND],
            &island.words[..],
        );
    }

    #[test]
    fn island_fits_the_back_porch() {
        // Preamble + island must fit inside the 48-clock back porch with
        // idle clocks to spare before video.
        assert!(W_PREAMBLE + W_DATA_ISLAND < VGA_640X480_60.h_back_porch);
    }

    #[test]
    fn sync_pulses_drive_the_right_levels() {
        // During the pulse the hsync level must differ from the porches.
        let line = vblank_line(&VGA_640X480_60, false);
        assert_ne!(line[1], line[3]);
        // Vsync lines differ from non-vsync lines everywhere but the
        // counts.
        let on = vblank_line(&VGA_640X480_60, true);
        assert_ne!(on[1], line[1]);
        assert_eq!(on[0], line[0]);
    }
}
