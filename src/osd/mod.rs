//! On-screen display: a small text grid blended over the video, plus the
//! diagnostics content that gets written into it.

pub mod grid;
pub mod selftest;

use core::fmt::{self, Write};

use crate::telemetry::Snapshot;
use self::grid::{TextGrid, COLS};

/// Colours used by the status pages.
pub const COLOR_FG: u16 = 0xFFFF;
pub const COLOR_BG: u16 = 0x0000;
pub const COLOR_ALERT: u16 = 0xF800;
pub const COLOR_OK: u16 = 0x07E0;

/// A write cursor over the grid, so pages can be laid out with `write!`
/// instead of hand-placed characters.
pub struct Cursor<'a> {
    grid: &'a mut TextGrid,
    row: u8,
    col: u8,
    start_col: u8,
    pub color: u16,
}

impl<'a> Cursor<'a> {
    pub fn new(grid: &'a mut TextGrid, row: u8, col: u8) -> Self {
        Cursor {
            grid,
            row,
            col,
            start_col: col,
            color: COLOR_FG,
        }
    }
}

impl<'a> Write for Cursor<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            if b == b'\n' {
                self.row += 1;
                self.col = self.start_col;
                continue;
            }
            self.grid.putc_color(self.row, self.col, b, self.color);
            self.col = self.col.saturating_add(1);
        }
        Ok(())
    }
}

/// Paints the loss-of-signal banner.
pub fn render_no_signal(grid: &mut TextGrid) {
    let mut c = Cursor::new(grid, 7, (COLS as u8 - 9) / 2);
    c.color = COLOR_ALERT;
    let _ = c.write_str("NO SIGNAL");
}

/// Blanks the banner row again once the signal is back.
pub fn clear_no_signal(grid: &mut TextGrid) {
    grid.puts(7, (COLS as u8 - 9) / 2, b"         ");
}

/// Paints the diagnostics page from a telemetry snapshot.
pub fn render_diagnostics(grid: &mut TextGrid, snap: &Snapshot, slip_fpm: u32) {
    let mut c = Cursor::new(grid, 1, 2);
    let _ = write!(
        c,
        "frames   {}\nrate     {} Hz\nslip/min {}\noverflow {}\nunderrun {}\nsynclost {}",
        snap.frames_captured,
        snap.input_rate_hz,
        slip_fpm,
        snap.overflows,
        snap.underruns,
        snap.sync_losses,
    );
    let mut c = Cursor::new(grid, 8, 2);
    if snap.no_signal {
        c.color = COLOR_ALERT;
        let _ = c.write_str("signal   LOST");
    } else {
        c.color = COLOR_OK;
        let _ = c.write_str("signal   OK");
    }
}

/// Window-relative self-test bit positions (GPIOBASE is 16): composite
/// sync, pixel clock, then the 15 colour pins and the shadow pin.
pub const ST_BIT_CSYNC: u32 = 11;
pub const ST_BIT_PCLK: u32 = 12;
pub const ST_BIT_COLOR0: u32 = 13;
pub const ST_BIT_SHADOW: u32 = 28;

/// Paints the wiring self-test page: one status glyph per signal group.
pub fn render_selftest(grid: &mut TextGrid, report: &selftest::ActivityReport) {
    fn mark(grid: &mut TextGrid, row: u8, label: &str, alive: bool) {
        let (color, glyph) = if alive {
            (COLOR_OK, font_8x8::GLYPH_CHECK)
        } else {
            (COLOR_ALERT, font_8x8::GLYPH_CROSS)
        };
        let mut c = Cursor::new(grid, row, 18);
        let _ = c.write_str(label);
        grid.putc_color(row, 25, glyph, color);
    }

    mark(grid, 10, "sync", report.is_toggling(ST_BIT_CSYNC));
    mark(grid, 11, "pclk", report.is_toggling(ST_BIT_PCLK));

    let mut rgb_alive = 0;
    for bit in ST_BIT_COLOR0..ST_BIT_SHADOW {
        if report.is_toggling(bit) {
            rgb_alive += 1;
        }
    }
    let mut c = Cursor::new(grid, 12, 18);
    let _ = write!(c, "rgb {:2}/15", rgb_alive);
    mark(grid, 13, "shdw", report.is_toggling(ST_BIT_SHADOW));
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::grid::ROWS;

    #[test]
    fn cursor_writes_and_wraps_lines() {
        let mut g = TextGrid::new();
        let mut c = Cursor::new(&mut g, 0, 4);
        let _ = c.write_str("ab\ncd");
        assert_eq!(g.char_at(0, 4), b'a');
        assert_eq!(g.char_at(0, 5), b'b');
        assert_eq!(g.char_at(1, 4), b'c');
        assert_eq!(g.char_at(1, 5), b'd');
    }

    #[test]
    fn no_signal_banner_is_centred_and_red() {
        let mut g = TextGrid::new();
        render_no_signal(&mut g);
        let col = (COLS as u8 - 9) / 2;
        assert_eq!(g.char_at(7, col), b'N');
        assert_eq!(g.color_at(7, col), COLOR_ALERT);
    }

    #[test]
    fn banner_clears_when_signal_returns() {
        let mut g = TextGrid::new();
        render_no_signal(&mut g);
        clear_no_signal(&mut g);
        let col = (COLS as u8 - 9) / 2;
        assert_eq!(g.char_at(7, col), b' ');
        assert_eq!(g.char_at(7, col + 8), b' ');
    }

    #[test]
    fn diagnostics_fit_the_grid() {
        let mut g = TextGrid::new();
        let snap = Snapshot {
            frames_captured: 123_456,
            input_rate_hz: 55_501,
            overflows: 7,
            underruns: 0,
            sync_losses: 1,
            no_signal: false,
            ..Snapshot::default()
        };
        render_diagnostics(&mut g, &snap, 48);
        assert_eq!(g.char_at(1, 2), b'f');
        assert_eq!(g.char_at(8, 2), b's');
        // Nothing rendered out of bounds panics; rows stay inside the grid.
        assert!(ROWS >= 9);
    }

    #[test]
    fn selftest_page_marks_dead_and_alive_pins() {
        let mut g = TextGrid::new();
        let mut probe = selftest::ActivityProbe::new(0xFFFF_FFFF);
        // csync toggles, pclk stuck.
        probe.sample(1 << ST_BIT_CSYNC);
        probe.sample(0);
        let report = probe.finish_window();
        render_selftest(&mut g, &report);
        assert_eq!(g.char_at(10, 25), font_8x8::GLYPH_CHECK);
        assert_eq!(g.color_at(10, 25), COLOR_OK);
        assert_eq!(g.char_at(11, 25), font_8x8::GLYPH_CROSS);
        assert_eq!(g.color_at(11, 25), COLOR_ALERT);
    }
}
