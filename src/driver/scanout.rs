//! HSTX scanout: the transmit engine.
//!
//! Two DMA channels feed the HSTX FIFO, each chained to the other. While
//! one streams the current line, the completion IRQ reprograms the other
//! with the next: a blanking command list, an island-bearing blanking list,
//! the active-line prefix, or the pixels for the next row. The IRQ runs on
//! core 1 and is the only place `v_scanline` advances.
//!
//! The scanline callback is invoked here, one line ahead of the pixels it
//! composes, against a scratch line double-buffered the same ping/pong way
//! so composition can overlap the DMA reading the previous line.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rp235x_pac as pac;

use super::dispatch;
use super::dma::DmaChannel;
use super::{DREQ_HSTX, PIN_HSTX_FIRST, PIN_HSTX_LAST};
use crate::audio::ISLAND_QUEUE_DEPTH;
use crate::cmdlist;
use crate::rast::ScanBuffer;
use crate::telemetry::TELEMETRY;
use crate::timing::{LinePhase, OutputTiming, VGA_640X480_60};
use crate::util::copy_words::copy_words;
use crate::util::ring::Consumer;
use crate::util::spin_lock::HwLock;
use packet::{DataIsland, SyncLevels};

struct ScanoutHw {
    ping: DmaChannel,
    pong: DmaChannel,
    islands: Consumer<'static, DataIsland, ISLAND_QUEUE_DEPTH>,
}

static SCANOUT_HW: HwLock<ScanoutHw> = HwLock::new();

/// Current output scanline, `[0, V_TOTAL)`. Written only by the ISR.
static V_SCANLINE: AtomicUsize = AtomicUsize::new(0);
/// Whether the next completion loads pixels (the active-line command list
/// has been posted) or a command list.
static VACTIVE_CMDLIST_POSTED: AtomicBool = AtomicBool::new(false);
/// Which channel the next completion reprograms.
static DMA_PONG: AtomicBool = AtomicBool::new(false);
/// Set by `start()`; the first chain kick happens at most once.
static RUNNING: AtomicBool = AtomicBool::new(false);

/// Command lists, built at provision time for the fixed output timing.
/// The island line's slot is rewritten in place by the ISR, which is why
/// these live in core-1-adjacent scratch RAM.
#[link_section = ".scratch_y"]
static mut VBLANK_VSYNC_OFF: [u32; 7] = [0; 7];
#[link_section = ".scratch_y"]
static mut VBLANK_VSYNC_ON: [u32; 7] = [0; 7];
/// The island-bearing lists exist once per DMA channel: the ISR patches
/// the copy belonging to the channel it is reprogramming while the twin
/// channel streams the other copy, so a splice never races scanout.
#[link_section = ".scratch_y"]
static mut VBLANK_ISLAND: [[u32; cmdlist::ISLAND_LINE_WORDS]; 2] =
    [[0; cmdlist::ISLAND_LINE_WORDS]; 2];
#[link_section = ".scratch_y"]
static mut VACTIVE: [[u32; cmdlist::VACTIVE_LINE_WORDS]; 2] =
    [[0; cmdlist::VACTIVE_LINE_WORDS]; 2];

/// Lines the island queue has come up empty for, while audio was expected.
/// One sustained frame's worth counts as a single underrun event instead
/// of spamming the counter once per line.
static STARVED_LINES: AtomicUsize = AtomicUsize::new(0);

/// Scanline scratch pair: the callback composes into one while DMA drains
/// the other.
#[link_section = ".scratch_x"]
static mut SCANLINE_A: ScanBuffer = ScanBuffer::new();
#[link_section = ".scratch_x"]
static mut SCANLINE_B: ScanBuffer = ScanBuffer::new();

/// The one output timing this engine is built for.
static TIMING: &OutputTiming = &VGA_640X480_60;

/// Configures the serialiser and parks both DMA channels on blanking
/// lines. Scanout does not start until [`start`].
pub fn provision(
    hstx_ctrl: pac::HSTX_CTRL,
    _hstx_fifo: pac::HSTX_FIFO,
    ping: DmaChannel,
    pong: DmaChannel,
    islands: Consumer<'static, DataIsland, ISLAND_QUEUE_DEPTH>,
) {
    // Build the command lists. Safety: provision runs once, before the ISR
    // is unmasked, so these statics have no concurrent reader yet.
    let null_island = DataIsland::null(SyncLevels::IDLE);
    unsafe {
        VBLANK_VSYNC_OFF = cmdlist::vblank_line(TIMING, false);
        VBLANK_VSYNC_ON = cmdlist::vblank_line(TIMING, true);
        let blank = cmdlist::island_line(TIMING, &null_island);
        VBLANK_ISLAND = [blank, blank];
        let active = cmdlist::vactive_line(TIMING, &null_island);
        VACTIVE = [active, active];
    }

    // TMDS encoder lane extraction for RGB565 pixels: rotate each colour
    // field down to bits 7:0 of the encoder input.
    hstx_ctrl.expand_tmds().write(|w| unsafe {
        w.l2_nbits()
            .bits(4) // red, 5 bits
            .l2_rot()
            .bits(8)
            .l1_nbits()
            .bits(5) // green, 6 bits
            .l1_rot()
            .bits(3)
            .l0_nbits()
            .bits(4) // blue, 5 bits
            .l0_rot()
            .bits(29)
    });

    // Two 16-bit pixels per word through the encoder; RAW symbols are one
    // whole word each.
    hstx_ctrl.expand_shift().write(|w| unsafe {
        w.enc_n_shifts()
            .bits(2)
            .enc_shift()
            .bits(16)
            .raw_n_shifts()
            .bits(1)
            .raw_shift()
            .bits(0)
    });

    // Serial output: shift the 30-bit symbol out two bits per clk_hstx
    // cycle, popping the expander every five cycles -- the 25.2 MHz pixel
    // cadence at 126 MHz.
    hstx_ctrl.csr().write(|w| unsafe {
        w.expand_en()
            .set_bit()
            .clkdiv()
            .bits(5)
            .n_shifts()
            .bits(5)
            .shift()
            .bits(2)
            .en()
            .set_bit()
    });

    // Clock pair on the first two HSTX bits, then lane 0..2 pairs, P/N with
    // the inverted member first to match the connector.
    hstx_ctrl.bit(0).write(|w| w.clk().set_bit().inv().set_bit());
    hstx_ctrl.bit(1).write(|w| w.clk().set_bit());
    for lane in 0..3u8 {
        let bit = 2 + lane as usize * 2;
        let sel_p = lane * 10;
        let sel_n = lane * 10 + 1;
        hstx_ctrl.bit(bit).write(|w| unsafe {
            w.sel_p().bits(sel_p).sel_n().bits(sel_n).inv().set_bit()
        });
        hstx_ctrl
            .bit(bit + 1)
            .write(|w| unsafe { w.sel_p().bits(sel_p).sel_n().bits(sel_n) });
    }

    // Hand the pins to the HSTX function.
    let io = unsafe { &*pac::IO_BANK0::ptr() };
    let pads = unsafe { &*pac::PADS_BANK0::ptr() };
    for pin in PIN_HSTX_FIRST..=PIN_HSTX_LAST {
        pads.gpio(pin as usize)
            .modify(|_, w| w.od().clear_bit().ie().clear_bit().iso().clear_bit());
        io.gpio(pin as usize)
            .gpio_ctrl()
            .write(|w| unsafe { w.funcsel().bits(super::FUNCSEL_HSTX) });
    }

    // Both channels identical: read a command list, write the FIFO, chain
    // to the other on completion.
    for (ch, other) in [(&ping, &pong), (&pong, &ping)].iter() {
        let regs = ch.regs();
        regs.ch_write_addr()
            .write(|w| unsafe { w.bits(pac::HSTX_FIFO::ptr() as u32 + 0x00) });
        regs.ch_read_addr()
            .write(|w| unsafe { w.bits(core::ptr::addr_of!(VBLANK_VSYNC_OFF) as u32) });
        regs.ch_trans_count()
            .write(|w| unsafe { w.bits(7) });
        regs.ch_al1_ctrl().write(|w| unsafe {
            w.en()
                .set_bit()
                .data_size()
                .bits(2) // words
                .incr_read()
                .set_bit()
                .incr_write()
                .clear_bit()
                .treq_sel()
                .bits(DREQ_HSTX)
                .chain_to()
                .bits(other.index() as u8)
                .irq_quiet()
                .clear_bit()
        });
    }

    let dma = unsafe { &*pac::DMA::ptr() };
    dma.ints0()
        .write(|w| unsafe { w.bits(ping.intr_bit() | pong.intr_bit()) });
    dma.inte0()
        .write(|w| unsafe { w.bits(ping.intr_bit() | pong.intr_bit()) });

    SCANOUT_HW.install(ScanoutHw {
        ping,
        pong,
        islands,
    });
}

/// Kicks the first transfer. Called on core 1 with `DMA_IRQ_0` unmasked
/// there; every subsequent transfer is chained or posted by the ISR.
pub(crate) fn start() {
    if RUNNING.swap(true, Ordering::SeqCst) {
        return;
    }
    // Both channels were parked on blanking lines at provision time, so
    // the first completion is already two lines into the frame.
    V_SCANLINE.store(2, Ordering::Relaxed);
    VACTIVE_CMDLIST_POSTED.store(false, Ordering::Relaxed);
    DMA_PONG.store(false, Ordering::Relaxed);

    let hw = SCANOUT_HW.borrow();
    // Trigger ping by rewriting its control register with EN set.
    hw.ping
        .regs()
        .ch_ctrl_trig()
        .modify(|_, w| w.en().set_bit());
}

/// DMA completion handler, the heart of the transmit engine. Runs on
/// core 1 only.
///
/// One completion = one line's stream handed to the FIFO. The channel that
/// just finished is reprogrammed with the line after next while its twin
/// streams; during active video each line takes two completions (command
/// prefix, then pixels), tracked by `VACTIVE_CMDLIST_POSTED`.
pub(crate) fn dma_irq() {
    let mut hw = SCANOUT_HW.borrow();
    let hw = &mut *hw;

    let pong = DMA_PONG.load(Ordering::Relaxed);
    let ch = if pong { &hw.pong } else { &hw.ping };
    DMA_PONG.store(!pong, Ordering::Relaxed);

    let dma = unsafe { &*pac::DMA::ptr() };
    dma.ints0().write(|w| unsafe { w.bits(ch.intr_bit()) });

    let v = V_SCANLINE.load(Ordering::Relaxed);
    let mut advance = true;

    match TIMING.phase_of(v) {
        // No islands across the vsync pulse; its command list is static.
        LinePhase::Sync => post_list(
            ch,
            unsafe { &*core::ptr::addr_of!(VBLANK_VSYNC_ON) },
        ),
        LinePhase::FrontPorch | LinePhase::BackPorch => {
            // Blanking lines carry data islands: splice the next queued
            // island into this channel's copy, or leave silence there.
            let line = unsafe { &mut (*core::ptr::addr_of_mut!(VBLANK_ISLAND))[pong as usize] };
            splice_island(
                &mut hw.islands,
                &mut line[cmdlist::ISLAND_SLOT_OFFSET
                    ..cmdlist::ISLAND_SLOT_OFFSET + packet::W_DATA_ISLAND],
            );
            post_list(ch, line);
        }
        LinePhase::Active { row } => {
            if !VACTIVE_CMDLIST_POSTED.load(Ordering::Relaxed) {
                // The island rides the command prefix, not the pixel post.
                let line = unsafe { &mut (*core::ptr::addr_of_mut!(VACTIVE))[pong as usize] };
                splice_island(
                    &mut hw.islands,
                    &mut line[cmdlist::VACTIVE_SLOT_OFFSET
                        ..cmdlist::VACTIVE_SLOT_OFFSET + packet::W_DATA_ISLAND],
                );
                post_list(ch, line);
                VACTIVE_CMDLIST_POSTED.store(true, Ordering::Relaxed);
                advance = false;
            } else {
                let line = compose_row(row);
                let regs = ch.regs();
                regs.ch_read_addr()
                    .write(|w| unsafe { w.bits(line.as_words().as_ptr() as u32) });
                regs.ch_trans_count()
                    .write(|w| unsafe { w.bits(line.as_words().len() as u32) });
                VACTIVE_CMDLIST_POSTED.store(false, Ordering::Relaxed);
            }
        }
    }

    if advance {
        let next = (v + 1) % TIMING.v_total();
        V_SCANLINE.store(next, Ordering::Relaxed);
        if next == 0 {
            TELEMETRY.frame_output();
            dispatch::frame_tick();
        }
    }
}

// The address handed to the DMA must stay valid for the transfer; every
// caller passes one of the static lists above.
fn post_list(ch: &DmaChannel, list: &[u32]) {
    let regs = ch.regs();
    regs.ch_read_addr()
        .write(|w| unsafe { w.bits(list.as_ptr() as u32) });
    regs.ch_trans_count()
        .write(|w| unsafe { w.bits(list.len() as u32) });
}

/// Overwrites an island slot with the next queued island, or with the null
/// island when nothing is queued. The producer can never block the
/// serialiser; an empty queue only becomes a counted underrun once it has
/// persisted for a whole frame of slots.
fn splice_island(
    islands: &mut Consumer<'static, DataIsland, ISLAND_QUEUE_DEPTH>,
    slot: &mut [u32],
) {
    match islands.pop() {
        Some(island) => {
            copy_words(&island.words, slot);
            STARVED_LINES.store(0, Ordering::Relaxed);
        }
        None => {
            copy_words(&DataIsland::null(SyncLevels::IDLE).words, slot);
            let starved = STARVED_LINES.load(Ordering::Relaxed) + 1;
            if starved == TIMING.v_total() {
                TELEMETRY.underrun();
                STARVED_LINES.store(0, Ordering::Relaxed);
            } else {
                STARVED_LINES.store(starved, Ordering::Relaxed);
            }
        }
    }
}

/// Runs the donated scanline callback for `row` into the scratch line this
/// completion owns, falling back to the last composed content when no
/// callback is in place.
fn compose_row(row: usize) -> &'static ScanBuffer {
    // Alternate the scratch line with the row parity so the callback never
    // scribbles on the buffer the twin channel is still scanning out.
    let buf = if row % 2 == 0 {
        core::ptr::addr_of_mut!(SCANLINE_A)
    } else {
        core::ptr::addr_of_mut!(SCANLINE_B)
    };
    // Safety: the parity scheme makes this the only live reference; a
    // missing callback just re-sends the buffer's previous contents.
    dispatch::SCANLINE.observe(|callback| callback(row, unsafe { &mut *buf }));
    unsafe { &*buf }
}

/// Current output scanline, for diagnostics.
pub fn v_scanline() -> usize {
    V_SCANLINE.load(Ordering::Relaxed)
}
