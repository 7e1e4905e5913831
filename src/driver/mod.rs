//! Hardware driver: everything that only exists on the RP2350.
//!
//! Layout mirrors the data flow. `capture` owns the PIO front end that
//! follows the source's sync and lands raw pixels; `scanout` owns the HSTX
//! serialiser, its DMA ping/pong pair and the completion ISR; `i2s` owns
//! audio capture; `dispatch` runs core 1; `clocks` and `multicore` are
//! bring-up plumbing.
//!
//! Ownership rules, the same shape everywhere in this codebase: hardware
//! that an ISR needs is installed into a `HwLock` static at provision time
//! and borrowed exclusively at interrupt time; everything else is owned by
//! the `Hdmi` handle and threaded through explicitly.

pub mod capture;
pub mod clocks;
pub mod dispatch;
pub mod dma;
pub mod i2s;
pub mod multicore;
pub mod scanout;

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

use rp235x_pac as pac;

use crate::audio::{AudioRing, IslandQueue, EMPTY_ISLAND};
use crate::{Pixel, SRC_HEIGHT, SRC_WIDTH};
use dsp::Sample;

/// GPIO plan. The colour bus sits above GPIO 29, so the video PIO blocks
/// run with their pin window based at 16.
pub const VIDEO_GPIO_BASE: u8 = 16;
pub const PIN_CSYNC: u8 = 27;
pub const PIN_PCLK: u8 = 28;
/// First of the 16 colour-bus pins (B4..B0, G4..G0, R4..R0, shadow).
pub const PIN_COLOR_BASE: u8 = 29;
pub const PIN_SHADOW: u8 = 44;
/// HSTX drives GPIO 12..=19 (clock pair then three data pairs).
pub const PIN_HSTX_FIRST: u8 = 12;
pub const PIN_HSTX_LAST: u8 = 19;
/// I2S inputs, captured by PIO2 with its window based at 0.
pub const PIN_I2S_DAT: u8 = 0;
pub const PIN_I2S_WS: u8 = 1;
pub const PIN_I2S_BCK: u8 = 2;
/// Front-panel buttons, active low.
pub const PIN_BTN_EFFECT: u8 = 45;
pub const PIN_BTN_MODE: u8 = 46;

/// Pad function selects used here (RP2350 datasheet table 9-1).
pub const FUNCSEL_HSTX: u8 = 0;
pub const FUNCSEL_SIO: u8 = 5;
pub const FUNCSEL_PIO0: u8 = 6;
pub const FUNCSEL_PIO2: u8 = 8;

/// DMA channel plan. Scanout owns the ping/pong pair; capture and audio
/// each own one channel.
pub const DMACH_PING: usize = 0;
pub const DMACH_PONG: usize = 1;
pub const DMACH_CAPTURE: usize = 2;
pub const DMACH_I2S: usize = 3;

/// DREQ numbers (RP2350 datasheet table 12-1).
pub const DREQ_PIO0_RX0: u8 = 4;
pub const DREQ_PIO2_RX0: u8 = 20;
pub const DREQ_HSTX: u8 = 52;

/// Records when a driver instance has been initialized. Only once per boot:
/// there is no teardown for the scanout machinery.
static DRIVER_INIT_FLAG: AtomicBool = AtomicBool::new(false);

/// The framebuffer. Written a line at a time by capture on core 0, read by
/// the compositor on core 1. Deliberately unsynchronised: a torn *line* is
/// accepted by design, and halfword-aligned pixels make a torn *pixel*
/// impossible.
static mut FRAMEBUFFER: [Pixel; SRC_WIDTH * SRC_HEIGHT] = [0; SRC_WIDTH * SRC_HEIGHT];

/// Capture's write view of the framebuffer.
///
/// Safety contract: exactly one writer exists (the capture loop), and
/// readers tolerate tearing at line granularity.
pub(crate) fn framebuffer_writer() -> &'static mut [Pixel; SRC_WIDTH * SRC_HEIGHT] {
    unsafe { &mut *core::ptr::addr_of_mut!(FRAMEBUFFER) }
}

/// The compositor's read view.
pub fn framebuffer_reader() -> &'static [Pixel; SRC_WIDTH * SRC_HEIGHT] {
    unsafe { &*core::ptr::addr_of!(FRAMEBUFFER) }
}

/// The audio sample ring and island queue, allocated for the life of the
/// process and split once during init.
static mut AUDIO_RING: AudioRing = AudioRing::new(Sample::SILENCE);
static mut ISLAND_QUEUE: IslandQueue = IslandQueue::new(EMPTY_ISLAND);

/// Driver states for the typestate handle.
#[derive(Debug)]
pub enum Idle {}
#[derive(Debug)]
pub enum Ready {}

/// The driver handle. `Hdmi<Idle>` can configure; inside
/// [`Hdmi::with_scanline`] the callback is live and the application sees
/// `Hdmi<Ready>`.
pub struct Hdmi<MODE> {
    _marker: PhantomData<MODE>,
}

/// Brings up clocks, claims the fixed resource plan, and hands back the
/// idle driver plus the split ring endpoints.
///
/// Fatal errors at this stage (double init, a peripheral that never comes
/// out of reset) panic: per the error policy, a boot that cannot claim its
/// hardware does not limp.
pub fn init(p: pac::Peripherals) -> Parts {
    let previous_instance = DRIVER_INIT_FLAG.swap(true, Ordering::SeqCst);
    assert!(!previous_instance, "driver initialized twice");

    // Release the blocks we use from reset (the PLL before anything tries
    // to lock it) and wait for them.
    p.RESETS.reset().modify(|_, w| {
        w.pll_sys()
            .clear_bit()
            .pio0()
            .clear_bit()
            .pio2()
            .clear_bit()
            .dma()
            .clear_bit()
            .io_bank0()
            .clear_bit()
            .pads_bank0()
            .clear_bit()
            .hstx()
            .clear_bit()
            .timer0()
            .clear_bit()
    });
    while {
        let done = p.RESETS.reset_done().read();
        !(done.pll_sys().bit_is_set()
            && done.pio0().bit_is_set()
            && done.pio2().bit_is_set()
            && done.dma().bit_is_set()
            && done.io_bank0().bit_is_set()
            && done.pads_bank0().bit_is_set()
            && done.hstx().bit_is_set()
            && done.timer0().bit_is_set())
    } {}

    clocks::configure_clocks(&clocks::SYS_126MHZ, &p.XOSC, &p.PLL_SYS, &p.CLOCKS);

    // Give DMA the bus over both cores' load/store traffic: a late scanline
    // word is visible on screen, a late CPU word is not.
    p.BUSCTRL
        .bus_priority()
        .write(|w| w.dma_r().set_bit().dma_w().set_bit());

    // Input pads for capture, audio and buttons. RP2350 pads come out of
    // reset isolated; clear ISO or the PIO sees nothing.
    for pin in [PIN_CSYNC, PIN_PCLK].iter().copied() {
        input_pad(&p.PADS_BANK0, &p.IO_BANK0, pin, FUNCSEL_PIO0, false);
    }
    let mut pin = PIN_COLOR_BASE;
    while pin <= PIN_SHADOW {
        input_pad(&p.PADS_BANK0, &p.IO_BANK0, pin, FUNCSEL_PIO0, false);
        pin += 1;
    }
    for pin in [PIN_I2S_DAT, PIN_I2S_WS, PIN_I2S_BCK].iter().copied() {
        input_pad(&p.PADS_BANK0, &p.IO_BANK0, pin, FUNCSEL_PIO2, false);
    }
    for pin in [PIN_BTN_EFFECT, PIN_BTN_MODE].iter().copied() {
        input_pad(&p.PADS_BANK0, &p.IO_BANK0, pin, FUNCSEL_SIO, true);
    }

    // Split the shared queues. Safety: init runs once (checked above), so
    // each &mut is the only one ever taken.
    let (sample_prod, sample_cons) = unsafe { (*core::ptr::addr_of_mut!(AUDIO_RING)).split() };
    let (island_prod, island_cons) = unsafe { (*core::ptr::addr_of_mut!(ISLAND_QUEUE)).split() };

    capture::provision(p.PIO0, dma::DmaChannel::claim(DMACH_CAPTURE));
    i2s::provision(p.PIO2, dma::DmaChannel::claim(DMACH_I2S), sample_prod);
    scanout::provision(
        p.HSTX_CTRL,
        p.HSTX_FIFO,
        dma::DmaChannel::claim(DMACH_PING),
        dma::DmaChannel::claim(DMACH_PONG),
        island_cons,
    );

    Parts {
        hdmi: Hdmi {
            _marker: PhantomData,
        },
        sample_cons,
        island_prod,
        sio: p.SIO,
        timer: p.TIMER0,
    }
}

/// What `init` hands back to `main`.
pub struct Parts {
    pub hdmi: Hdmi<Idle>,
    /// Consumer half of the capture ring, for the audio pipeline.
    pub sample_cons: crate::util::ring::Consumer<'static, Sample, { crate::audio::RING_DEPTH }>,
    /// Producer half of the island queue, for the audio pipeline.
    pub island_prod:
        crate::util::ring::Producer<'static, packet::DataIsland, { crate::audio::ISLAND_QUEUE_DEPTH }>,
    pub sio: pac::SIO,
    pub timer: pac::TIMER0,
}

fn input_pad(
    pads: &pac::PADS_BANK0,
    io: &pac::IO_BANK0,
    pin: u8,
    funcsel: u8,
    pull_up: bool,
) {
    pads.gpio(pin as usize).modify(|_, w| {
        w.ie()
            .set_bit()
            .od()
            .clear_bit()
            .pue()
            .bit(pull_up)
            .pde()
            .clear_bit()
            .iso()
            .clear_bit()
    });
    io.gpio(pin as usize)
        .gpio_ctrl()
        .write(|w| unsafe { w.funcsel().bits(funcsel) });
}

/// Microsecond timestamp from the always-running system timer.
///
/// Uses the raw (non-latching) pair, so the high word is re-read to defend
/// against a carry between the two loads.
pub fn time_us(timer: &pac::TIMER0) -> u64 {
    loop {
        let hi = timer.timerawh().read().bits();
        let lo = timer.timerawl().read().bits();
        if timer.timerawh().read().bits() == hi {
            return ((hi as u64) << 32) | lo as u64;
        }
    }
}

impl Hdmi<Idle> {
    /// Provides `scanline` to the scanout ISR as the line compositor and
    /// executes `scope`. When `scope` returns the callback is revoked,
    /// busy-waiting for the ISR to let go first.
    pub fn with_scanline<R>(
        &mut self,
        mut scanline: impl for<'c> FnMut(usize, &'c mut crate::rast::ScanBuffer) + Send,
        scope: impl FnOnce(&mut Hdmi<Ready>) -> R,
    ) -> R {
        dispatch::SCANLINE.donate(&mut scanline, || {
            // Safety: Hdmi is a ZST marker; Ready only unlocks operations
            // that are valid while a callback is donated.
            scope(unsafe { &mut *(self as *mut Hdmi<Idle> as *mut Hdmi<Ready>) })
        })
    }
}

impl Hdmi<Ready> {
    /// Asks core 1 to start scanout. Must be called with the callback in
    /// place; the first DMA completion will invoke it.
    pub fn start(&mut self) {
        dispatch::request_start();
    }
}

/// Minimum viable picobin image-definition block (Arm, Secure, EXE), as
/// the boot ROM requires at the front of flash.
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: [u32; 5] = [
    0xffff_ded3,
    0x1021_0142,
    0x0000_01ff,
    0x0000_0000,
    0xab12_3579,
];
