//! Line-rate video capture.
//!
//! Two PIO state machines on PIO0. The *sync decoder* counts pixel-clock
//! edges between composite-sync edges and pushes one count per interval;
//! the host-side [`SyncClassifier`] turns those counts into line and field
//! events. The *pixel sampler* is armed per line: it waits out the sync
//! pulse, skips the back porch, then clocks one 16-bit colour-bus word per
//! pixel into its FIFO, which a DMA channel drains into a raw line buffer.
//! The frame loop unpacks each landed line into the framebuffer while the
//! next line is in flight.

use rp235x_pac as pac;

use super::dma::DmaChannel;
use super::{framebuffer_writer, time_us, DREQ_PIO0_RX0};
use super::{PIN_COLOR_BASE, PIN_CSYNC, PIN_PCLK, VIDEO_GPIO_BASE};
use crate::config::ShadowMode;
use crate::rast::unpack::unpack_line;
use crate::telemetry::TELEMETRY;
use crate::timing::{SourceTiming, SyncClassifier, SyncEvent, MVS_320X224, MVS_PIXEL_CLOCK_HZ};
use crate::util::pioasm::{self, JmpCond, MovOp, Reg, WaitSrc};
use crate::util::spin_lock::HwLock;
use crate::SRC_WIDTH;

/// Window-relative indices of the sync pins (the video PIO blocks run with
/// GPIOBASE = 16).
const CSYNC_IDX: u8 = PIN_CSYNC - VIDEO_GPIO_BASE;
const PCLK_IDX: u8 = PIN_PCLK - VIDEO_GPIO_BASE;

/// Sync decoder: count pclk rising edges while csync is deasserted, push
/// the count at the falling edge. Equalisation pulses yield short counts,
/// real lines long ones; classification happens on the CPU.
const SYNC_PROGRAM: [u16; 8] = [
    // .wrap_target
    pioasm::mov(Reg::X, MovOp::Invert, Reg::Null),  // 0: x = 0xFFFFFFFF
    pioasm::wait(1, WaitSrc::Gpio, CSYNC_IDX),      // 1: csync deasserts
    pioasm::wait(0, WaitSrc::Gpio, PCLK_IDX),       // 2: count loop
    pioasm::wait(1, WaitSrc::Gpio, PCLK_IDX),       // 3: pclk rising edge
    pioasm::jmp(JmpCond::XPostDec, 5),              // 4: always taken; x--
    pioasm::jmp(JmpCond::Pin, 2),                   // 5: csync still high?
    pioasm::mov(Reg::Isr, MovOp::Invert, Reg::X),   // 6: count = ~x
    pioasm::push_noblock(),                         // 7
    // .wrap
];

/// Pixel sampler, armed per line with two TX words: the post-sync skip
/// count and the pixel count (both minus one). Samples the 16-pin colour
/// bus on pclk rising edges; autopush at 16 makes each FIFO word one
/// pixel.
const SAMPLER_PROGRAM: [u16; 13] = [
    // .wrap_target
    pioasm::pull_block(),                           //  0: skip-1
    pioasm::mov(Reg::Y, MovOp::None, Reg::Osr),     //  1
    pioasm::wait(0, WaitSrc::Gpio, CSYNC_IDX),      //  2: inside the pulse
    pioasm::wait(1, WaitSrc::Gpio, CSYNC_IDX),      //  3: pulse ends
    pioasm::wait(0, WaitSrc::Gpio, PCLK_IDX),       //  4: skip loop
    pioasm::wait(1, WaitSrc::Gpio, PCLK_IDX),       //  5
    pioasm::jmp(JmpCond::YPostDec, 4),              //  6
    pioasm::pull_block(),                           //  7: npixels-1
    pioasm::mov(Reg::X, MovOp::None, Reg::Osr),     //  8
    pioasm::wait(0, WaitSrc::Gpio, PCLK_IDX),       //  9: sample loop
    pioasm::wait(1, WaitSrc::Gpio, PCLK_IDX),       // 10
    pioasm::in_pins(16),                            // 11: colour bus + shadow
    pioasm::jmp(JmpCond::XPostDec, 9),              // 12
    // .wrap
];

const SAMPLER_ORIGIN: usize = SYNC_PROGRAM.len();

/// Raw line landing zone, one word per pixel.
static mut RAW_LINE: [u32; SRC_WIDTH] = [0; SRC_WIDTH];

struct CaptureHw {
    pio: pac::PIO0,
    ch: DmaChannel,
    classifier: SyncClassifier,
    /// Framebuffer row whose DMA is in flight, if any.
    in_flight: Option<usize>,
}

static CAPTURE_HW: HwLock<CaptureHw> = HwLock::new();

/// The source timing this front end is built for.
static SOURCE: &SourceTiming = &MVS_320X224;

/// Loads both microprograms and leaves the state machines running; the
/// sampler stalls on its empty TX FIFO until a line is armed.
pub fn provision(pio: pac::PIO0, ch: DmaChannel) {
    pio.gpiobase()
        .write(|w| unsafe { w.bits(VIDEO_GPIO_BASE as u32) });

    for (i, &op) in SYNC_PROGRAM.iter().enumerate() {
        pio.instr_mem(i).write(|w| unsafe { w.bits(op as u32) });
    }
    for (i, &op) in SAMPLER_PROGRAM.iter().enumerate() {
        pio.instr_mem(SAMPLER_ORIGIN + i)
            .write(|w| unsafe { w.bits(op as u32) });
    }

    // SM0: sync decoder.
    let sm = pio.sm(0);
    sm.sm_clkdiv().write(|w| unsafe { w.int().bits(1) });
    sm.sm_execctrl().write(|w| unsafe {
        w.wrap_top()
            .bits(SYNC_PROGRAM.len() as u8 - 1)
            .wrap_bottom()
            .bits(0)
            .jmp_pin()
            .bits(PIN_CSYNC - VIDEO_GPIO_BASE)
    });
    sm.sm_shiftctrl().write(|w| w.autopush().clear_bit());
    sm.sm_instr()
        .write(|w| unsafe { w.bits(pioasm::jmp(JmpCond::Always, 0) as u32) });

    // SM1: pixel sampler. IN base at the colour bus; autopush per pixel.
    let sm = pio.sm(1);
    sm.sm_clkdiv().write(|w| unsafe { w.int().bits(1) });
    sm.sm_execctrl().write(|w| unsafe {
        w.wrap_top()
            .bits((SAMPLER_ORIGIN + SAMPLER_PROGRAM.len()) as u8 - 1)
            .wrap_bottom()
            .bits(SAMPLER_ORIGIN as u8)
    });
    sm.sm_shiftctrl().write(|w| unsafe {
        w.in_shiftdir()
            .clear_bit() // shift left: pins land in the low 16 bits
            .autopush()
            .set_bit()
            .push_thresh()
            .bits(16)
    });
    sm.sm_pinctrl()
        .write(|w| unsafe { w.in_base().bits(PIN_COLOR_BASE - VIDEO_GPIO_BASE) });
    sm.sm_instr()
        .write(|w| unsafe { w.bits(pioasm::jmp(JmpCond::Always, SAMPLER_ORIGIN as u8) as u32) });

    // Both SMs on.
    pio.ctrl()
        .modify(|r, w| unsafe { w.sm_enable().bits(r.sm_enable().bits() | 0b11) });

    CAPTURE_HW.install(CaptureHw {
        pio,
        ch,
        classifier: SyncClassifier::for_source(SOURCE),
        in_flight: None,
    });
}

/// Captures one frame into the framebuffer.
///
/// Follows the sync decoder's event stream, arming the sampler for each
/// active line and unpacking the previous line while the next is in
/// flight. Returns `false` -- with the last frame left intact -- if no
/// usable sync arrives within two frame periods.
pub fn capture_frame(shadow_mode: ShadowMode) -> bool {
    let mut hw = CAPTURE_HW.borrow();
    let hw = &mut *hw;

    let timer = unsafe { &*pac::TIMER0::ptr() };
    let deadline =
        time_us(timer) + 2 * SOURCE.frame_period_us(MVS_PIXEL_CLOCK_HZ) as u64;

    let first_active = SOURCE.v_active_start;
    let last_active = SOURCE.v_active_start + SOURCE.v_active - 1;
    let mut seen_vsync = false;

    loop {
        if time_us(timer) > deadline {
            // Loss of signal: keep hardware armed, keep the old frame.
            hw.in_flight = None;
            if !TELEMETRY.no_signal() {
                TELEMETRY.sync_lost();
            }
            return false;
        }

        // One sync interval at a time.
        if hw.pio.fstat().read().rxempty().bits() & 1 != 0 {
            continue;
        }
        let count = hw.pio.rxf(0).read().bits();

        match hw.classifier.classify(count) {
            SyncEvent::VsyncBegin => {}
            SyncEvent::VsyncEnd => {
                seen_vsync = true;
            }
            SyncEvent::Hsync { line } => {
                // The count for line N lands at the start of line N+1's
                // sync pulse: finish N's DMA, then arm N+1 if it's active.
                if let Some(row) = hw.in_flight.take() {
                    finish_line(hw, row, shadow_mode);
                    if row == last_active - first_active {
                        TELEMETRY.sync_restored();
                        TELEMETRY.frame_captured();
                        return true;
                    }
                }
                let next = line + 1;
                if seen_vsync && next >= first_active && next <= last_active {
                    arm_line(hw, next - first_active);
                }
            }
            SyncEvent::None => {}
        }
    }
}

/// Posts the DMA descriptor for one line and feeds the sampler its two
/// parameters.
fn arm_line(hw: &mut CaptureHw, row: usize) {
    let regs = hw.ch.regs();
    regs.ch_read_addr()
        .write(|w| unsafe { w.bits(pac::PIO0::ptr() as u32 + 0x020 + 4) }); // RXF1
    regs.ch_write_addr()
        .write(|w| unsafe { w.bits(core::ptr::addr_of_mut!(RAW_LINE) as u32) });
    regs.ch_trans_count()
        .write(|w| unsafe { w.bits(SRC_WIDTH as u32) });
    regs.ch_ctrl_trig().write(|w| unsafe {
        w.en()
            .set_bit()
            .data_size()
            .bits(2)
            .incr_read()
            .clear_bit()
            .incr_write()
            .set_bit()
            .treq_sel()
            .bits(DREQ_PIO0_RX0 + 1)
            .irq_quiet()
            .set_bit()
    });

    // Arm the sampler: post-sync skip, then pixel count, both minus one.
    let skip = (SOURCE.h_active_start - SOURCE.h_sync_width) as u32 - 1;
    hw.pio.txf(1).write(|w| unsafe { w.bits(skip) });
    hw.pio
        .txf(1)
        .write(|w| unsafe { w.bits(SRC_WIDTH as u32 - 1) });

    hw.in_flight = Some(row);
}

/// Waits out the in-flight DMA (a full line period has already elapsed, so
/// this is normally a no-op) and unpacks the landed words into the
/// framebuffer row.
fn finish_line(hw: &mut CaptureHw, row: usize, shadow_mode: ShadowMode) {
    while hw.ch.busy() {
        // A slow line: the next sync interval has already been measured,
        // so the remaining words are at most a FIFO's worth away.
    }
    let fb = framebuffer_writer();
    let raw = unsafe { &*core::ptr::addr_of!(RAW_LINE) };
    unpack_line(
        &mut fb[row * SRC_WIDTH..(row + 1) * SRC_WIDTH],
        raw,
        shadow_mode,
    );
}
