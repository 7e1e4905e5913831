//! I2S audio capture.
//!
//! A PIO state machine follows BCK/WS and shifts DAT into one 32-bit word
//! per channel per frame. A free-running DMA channel lands those words in a
//! power-of-two buffer whose write address wraps naturally (the channel's
//! ring mode), and [`poll`] chases the DMA write pointer from the consumer
//! side, pairing words into samples and pushing them at the capture ring.
//! No interrupts: the poll runs from the core-1 background task, with the
//! core-0 fallback when scanout has core 1 pinned.

use rp235x_pac as pac;

use super::dma::DmaChannel;
use super::{time_us, DREQ_PIO2_RX0, PIN_I2S_BCK, PIN_I2S_DAT, PIN_I2S_WS};
use crate::audio::{push_captured, sample_from_raw, AudioPipeline, RING_DEPTH};
use crate::telemetry::TELEMETRY;
use crate::util::pioasm::{self, JmpCond, WaitSrc};
use crate::util::ring::Producer;
use crate::util::spin_lock::HwLock;
use dsp::Sample;

/// DMA ring: 4096 words is about two output frames of headroom between
/// polls at the source's worst-case rate.
const RING_WORDS: usize = 4096;
/// log2 of the ring size in bytes, for the DMA ring-wrap field.
const RING_SIZE_BITS: u8 = 14;

#[repr(align(16384))]
struct DmaRing([u32; RING_WORDS]);

/// Ring-wrap requires alignment to the ring size.
static mut DMA_RING: DmaRing = DmaRing([0; RING_WORDS]);

/// The capture microprogram. WS low is the left channel. Each channel's
/// bits shift in MSB-first on rising BCK edges until WS flips, then the
/// accumulated word is pushed; shifting left makes the final 16 bits land
/// right-justified, which is exactly how the source frames its PCM.
const I2S_PROGRAM: [u16; 13] = [
    // .wrap_target
    pioasm::wait(1, WaitSrc::Gpio, PIN_I2S_WS),   //  0: sync to a right frame
    pioasm::wait(0, WaitSrc::Gpio, PIN_I2S_WS),   //  1: falling WS: left begins
    pioasm::wait(0, WaitSrc::Gpio, PIN_I2S_BCK),  //  2: left loop
    pioasm::wait(1, WaitSrc::Gpio, PIN_I2S_BCK),  //  3: BCK rising edge
    pioasm::in_pins(1),                           //  4: shift DAT
    pioasm::jmp(JmpCond::Pin, 7),                 //  5: WS high: left done
    pioasm::jmp(JmpCond::Always, 2),              //  6
    pioasm::push_noblock(),                       //  7: left word
    pioasm::wait(0, WaitSrc::Gpio, PIN_I2S_BCK),  //  8: right loop
    pioasm::wait(1, WaitSrc::Gpio, PIN_I2S_BCK),  //  9
    pioasm::in_pins(1),                           // 10
    pioasm::jmp(JmpCond::Pin, 8),                 // 11: WS still high
    pioasm::push_noblock(),                       // 12: right word
    // .wrap
];

struct I2sState {
    producer: Producer<'static, Sample, RING_DEPTH>,
    ch: DmaChannel,
    /// Consumer tail into the DMA ring, in words.
    tail: usize,
    /// An odd leftover word (a left sample whose right half hasn't landed).
    pending_left: Option<u32>,
    /// Rate-measurement window.
    window_start_us: u64,
    window_samples: u32,
}

static I2S: HwLock<I2sState> = HwLock::new();

/// Rate measurement window length.
const RATE_WINDOW_US: u64 = 500_000;

/// Loads the capture program onto PIO2 and starts the free-running DMA.
pub fn provision(pio: pac::PIO2, ch: DmaChannel, producer: Producer<'static, Sample, RING_DEPTH>) {
    // The I2S pins sit at the bottom of the pin map; window the block there
    // before loading anything.
    pio.gpiobase().write(|w| unsafe { w.bits(0) });

    for (i, &op) in I2S_PROGRAM.iter().enumerate() {
        pio.instr_mem(i).write(|w| unsafe { w.bits(op as u32) });
    }

    let sm = pio.sm(0);
    // Full speed: the program is edge-driven by BCK, not by the clock.
    sm.sm_clkdiv().write(|w| unsafe { w.int().bits(1) });
    sm.sm_execctrl().write(|w| unsafe {
        w.wrap_top()
            .bits(I2S_PROGRAM.len() as u8 - 1)
            .wrap_bottom()
            .bits(0)
            .jmp_pin()
            .bits(PIN_I2S_WS)
    });
    // Shift left so the last bit in is the LSB; no autopush, the program
    // pushes at each WS flip.
    sm.sm_shiftctrl().write(|w| {
        w.in_shiftdir().clear_bit();
        w.autopush().clear_bit()
    });
    sm.sm_pinctrl()
        .write(|w| unsafe { w.in_base().bits(PIN_I2S_DAT) });
    // Start from instruction 0.
    sm.sm_instr()
        .write(|w| unsafe { w.bits(pioasm::jmp(JmpCond::Always, 0) as u32) });

    // DMA: PIO RX FIFO -> ring, free-running, wrapping on the write side.
    let base = core::ptr::addr_of_mut!(DMA_RING) as u32;
    let regs = ch.regs();
    regs.ch_read_addr()
        .write(|w| unsafe { w.bits(pac::PIO2::ptr() as u32 + 0x020) }); // RXF0
    regs.ch_write_addr().write(|w| unsafe { w.bits(base) });
    regs.ch_trans_count()
        .write(|w| unsafe { w.bits(0xFFFF_FFF) });
    regs.ch_ctrl_trig().write(|w| unsafe {
        w.en()
            .set_bit()
            .data_size()
            .bits(2)
            .incr_read()
            .clear_bit()
            .incr_write()
            .set_bit()
            .ring_sel()
            .set_bit() // wrap the write address
            .ring_size()
            .bits(RING_SIZE_BITS)
            .treq_sel()
            .bits(DREQ_PIO2_RX0)
            .irq_quiet()
            .set_bit()
    });

    // Enable the state machine.
    pio.ctrl().modify(|r, w| unsafe { w.sm_enable().bits(r.sm_enable().bits() | 1) });

    I2S.install(I2sState {
        producer,
        ch,
        tail: 0,
        pending_left: None,
        window_start_us: 0,
        window_samples: 0,
    });
}

/// Chases the DMA write pointer, pairing raw words into samples and
/// pushing them at the capture ring. Also maintains the 500 ms measured
/// sample rate that feeds the resampler and the health display.
pub fn poll(pipeline: &mut AudioPipeline) {
    let mut state = I2S.borrow();
    let state = &mut *state;

    let base = core::ptr::addr_of!(DMA_RING) as u32;
    let head = ((state.ch.write_addr() - base) / 4) as usize % RING_WORDS;

    while state.tail != head {
        let word = unsafe { (*core::ptr::addr_of!(DMA_RING)).0[state.tail] };
        state.tail = (state.tail + 1) % RING_WORDS;

        match state.pending_left.take() {
            None => state.pending_left = Some(word),
            Some(left) => {
                push_captured(&mut state.producer, sample_from_raw(left, word), &TELEMETRY);
                state.window_samples += 1;
            }
        }
    }

    // Rate window: samples pushed over elapsed time.
    let timer = unsafe { &*pac::TIMER0::ptr() };
    let now = time_us(timer);
    if state.window_start_us == 0 {
        state.window_start_us = now;
        state.window_samples = 0;
    } else if now - state.window_start_us >= RATE_WINDOW_US {
        let rate =
            (state.window_samples as u64 * 1_000_000 / (now - state.window_start_us)) as u32;
        TELEMETRY.set_input_rate(rate);
        pipeline.set_input_rate(rate);
        state.window_start_us = now;
        state.window_samples = 0;
    }
}
