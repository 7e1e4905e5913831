//! Core-1 launch.
//!
//! The boot ROM parks core 1 in a wait loop reading the inter-core FIFO.
//! Waking it is a fixed handshake: a zero-flush preamble, then the vector
//! table, stack pointer and entry point, each echoed back by the ROM. This
//! is the datasheet sequence, written against the SIO FIFO registers.

use core::sync::atomic::{AtomicUsize, Ordering};

use rp235x_pac as pac;

/// Core-1 stack, independent of core 0's.
const CORE1_STACK_WORDS: usize = 1024;
static mut CORE1_STACK: [usize; CORE1_STACK_WORDS] = [0; CORE1_STACK_WORDS];

/// The registered entry, stashed where the trampoline can find it (the ROM
/// calls the launch address with no arguments).
static CORE1_ENTRY: AtomicUsize = AtomicUsize::new(0);

extern "C" fn core1_trampoline() -> ! {
    let entry = CORE1_ENTRY.load(Ordering::Acquire);
    // Safety: `launch_core1` stored a real `fn() -> !` before handing the
    // trampoline address to the ROM.
    let entry: fn() -> ! = unsafe { core::mem::transmute(entry) };
    entry()
}

fn fifo_drain(sio: &pac::SIO) {
    while sio.fifo_st().read().vld().bit_is_set() {
        let _ = sio.fifo_rd().read().bits();
    }
}

fn fifo_push_blocking(sio: &pac::SIO, value: u32) {
    while sio.fifo_st().read().rdy().bit_is_clear() {}
    sio.fifo_wr().write(|w| unsafe { w.bits(value) });
    cortex_m::asm::sev();
}

fn fifo_pop_blocking(sio: &pac::SIO) -> u32 {
    while sio.fifo_st().read().vld().bit_is_clear() {
        cortex_m::asm::wfe();
    }
    sio.fifo_rd().read().bits()
}

/// Starts `entry` on core 1 with its own stack.
///
/// Retries the handshake until the ROM echoes the full sequence; per the
/// datasheet, a mismatched echo restarts from the beginning.
pub fn launch_core1(sio: &pac::SIO, entry: fn() -> !) {
    CORE1_ENTRY.store(entry as usize, Ordering::Release);

    let vector_table = unsafe { (*cortex_m::peripheral::SCB::PTR).vtor.read() };
    let stack_top = unsafe {
        (core::ptr::addr_of!(CORE1_STACK) as *const usize).add(CORE1_STACK_WORDS) as u32
    };

    let cmds: [u32; 6] = [
        0,
        0,
        1,
        vector_table,
        stack_top,
        core1_trampoline as *const () as u32,
    ];

    let mut i = 0;
    while i < cmds.len() {
        let cmd = cmds[i];
        if cmd == 0 {
            // Zero commands flush the FIFO state machine on the far side.
            fifo_drain(sio);
            cortex_m::asm::sev();
        }
        fifo_push_blocking(sio, cmd);
        let response = fifo_pop_blocking(sio);
        // Move on only when the ROM echoes; otherwise start over.
        i = if response == cmd { i + 1 } else { 0 };
    }
}
