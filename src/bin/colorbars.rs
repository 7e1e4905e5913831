//! Output-only test pattern.
//!
//! Eight vertical colour bars, no capture, no audio. Useful for proving
//! the HSTX side of a board (and the cable, and the sink) before any
//! source is wired up.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {

#[cfg(feature = "panic-halt")]
extern crate panic_halt;

use mvshd::{dispatch, multicore, OUT_WIDTH};
use rp235x_pac as pac;

/// The classic bar order: white, yellow, cyan, green, magenta, red, blue,
/// black.
const BARS: [u16; 8] = [
    0xFFFF, 0xFFE0, 0x07FF, 0x07E0, 0xF81F, 0xF800, 0x001F, 0x0000,
];

fn core1_entry() -> ! {
    dispatch::core1_main()
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = pac::Peripherals::take().unwrap();
    let mvshd::Parts { mut hdmi, sio, .. } = mvshd::init(p);

    multicore::launch_core1(&sio, core1_entry);

    hdmi.with_scanline(
        |_row, buf| {
            let pixels: &mut [u16; OUT_WIDTH] = buf;
            for (x, p) in pixels.iter_mut().enumerate() {
                *p = BARS[x * BARS.len() / OUT_WIDTH];
            }
        },
        |hdmi| {
            hdmi.start();
            loop {
                cortex_m::asm::wfi();
            }
        },
    )
}

    } else {
        fn main() {}
    }
}
