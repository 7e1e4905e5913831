//! Harness diagnostics without a logic analyser.
//!
//! Samples every capture-facing input continuously and paints a live
//! activity map onto the HDMI output: one row per signal, check for
//! toggling, cross for stuck. Flash this build when a board comes back
//! from assembly and the wiring report is on whatever monitor is handy.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {

#[cfg(feature = "panic-halt")]
extern crate panic_halt;

use core::fmt::Write;

use mvshd::osd::grid::{TextGrid, COLS};
use mvshd::osd::selftest::ActivityProbe;
use mvshd::osd::{Cursor, COLOR_ALERT, COLOR_OK};
use mvshd::rast::compose;
use mvshd::util::spin_lock::SpinLock;
use mvshd::{dispatch, multicore, SRC_WIDTH};
use rp235x_pac as pac;

static GRID: SpinLock<TextGrid> = SpinLock::new(TextGrid::new());

/// Everything from csync up through the shadow pin, window-relative.
const SCAN_MASK: u32 = 0x3FFFF << 11;

const NAMES: [&str; 18] = [
    "csync", "pclk", "b4", "b3", "b2", "b1", "b0", "g4", "g3", "g2", "g1",
    "g0", "r4", "r3", "r2", "r1", "r0", "shdw",
];

fn core1_entry() -> ! {
    dispatch::core1_main()
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = pac::Peripherals::take().unwrap();
    let mvshd::Parts {
        mut hdmi,
        sio,
        timer,
        ..
    } = mvshd::init(p);

    multicore::launch_core1(&sio, core1_entry);

    hdmi.with_scanline(
        |row, buf| {
            static BLACK: [u16; SRC_WIDTH] = [0; SRC_WIDTH];
            let grid = GRID.try_lock();
            let view = grid.as_ref().map(|g| g.view(100, 100));
            compose(buf, &BLACK, row, Default::default(), view.as_ref());
        },
        |hdmi| {
            hdmi.start();
            scan_loop(&sio, &timer)
        },
    )
}

fn scan_loop(sio: &pac::SIO, timer: &pac::TIMER0) -> ! {
    let mut probe = ActivityProbe::new(SCAN_MASK);
    let mut window_start = 0u64;

    loop {
        let lo = sio.gpio_in().read().bits();
        let hi = sio.gpio_hi_in().read().bits();
        probe.sample((lo >> 16) | (hi << 16));

        let now = mvshd::time_us(timer);
        if window_start == 0 {
            window_start = now;
        }
        if now - window_start < 500_000 {
            continue;
        }
        window_start = now;

        let report = probe.finish_window();
        if let Some(mut grid) = GRID.try_lock() {
            let mut c = Cursor::new(&mut grid, 0, 2);
            let _ = write!(c, "pin scan  {} samples", report.samples);
            for (i, name) in NAMES.iter().enumerate() {
                let alive = report.is_toggling(11 + i as u32);
                let row = (1 + i % 15) as u8;
                let col = 2 + (i / 15) as u8 * (COLS as u8 / 2);
                let (color, glyph) = if alive {
                    (COLOR_OK, font_8x8::GLYPH_CHECK)
                } else {
                    (COLOR_ALERT, font_8x8::GLYPH_CROSS)
                };
                grid.puts(row, col, name.as_bytes());
                grid.putc_color(row, col + 6, glyph, color);
            }
        }
    }
}

    } else {
        fn main() {}
    }
}
