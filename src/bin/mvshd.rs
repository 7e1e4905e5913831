//! The appliance.
//!
//! # Theory of operation
//!
//! Core 0 owns control: it brings the driver up, restores stored settings,
//! launches core 1, and then loops forever capturing source frames,
//! polling the front-panel buttons, and refreshing the diagnostics overlay.
//! Core 1 is owned by the dispatcher: the scanout ISR calls the scanline
//! callback donated below, and the audio pipeline runs as the registered
//! background task between interrupts.
//!
//! The scanline callback composes straight out of the capture framebuffer.
//! That framebuffer is deliberately unsynchronised -- when capture loses
//! the race for a line, the output shows the previous frame's pixels for
//! that line, which is the single-framebuffer trade this design makes. On
//! loss of signal the capture loop simply stops writing, so the callback
//! keeps re-sending the last good frame while the overlay says NO SIGNAL.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {

#[cfg(feature = "panic-halt")]
extern crate panic_halt;

use core::sync::atomic::{AtomicBool, Ordering};

use mvshd::config::{Config, Debounce};
use mvshd::dispatch::{AudioTask, CONFIG, CONFIG_DIRTY};
use mvshd::osd::grid::TextGrid;
use mvshd::osd::selftest::ActivityProbe;
use mvshd::rast::compose;
use mvshd::telemetry::{SlipEstimator, TELEMETRY};
use mvshd::util::spin_lock::SpinLock;
use mvshd::{audio, capture, dispatch, multicore, osd, userdata};
use mvshd::{OUT_HEIGHT, SRC_HEIGHT, SRC_WIDTH};
use rp235x_pac as pac;

/// Output rows above and below the doubled 224-line picture.
const V_OFFSET: usize = (OUT_HEIGHT - 2 * SRC_HEIGHT) / 2;

/// Where the overlay sits on screen.
const OSD_X: usize = 192;
const OSD_Y: usize = 176;

/// Settings blob home: last 64 KiB sector of the 2 MiB flash, via XIP.
const USERDATA_ADDR: usize = 0x1000_0000 + 0x001F_0000;
const USERDATA_MAX: usize = 4096;

/// The OSD grid, written by the control loop, read (try-lock, skip on
/// contention) by the scanline callback.
static OSD: SpinLock<TextGrid> = SpinLock::new(TextGrid::new());
static OSD_VISIBLE: AtomicBool = AtomicBool::new(false);

/// Pins the self-test page watches, as window-relative bits (GPIOBASE is
/// 16): csync, pclk, the 16-pin colour bus.
const SELFTEST_MASK: u32 = 0x3FFFF << 11;

fn core1_entry() -> ! {
    dispatch::core1_main()
}

/// Reads the full capture-facing pin picture, window-relative: GPIO 16
/// lands in bit 0.
fn window_pins(sio: &pac::SIO) -> u32 {
    let lo = sio.gpio_in().read().bits();
    let hi = sio.gpio_hi_in().read().bits();
    (lo >> 16) | (hi << 16)
}

fn button_pressed(sio: &pac::SIO, pin: u8) -> bool {
    // Both buttons live in the high bank, active low.
    sio.gpio_hi_in().read().bits() & (1 << (pin - 32)) == 0
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = pac::Peripherals::take().unwrap();
    let mvshd::Parts {
        mut hdmi,
        sample_cons,
        island_prod,
        sio,
        timer,
    } = mvshd::init(p);

    // Restore stored settings; a missing or foreign blob leaves defaults.
    let mut config = Config::default();
    let blob = unsafe {
        core::slice::from_raw_parts(USERDATA_ADDR as *const u8, USERDATA_MAX)
    };
    if let Ok(settings) = userdata::parse(blob) {
        settings.apply(&mut config);
    }
    *CONFIG.lock() = config;
    CONFIG_DIRTY.store(true, Ordering::Release);

    // Audio pipeline runs as the core-1 background task.
    dispatch::install_audio_task(AudioTask {
        pipeline: audio::AudioPipeline::new(),
        samples: sample_cons,
        islands: island_prod,
    });
    dispatch::register_background(dispatch::audio_background);

    multicore::launch_core1(&sio, core1_entry);

    let fb = mvshd::framebuffer_reader();
    let mut cached_effects = config.effects;

    hdmi.with_scanline(
        move |row, buf| {
            // Letterbox rows outside the doubled picture.
            static BLACK: [u16; SRC_WIDTH] = [0; SRC_WIDTH];
            let line: &[u16] = if row < V_OFFSET || row >= V_OFFSET + 2 * SRC_HEIGHT {
                &BLACK
            } else {
                let src_y = (row - V_OFFSET) / 2;
                &fb[src_y * SRC_WIDTH..][..SRC_WIDTH]
            };

            // Pick up effect changes when the config isn't mid-update.
            if let Some(c) = CONFIG.try_lock() {
                cached_effects = c.effects;
            }

            // Skip the overlay for a line rather than ever wait on core 0.
            let grid = if OSD_VISIBLE.load(Ordering::Relaxed) {
                OSD.try_lock()
            } else {
                None
            };
            let view = grid.as_ref().map(|g| g.view(OSD_X, OSD_Y));
            compose(buf, line, row, cached_effects, view.as_ref());
        },
        |hdmi| {
            hdmi.start();
            control_loop(&sio, &timer)
        },
    )
}

/// The core-0 controller: capture, buttons, OSD, self-test, telemetry.
fn control_loop(sio: &pac::SIO, timer: &pac::TIMER0) -> ! {
    let mut btn_effect = Debounce::new();
    let mut btn_mode = Debounce::new();
    let mut slip = SlipEstimator::new();
    let mut slip_fpm = 0;
    let mut probe = ActivityProbe::new(SELFTEST_MASK);
    let mut last_status_ms = 0u32;

    loop {
        // One source frame (or a loss-of-signal timeout) per pass.
        let shadow_mode = CONFIG.lock().effects.shadow_mode;
        if !capture::capture_frame(shadow_mode) {
            // Confirmed loss: surface the banner and silence the audio
            // path by just not feeding it -- the island queue drains to
            // null islands on its own.
            OSD_VISIBLE.store(true, Ordering::Relaxed);
        }

        // Starvation fallback: if scanout has core 1 saturated, run the
        // audio task from here. The task's own try-lock makes this safe.
        dispatch::audio_background();

        let now_ms = (mvshd::time_us(timer) / 1_000) as u32;
        let pressed_effect = button_pressed(sio, mvshd::PIN_BTN_EFFECT);
        let pressed_mode = button_pressed(sio, mvshd::PIN_BTN_MODE);

        if btn_effect.poll(pressed_effect, now_ms) {
            if pressed_mode {
                // Chord: toggle the diagnostics overlay.
                let visible = !OSD_VISIBLE.load(Ordering::Relaxed);
                OSD_VISIBLE.store(visible, Ordering::Relaxed);
            } else {
                let mut c = CONFIG.lock();
                c.dc_filter_on = !c.dc_filter_on;
                CONFIG_DIRTY.store(true, Ordering::Release);
            }
        }
        if btn_mode.poll(pressed_mode, now_ms) && !pressed_effect {
            let mut c = CONFIG.lock();
            c.src_mode = c.src_mode.next();
            CONFIG_DIRTY.store(true, Ordering::Release);
        }

        // Self-test: one pin-bank sample per frame; the probe wants both
        // levels inside a window to call a pin alive.
        probe.sample(window_pins(sio));

        // Status refresh twice a second.
        if now_ms.wrapping_sub(last_status_ms) >= 500 {
            last_status_ms = now_ms;
            let snap = TELEMETRY.snapshot();
            if let Some(fpm) = slip.update(&snap, 500) {
                slip_fpm = fpm;
            }
            let report = probe.finish_window();

            if let Some(mut grid) = OSD.try_lock() {
                if snap.no_signal {
                    osd::render_no_signal(&mut grid);
                } else {
                    osd::clear_no_signal(&mut grid);
                }
                osd::render_diagnostics(&mut grid, &snap, slip_fpm);
                osd::render_selftest(&mut grid, &report);
            }
        }
    }
}

    } else {
        fn main() {}
    }
}
