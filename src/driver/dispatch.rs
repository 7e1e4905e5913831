//! Core-1 dispatch.
//!
//! Core 1 runs exactly two things: the scanout DMA completion ISR (which
//! invokes the donated scanline callback) and one registered background
//! task, polled in a tight loop between interrupts. Nothing else executes
//! there, and cross-core state is limited to single-word atomics plus the
//! two SPSC queues.
//!
//! The scanline callback is loaned with [`IRef`]: the owning stack frame
//! on core 0 donates an exclusive reference for a scope, the ISR observes
//! it, and the donation cannot end while an observation is in flight.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rp235x_pac as pac;
use rp235x_pac::interrupt;
use scopeguard::defer;

use super::{i2s, scanout};
use crate::audio::{AudioPipeline, ISLAND_QUEUE_DEPTH, RING_DEPTH};
use crate::config::Config;
use crate::rast::ScanBuffer;
use crate::util::ring::{Consumer, Producer};
use crate::util::spin_lock::SpinLock;
use dsp::Sample;
use packet::DataIsland;

const EMPTY: usize = 0;
const LOADING: usize = 1;
const LOADED: usize = 2;
const LOCKED: usize = 3;

/// A mechanism for loaning a reference to an interrupt handler.
///
/// An `IRef` is initially empty. An exclusive reference to the scanline
/// callback is *donated* with [`IRef::donate`]; this loads the cell, runs a
/// supplied closure, and busy-waits any observer out before emptying the
/// cell again on return. The ISR *observes* the contents with
/// [`IRef::observe`], which never busy-waits: if the cell is empty or
/// already locked it simply does nothing, and scanout sends whatever the
/// scratch line already holds.
pub(crate) struct IRef {
    state: AtomicUsize,
    poisoned: AtomicBool,
    contents: Cell<(usize, usize)>,
}

unsafe impl Sync for IRef {}

impl IRef {
    pub const fn new() -> Self {
        IRef {
            state: AtomicUsize::new(EMPTY),
            poisoned: AtomicBool::new(false),
            contents: Cell::new((0, 0)),
        }
    }

    /// Donates `val` to observers for the duration of `scope`.
    ///
    /// # Panics
    ///
    /// If the cell is not empty: donation cannot nest.
    pub fn donate<'env, F, R>(&self, val: &'env mut F, scope: impl FnOnce() -> R) -> R
    where
        F: FnMut(usize, &mut ScanBuffer) + Send + 'env,
    {
        let r = self
            .state
            .compare_exchange(EMPTY, LOADING, Ordering::Acquire, Ordering::Relaxed);
        assert_eq!(r, Ok(EMPTY), "concurrent/reentrant donation to IRef");

        // Erase the callback's type so it can sit in a static cell.
        let val: &mut (dyn FnMut(usize, &mut ScanBuffer) + Send + 'env) = val;
        // Safety: reinterpreted back to the same type in `observe`, with a
        // narrower lifetime.
        let val: (usize, usize) = unsafe { core::mem::transmute(val) };

        self.contents.set(val);
        self.state.store(LOADED, Ordering::Release);

        defer! {{
            // Wait for any in-flight observation, then take the cell back.
            // Spin rather than sleep: the observer is an ISR on the other
            // core, and nothing would wake this core for it.
            loop {
                let r = self.state.compare_exchange_weak(
                    LOADED,
                    EMPTY,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                );
                if r.is_ok() { break }
                core::hint::spin_loop();
            }

            if self.poisoned.load(Ordering::Acquire) {
                panic!("IRef poisoned by panic in observer")
            }
        }}

        scope()
    }

    /// Locks the cell and runs `body` on the donated callback, if one is
    /// present and not already being observed. Never busy-waits.
    pub fn observe<R, F>(&self, body: F) -> Option<R>
    where
        F: FnOnce(&mut (dyn FnMut(usize, &mut ScanBuffer) + Send)) -> R,
    {
        self.state
            .compare_exchange(LOADED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| {
                if self.poisoned.load(Ordering::Acquire) {
                    panic!("IRef poisoned by panic in observer")
                }

                let poisoner =
                    scopeguard::guard((), |_| self.poisoned.store(true, Ordering::Release));

                let result = {
                    let r = self.contents.get();
                    // Safety: placed there by `donate`, unique by the state
                    // exchange above, and `donate` cannot return while we
                    // hold LOCKED.
                    let r: &mut (dyn FnMut(usize, &mut ScanBuffer) + Send) =
                        unsafe { core::mem::transmute(r) };
                    body(r)
                };
                self.state.store(LOADED, Ordering::Release);
                scopeguard::ScopeGuard::into_inner(poisoner);
                result
            })
    }
}

/// The scanline callback cell.
pub(crate) static SCANLINE: IRef = IRef::new();

/// The registered background task, as a bare fn pointer (zero means none).
static BACKGROUND: AtomicUsize = AtomicUsize::new(0);

/// Set once the application wants scanout running.
static START_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Set by the scanout ISR at each frame rollover, consumed by the audio
/// task to pace its once-per-frame packets.
static FRAME_TICK: AtomicBool = AtomicBool::new(false);

/// Registers `task` as the core-1 background task. Replaces any previous
/// registration; the dispatcher reads it once per loop.
pub fn register_background(task: fn()) {
    BACKGROUND.store(task as usize, Ordering::Release);
}

pub(crate) fn request_start() {
    START_REQUESTED.store(true, Ordering::Release);
    cortex_m::asm::sev();
}

pub(crate) fn frame_tick() {
    FRAME_TICK.store(true, Ordering::Release);
}

/// Takes the pending frame tick, if any.
pub fn take_frame_tick() -> bool {
    FRAME_TICK.swap(false, Ordering::AcqRel)
}

/// Core-1 entry point. Unmasks the scanout IRQ for this core, waits for
/// the start request, then loops the background task forever.
pub fn core1_main() -> ! {
    // Safety: unmasking is the whole point; the handler below is in place.
    unsafe { cortex_m::peripheral::NVIC::unmask(pac::Interrupt::DMA_IRQ_0) };

    while !START_REQUESTED.load(Ordering::Acquire) {
        cortex_m::asm::wfe();
    }
    scanout::start();

    loop {
        let task = BACKGROUND.load(Ordering::Acquire);
        if task != 0 {
            // Safety: only `register_background` stores here, and it stores
            // a real fn().
            let task: fn() = unsafe { core::mem::transmute(task) };
            task();
        } else {
            cortex_m::asm::wfi();
        }
    }
}

#[interrupt]
fn DMA_IRQ_0() {
    scanout::dma_irq();
}

// --- The audio background task -------------------------------------------

/// Everything the audio background task owns: the pipeline stages plus the
/// endpoint halves of both queues.
pub struct AudioTask {
    pub pipeline: AudioPipeline,
    pub samples: Consumer<'static, Sample, RING_DEPTH>,
    pub islands: Producer<'static, DataIsland, ISLAND_QUEUE_DEPTH>,
}

// Not a `HwLock`: unlike an ISR loan, contention here is routine -- the
// core-0 fallback and the core-1 loop both poll it, and the loser walks
// away.
static AUDIO_TASK: SpinLock<Option<AudioTask>> = SpinLock::new(None);

/// Shared user configuration. Core 0 writes it; the audio task and the
/// scanline callback read it. The dirty flag saves the audio task from
/// re-applying it every pass.
pub static CONFIG: SpinLock<Config> = SpinLock::new(Config {
    dc_filter_on: false,
    lpf_on: false,
    src_mode: dsp::resample::Mode::Decimate,
    effects: crate::config::Effects {
        scanlines: false,
        shadow_mode: crate::config::ShadowMode::Compound,
    },
});
pub static CONFIG_DIRTY: AtomicBool = AtomicBool::new(false);

/// Installs the audio task. Call once from init, before core 1 launches.
pub fn install_audio_task(task: AudioTask) {
    *AUDIO_TASK.try_lock().expect("audio task install race") = Some(task);
}

/// The audio background task body. Registered on core 1; core 0 may call
/// it too as a starvation fallback -- the `try_lock` keeps the pipeline
/// single-threaded either way.
pub fn audio_background() {
    let mut guard = match AUDIO_TASK.try_lock() {
        Some(g) => g,
        None => return, // the other core has it; that's fine
    };
    let task = match guard.as_mut() {
        Some(t) => t,
        None => return,
    };

    if CONFIG_DIRTY.swap(false, Ordering::AcqRel) {
        if let Some(config) = CONFIG.try_lock() {
            task.pipeline.apply_config(&config);
        } else {
            // Core 0 is mid-update; pick it up next pass.
            CONFIG_DIRTY.store(true, Ordering::Release);
        }
    }

    i2s::poll(&mut task.pipeline);

    if take_frame_tick() {
        task.pipeline.frame_tick(&mut task.islands);
    }

    while task.pipeline.process(&mut task.samples, &mut task.islands) > 0 {}
}
