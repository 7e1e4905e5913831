//! Health counters.
//!
//! Everything in here is written from hot paths (scanline ISR, audio poll,
//! capture loop) and read from the core-0 control loop for the diagnostics
//! page, so it's all single-word atomics with relaxed ordering -- the
//! numbers are monitoring data, not synchronisation.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Process-wide counter block. One static instance lives for the life of
/// the firmware.
#[derive(Debug)]
pub struct Telemetry {
    /// Source frames captured to the framebuffer.
    frames_captured: AtomicU32,
    /// Output frames scanned out.
    frames_output: AtomicU32,
    /// Audio samples dropped because the capture ring was full.
    overflows: AtomicU32,
    /// Data islands replaced with silence because the queue was empty.
    underruns: AtomicU32,
    /// Confirmed losses of the incoming sync signal.
    sync_losses: AtomicU32,
    /// Whether the capture side currently sees no usable signal.
    no_signal: AtomicBool,
    /// Most recent measured audio input rate, Hz.
    input_rate_hz: AtomicU32,
}

impl Telemetry {
    pub const fn new() -> Self {
        Telemetry {
            frames_captured: AtomicU32::new(0),
            frames_output: AtomicU32::new(0),
            overflows: AtomicU32::new(0),
            underruns: AtomicU32::new(0),
            sync_losses: AtomicU32::new(0),
            no_signal: AtomicBool::new(false),
            input_rate_hz: AtomicU32::new(0),
        }
    }

    pub fn frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_output(&self) {
        self.frames_output.fetch_add(1, Ordering::Relaxed);
    }

    pub fn overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_lost(&self) {
        self.sync_losses.fetch_add(1, Ordering::Relaxed);
        self.no_signal.store(true, Ordering::Relaxed);
    }

    pub fn sync_restored(&self) {
        self.no_signal.store(false, Ordering::Relaxed);
    }

    pub fn no_signal(&self) -> bool {
        self.no_signal.load(Ordering::Relaxed)
    }

    pub fn set_input_rate(&self, hz: u32) {
        self.input_rate_hz.store(hz, Ordering::Relaxed);
    }

    /// Takes a coherent-enough copy for display. Individual counters are
    /// exact; cross-counter skew of a frame or two is fine for a status
    /// page.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_output: self.frames_output.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            sync_losses: self.sync_losses.load(Ordering::Relaxed),
            no_signal: self.no_signal.load(Ordering::Relaxed),
            input_rate_hz: self.input_rate_hz.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub frames_captured: u32,
    pub frames_output: u32,
    pub overflows: u32,
    pub underruns: u32,
    pub sync_losses: u32,
    pub no_signal: bool,
    pub input_rate_hz: u32,
}

/// Frame-slip estimator.
///
/// The source free-runs near 59.2 Hz against our fixed 60 Hz output, so the
/// single-framebuffer design repeats (or skips) a frame now and then. This
/// turns two snapshots of the frame counters into a slips-per-minute figure
/// for the diagnostics page.
#[derive(Copy, Clone, Debug, Default)]
pub struct SlipEstimator {
    last_captured: u32,
    last_output: u32,
}

impl SlipEstimator {
    pub const fn new() -> Self {
        SlipEstimator {
            last_captured: 0,
            last_output: 0,
        }
    }

    /// Feeds a snapshot taken `elapsed_ms` after the previous one; returns
    /// slips per minute, or `None` until it has a baseline.
    pub fn update(&mut self, snap: &Snapshot, elapsed_ms: u32) -> Option<u32> {
        let d_cap = snap.frames_captured.wrapping_sub(self.last_captured);
        let d_out = snap.frames_output.wrapping_sub(self.last_output);
        let first = self.last_captured == 0 && self.last_output == 0;
        self.last_captured = snap.frames_captured;
        self.last_output = snap.frames_output;
        if first || elapsed_ms == 0 {
            return None;
        }
        let slip = (d_out as i64 - d_cap as i64).abs() as u64;
        Some((slip * 60_000 / elapsed_ms as u64) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let t = Telemetry::new();
        t.frame_captured();
        t.frame_captured();
        t.overflow();
        t.underrun();
        t.underrun();
        t.underrun();
        let s = t.snapshot();
        assert_eq!(s.frames_captured, 2);
        assert_eq!(s.overflows, 1);
        assert_eq!(s.underruns, 3);
    }

    #[test]
    fn sync_loss_sets_and_restores_the_flag() {
        let t = Telemetry::new();
        assert!(!t.no_signal());
        t.sync_lost();
        assert!(t.no_signal());
        assert_eq!(t.snapshot().sync_losses, 1);
        t.sync_restored();
        assert!(!t.no_signal());
        // The loss count is history; restoring doesn't erase it.
        assert_eq!(t.snapshot().sync_losses, 1);
    }

    #[test]
    fn slip_estimator_needs_a_baseline() {
        let mut e = SlipEstimator::new();
        let snap = Snapshot {
            frames_captured: 59,
            frames_output: 60,
            ..Snapshot::default()
        };
        assert_eq!(e.update(&snap, 1_000), None);
    }

    #[test]
    fn slip_is_scaled_to_a_minute() {
        let mut e = SlipEstimator::new();
        let mut snap = Snapshot {
            frames_captured: 100,
            frames_output: 100,
            ..Snapshot::default()
        };
        e.update(&snap, 1_000);
        // One second later: 59 source frames vs 60 output frames.
        snap.frames_captured += 59;
        snap.frames_output += 60;
        assert_eq!(e.update(&snap, 1_000), Some(60));
        // Locked source: no slip.
        snap.frames_captured += 60;
        snap.frames_output += 60;
        assert_eq!(e.update(&snap, 1_000), Some(0));
    }
}
