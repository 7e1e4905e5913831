//! Definition of capture and display timing.
//!
//! Two timebases meet in this device. The *source* side is whatever the
//! arcade board emits: a ~6 MHz pixel clock and composite sync, described by
//! [`SourceTiming`]. The *output* side is fixed 640x480@60 DVI timing,
//! described by [`OutputTiming`]. The capture path runs entirely on source
//! time; the scanout ISR runs entirely on output time; the framebuffer is
//! the only thing they share.

/// System clock the firmware configures. The HSTX serialiser shifts two bits
/// per cycle, so this yields the 252 Mbps lane rate that 640x480@60 wants.
pub const CLK_SYS_HZ: u32 = 126_000_000;

/// CPU cycles per output pixel: the serialiser pops one pixel from the
/// command expander every 5 cycles at 126 MHz.
pub const CYCLES_PER_PIXEL: u32 = 5;

/// Interrupt-to-DMA-post latency reserve, in CPU cycles.
pub const SCANLINE_PREROLL_CYCLES: u32 = 200;

/// Hard deadline for the scanline callback: one horizontal period minus the
/// pre-roll. Composition of a full doubled line, scanline effect and OSD
/// overlay included, is budgeted against this.
pub const SCANLINE_BUDGET_CYCLES: u32 = 800 * CYCLES_PER_PIXEL - SCANLINE_PREROLL_CYCLES;

/// Timing of the captured source, in source pixel clocks and source lines.
#[derive(Copy, Clone, Debug)]
pub struct SourceTiming {
    /// Total pixel clocks per line, including blanking.
    pub h_total: usize,
    /// Total lines per frame, including vertical blanking.
    pub v_total: usize,
    /// Width of the horizontal sync pulse.
    pub h_sync_width: usize,
    /// Pixel clocks between the sync edge and the first active pixel.
    pub h_active_start: usize,
    /// Lines between vertical blanking and the first active line.
    pub v_active_start: usize,
    /// Active pixels per line; the framebuffer width.
    pub h_active: usize,
    /// Active lines per frame; the framebuffer height.
    pub v_active: usize,
    /// Sync classifier threshold, in pixel-clock counts: intervals at or
    /// below this are equalisation pulses, longer ones are real scanlines.
    pub h_threshold: u32,
}

impl SourceTiming {
    /// Nominal frame period in microseconds, used to size the loss-of-signal
    /// timeout.
    pub fn frame_period_us(&self, pixel_clock_hz: u32) -> u32 {
        ((self.h_total * self.v_total) as u64 * 1_000_000 / pixel_clock_hz as u64) as u32
    }
}

/// Neo-Geo MVS: 320x224 active inside a 384x264 total frame, ~6 MHz pixel
/// clock. The threshold of 288 sits between the equalisation half-line
/// (192) and a full line (384).
pub static MVS_320X224: SourceTiming = SourceTiming {
    h_total: 384,
    v_total: 264,
    h_sync_width: 28,
    h_active_start: 57,
    v_active_start: 24,
    h_active: 320,
    v_active: 224,
    h_threshold: 288,
};

/// Nominal MVS pixel clock, Hz.
pub const MVS_PIXEL_CLOCK_HZ: u32 = 6_000_000;

/// Output line timing, in output pixels and output lines.
#[derive(Copy, Clone, Debug)]
pub struct OutputTiming {
    pub h_front_porch: usize,
    pub h_sync_width: usize,
    pub h_back_porch: usize,
    pub h_active: usize,

    pub v_front_porch: usize,
    pub v_sync_width: usize,
    pub v_back_porch: usize,
    pub v_active: usize,
}

impl OutputTiming {
    pub const fn h_total(&self) -> usize {
        self.h_front_porch + self.h_sync_width + self.h_back_porch + self.h_active
    }

    pub const fn v_total(&self) -> usize {
        self.v_front_porch + self.v_sync_width + self.v_back_porch + self.v_active
    }

    /// Classifies an output scanline. `v_scanline` counts from the top of
    /// the frame, front porch first, as the scanout state machine does.
    pub fn phase_of(&self, v_scanline: usize) -> LinePhase {
        debug_assert!(v_scanline < self.v_total());
        if v_scanline < self.v_front_porch {
            LinePhase::FrontPorch
        } else if v_scanline < self.v_front_porch + self.v_sync_width {
            LinePhase::Sync
        } else if v_scanline < self.v_front_porch + self.v_sync_width + self.v_back_porch {
            LinePhase::BackPorch
        } else {
            LinePhase::Active {
                row: v_scanline - self.v_front_porch - self.v_sync_width - self.v_back_porch,
            }
        }
    }
}

/// Vertical phase of one output line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinePhase {
    FrontPorch,
    Sync,
    BackPorch,
    /// Active video; `row` is the destination row in `[0, v_active)`.
    Active { row: usize },
}

/// Industry standard 640x480 60Hz timing, negative sync polarity, 25.2 MHz
/// pixel clock.
pub static VGA_640X480_60: OutputTiming = OutputTiming {
    h_front_porch: 16,
    h_sync_width: 96,
    h_back_porch: 48,
    h_active: 640,

    v_front_porch: 10,
    v_sync_width: 2,
    v_back_porch: 33,
    v_active: 480,
};

/// Number of consecutive short intervals that constitutes a vertical sync.
pub const VSYNC_RUN_LENGTH: u32 = 8;

/// Events reported by the sync classifier, one per composite-sync interval.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// A full scanline went by; `line` is the source line counter.
    Hsync { line: usize },
    /// A run of equalisation pulses long enough to be vertical sync began.
    VsyncBegin,
    /// Vertical blanking ended; the line counter has been reset.
    VsyncEnd,
    /// Interval ignored (equalisation pulse inside blanking, or still
    /// searching for the first field).
    None,
}

/// Classifies the pixel-clock counts the sync decoder measures between
/// composite-sync edges.
///
/// Equalisation pulses during vertical blanking look like short H-syncs;
/// the classifier separates them by count, calls a run of
/// [`VSYNC_RUN_LENGTH`] shorts a vertical sync, and refuses to report lines
/// at all until it has seen one complete vertical sync (the power-on
/// "searching" state, where half a line may have gone by before the
/// hardware armed).
#[derive(Copy, Clone, Debug)]
pub struct SyncClassifier {
    threshold: u32,
    short_run: u32,
    in_vsync: bool,
    /// Cleared once the first complete vsync has been observed.
    searching: bool,
    line: usize,
}

impl SyncClassifier {
    pub const fn new(threshold: u32) -> Self {
        SyncClassifier {
            threshold,
            short_run: 0,
            in_vsync: false,
            searching: true,
            line: 0,
        }
    }

    pub fn for_source(src: &SourceTiming) -> Self {
        SyncClassifier::new(src.h_threshold)
    }

    /// Feeds one measured interval; returns what it was.
    pub fn classify(&mut self, count: u32) -> SyncEvent {
        if count <= self.threshold {
            self.short_run += 1;
            if self.short_run == VSYNC_RUN_LENGTH && !self.in_vsync {
                self.in_vsync = true;
                return SyncEvent::VsyncBegin;
            }
            return SyncEvent::None;
        }

        // A long interval: a real scanline.
        self.short_run = 0;
        if self.in_vsync {
            self.in_vsync = false;
            self.searching = false;
            self.line = 0;
            return SyncEvent::VsyncEnd;
        }
        if self.searching {
            return SyncEvent::None;
        }
        let line = self.line;
        self.line += 1;
        SyncEvent::Hsync { line }
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_totals_match_the_standard() {
        assert_eq!(VGA_640X480_60.h_total(), 800);
        assert_eq!(VGA_640X480_60.v_total(), 525);
    }

    #[test]
    fn every_scanline_has_exactly_one_phase() {
        let t = &VGA_640X480_60;
        let mut active = 0;
        let mut sync = 0;
        for v in 0..t.v_total() {
            match t.phase_of(v) {
                LinePhase::Active { row } => {
                    assert_eq!(row, active);
                    active += 1;
                }
                LinePhase::Sync => sync += 1,
                _ => {}
            }
        }
        assert_eq!(active, 480);
        assert_eq!(sync, 2);
    }

    #[test]
    fn active_rows_are_the_tail_of_the_frame() {
        let t = &VGA_640X480_60;
        assert_eq!(t.phase_of(0), LinePhase::FrontPorch);
        assert_eq!(t.phase_of(10), LinePhase::Sync);
        assert_eq!(t.phase_of(12), LinePhase::BackPorch);
        assert_eq!(t.phase_of(45), LinePhase::Active { row: 0 });
        assert_eq!(t.phase_of(524), LinePhase::Active { row: 479 });
    }

    #[test]
    fn frame_period_is_sane_for_mvs() {
        // 384 * 264 / 6 MHz is a hair under 17 ms.
        let us = MVS_320X224.frame_period_us(MVS_PIXEL_CLOCK_HZ);
        assert!(us > 16_000 && us < 18_000, "{}", us);
    }

    fn feed_frame(c: &mut SyncClassifier, lines: usize) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for _ in 0..VSYNC_RUN_LENGTH + 2 {
            events.push(c.classify(192));
        }
        for _ in 0..lines {
            events.push(c.classify(384));
        }
        events
    }

    #[test]
    fn searching_until_first_vsync() {
        let mut c = SyncClassifier::for_source(&MVS_320X224);
        // Lines before any vsync are swallowed.
        assert_eq!(c.classify(384), SyncEvent::None);
        assert_eq!(c.classify(384), SyncEvent::None);

        let events = feed_frame(&mut c, 3);
        assert!(events.contains(&SyncEvent::VsyncBegin));
        assert!(events.contains(&SyncEvent::VsyncEnd));
        assert_eq!(*events.last().unwrap(), SyncEvent::Hsync { line: 1 });
    }

    #[test]
    fn vsync_needs_a_full_run_of_shorts() {
        let mut c = SyncClassifier::for_source(&MVS_320X224);
        // Seven shorts, interrupted: no vsync.
        for _ in 0..VSYNC_RUN_LENGTH - 1 {
            assert_eq!(c.classify(100), SyncEvent::None);
        }
        assert_eq!(c.classify(384), SyncEvent::None); // still searching
        // Now a real one.
        for i in 0..VSYNC_RUN_LENGTH {
            let ev = c.classify(100);
            if i == VSYNC_RUN_LENGTH - 1 {
                assert_eq!(ev, SyncEvent::VsyncBegin);
            } else {
                assert_eq!(ev, SyncEvent::None);
            }
        }
        assert_eq!(c.classify(384), SyncEvent::VsyncEnd);
    }

    #[test]
    fn line_counter_resets_each_field() {
        let mut c = SyncClassifier::for_source(&MVS_320X224);
        // The long interval that ends blanking resets the counter; the next
        // long is line 0.
        feed_frame(&mut c, 5);
        assert_eq!(c.line(), 4);
        feed_frame(&mut c, 2);
        assert_eq!(c.line(), 1);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let mut c = SyncClassifier::new(288);
        // Exactly the threshold counts as short.
        for _ in 0..VSYNC_RUN_LENGTH {
            c.classify(288);
        }
        assert_eq!(c.classify(289), SyncEvent::VsyncEnd);
    }
}
