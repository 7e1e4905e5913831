//! The audio pipeline: capture ring in, HDMI data islands out.
//!
//! Runs as the core-1 background task (with a core-0 fallback when scanout
//! has core 1 saturated). Each call drains a batch from the capture ring,
//! runs the optional filters in place, resamples to the output rate, and
//! folds the result into audio sample packets four samples at a time. A
//! full island queue sheds packets silently -- an audio discontinuity is
//! preferable to ever making the scanout ISR wait.

use arrayvec::ArrayVec;

use crate::config::Config;
use crate::telemetry::Telemetry;
use crate::util::ring::{Consumer, Producer, SpscRing};
use dsp::dc::DcBlocker;
use dsp::lowpass::Lowpass;
use dsp::resample::{Mode as SrcMode, Resampler, DEFAULT_INPUT_RATE, OUTPUT_RATE};
use dsp::Sample;
use packet::acr::{CTS_48KHZ_25_2MHZ, N_48KHZ};
use packet::{audio as audio_packet, DataIsland, Packet, SyncLevels};

/// Capture ring depth, in samples. Two polls' worth of headroom at the
/// highest rate the source produces.
pub const RING_DEPTH: usize = 512;

/// Data-island queue depth. Scanout consumes at most a few islands per
/// line, so a short queue bounds latency.
pub const ISLAND_QUEUE_DEPTH: usize = 8;

/// Samples processed per pipeline pass.
pub const BATCH: usize = 64;

pub type AudioRing = SpscRing<Sample, RING_DEPTH>;
pub type IslandQueue = SpscRing<DataIsland, ISLAND_QUEUE_DEPTH>;

/// An island-queue slot's worth of nothing, for static initialisers.
pub const EMPTY_ISLAND: DataIsland = DataIsland {
    words: [0; packet::W_DATA_ISLAND],
};

/// Processing stages and packetiser state.
pub struct AudioPipeline {
    dc: DcBlocker,
    lpf: Lowpass,
    src: Resampler,
    /// Resampled output waiting for queue space, in 4-sample packet units.
    /// Sized so a full island queue doesn't immediately cost samples.
    collect: ArrayVec<[Sample; 128]>,
    /// Running IEC 60958 frame index for B-bit placement.
    frame_counter: u32,
}

impl AudioPipeline {
    pub fn new() -> Self {
        AudioPipeline {
            dc: DcBlocker::new(),
            lpf: Lowpass::new(),
            src: Resampler::new(DEFAULT_INPUT_RATE, OUTPUT_RATE),
            collect: ArrayVec::new(),
            frame_counter: 0,
        }
    }

    /// Applies the user configuration. Stages toggled off zero their own
    /// state, so this is safe to call on every change notification.
    pub fn apply_config(&mut self, config: &Config) {
        self.dc.set_enabled(config.dc_filter_on);
        self.lpf.set_enabled(config.lpf_on);
        if self.src.mode() != config.src_mode {
            self.src.set_mode(config.src_mode);
        }
    }

    pub fn set_dc_enabled(&mut self, enabled: bool) {
        self.dc.set_enabled(enabled);
    }

    pub fn cycle_src_mode(&mut self) -> SrcMode {
        self.src.cycle_mode()
    }

    pub fn src_mode(&self) -> SrcMode {
        self.src.mode()
    }

    /// Feeds the measured capture rate into the resampler. The measurement
    /// window jitters by a few Hz; retuning (and so resetting) the
    /// converter for that would glitch the stream twice a second, so small
    /// deltas are ignored.
    pub fn set_input_rate(&mut self, hz: u32) {
        let current = self.src.input_rate() as i64;
        if hz != 0 && (hz as i64 - current).abs() > 200 {
            self.src.set_input_rate(hz);
        }
    }

    /// Runs one pass: drains any backlog into the island queue, then pulls
    /// up to [`BATCH`] samples from `capture` through the stage chain.
    /// Returns the number of samples consumed, so callers can loop until
    /// the ring is dry.
    pub fn process(
        &mut self,
        capture: &mut Consumer<Sample, RING_DEPTH>,
        islands: &mut Producer<DataIsland, ISLAND_QUEUE_DEPTH>,
    ) -> usize {
        // Backlog first, so islands stranded by a full queue flow out even
        // when no new audio has arrived.
        self.pump(islands);

        let mut input = [Sample::SILENCE; BATCH];
        let n = capture.pop_slice(&mut input);
        if n == 0 {
            return 0;
        }

        self.dc.process(&mut input[..n]);
        self.lpf.process(&mut input[..n]);

        let mut output = [Sample::SILENCE; BATCH];
        let mut consumed = 0;
        while consumed < n {
            let progress = self.src.process(&input[consumed..n], &mut output);
            if progress.consumed == 0 && progress.produced == 0 {
                break;
            }
            consumed += progress.consumed;
            for &s in &output[..progress.produced] {
                // A stuffed collect buffer means the queue has been full
                // for tens of packets; shedding the newest sample is as
                // quiet as anything.
                let _ = self.collect.try_push(s);
            }
            self.pump(islands);
        }
        n
    }

    /// Number of resampled samples waiting for queue space.
    pub fn pending_samples(&self) -> usize {
        self.collect.len()
    }

    /// Folds the backlog into 4-sample audio packets while the queue has
    /// room.
    fn pump(&mut self, islands: &mut Producer<DataIsland, ISLAND_QUEUE_DEPTH>) {
        while self.collect.len() >= 4 && islands.free() > 0 {
            let quad = [
                (self.collect[0].l, self.collect[0].r),
                (self.collect[1].l, self.collect[1].r),
                (self.collect[2].l, self.collect[2].r),
                (self.collect[3].l, self.collect[3].r),
            ];
            let mut packet = Packet::zeroed();
            self.frame_counter =
                audio_packet::fill_samples(&mut packet, &quad, self.frame_counter);
            let island = DataIsland::encode(&packet, SyncLevels::IDLE);
            // Checked free() above; a failed push here would mean a second
            // producer, which the queue's split() forbids.
            let _ = islands.push(island);
            self.collect.drain(..4);
        }
    }

    /// Once-per-video-frame housekeeping: queues the clock-regeneration
    /// packet and the audio InfoFrame. Sheds them when the queue is full,
    /// like everything else.
    pub fn frame_tick(&mut self, islands: &mut Producer<DataIsland, ISLAND_QUEUE_DEPTH>) {
        let mut acr = Packet::zeroed();
        packet::acr::fill(&mut acr, N_48KHZ, CTS_48KHZ_25_2MHZ);
        let _ = islands.push(DataIsland::encode(&acr, SyncLevels::IDLE));

        let mut inf = Packet::zeroed();
        packet::infoframe::fill(&mut inf);
        let _ = islands.push(DataIsland::encode(&inf, SyncLevels::IDLE));
    }
}

/// Converts one raw I2S frame pair into a sample. The source sends
/// right-justified 24-bit frames whose low 16 bits are the PCM content.
#[inline]
pub fn sample_from_raw(raw_l: u32, raw_r: u32) -> Sample {
    Sample::new(raw_l as u16 as i16, raw_r as u16 as i16)
}

/// Pushes a captured sample, counting the drop if the ring is full.
#[inline]
pub fn push_captured(
    producer: &mut Producer<Sample, RING_DEPTH>,
    sample: Sample,
    telemetry: &Telemetry,
) {
    if producer.push(sample).is_err() {
        telemetry.overflow();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Telemetry;

    fn feed(
        producer: &mut Producer<Sample, RING_DEPTH>,
        samples: impl Iterator<Item = Sample>,
    ) -> usize {
        let mut n = 0;
        for s in samples {
            if producer.push(s).is_err() {
                break;
            }
            n += 1;
        }
        n
    }

    fn sine(n: usize, rate: f64) -> impl Iterator<Item = Sample> {
        (0..n).map(move |i| {
            let phase = 2.0 * core::f64::consts::PI * 1_000.0 * i as f64 / rate;
            let v = (phase.sin() * 30_000.0) as i16;
            Sample::new(v, v)
        })
    }

    #[test]
    fn islands_come_out_at_the_resampled_rate() {
        let mut ring = AudioRing::new(Sample::SILENCE);
        let (mut prod, mut cons) = ring.split();
        let mut queue = IslandQueue::new(EMPTY_ISLAND);
        let (mut iprod, mut icons) = queue.split();

        let mut p = AudioPipeline::new();
        p.apply_config(&Config::default()); // decimate, filters off

        let mut total_islands = 0usize;
        let mut fed = 0;
        let mut src_iter = sine(2_000, 55_555.0);
        while fed < 2_000 {
            fed += feed(&mut prod, src_iter.by_ref().take(64));
            loop {
                let consumed = p.process(&mut cons, &mut iprod);
                let mut drained = 0;
                while icons.pop().is_some() {
                    drained += 1;
                }
                total_islands += drained;
                if consumed == 0 && drained == 0 {
                    break;
                }
            }
        }
        // 2000 samples at 55555 -> 48000 is ~1727 out, in 4-sample packets;
        // at most one partial packet stays in the collect buffer.
        let expect = 2_000 * 48_000 / 55_555 / 4;
        assert!(p.pending_samples() < 4);
        assert!(
            (total_islands as i64 - expect as i64).abs() <= 1,
            "made {} islands, expected about {}",
            total_islands,
            expect
        );
    }

    #[test]
    fn full_queue_sheds_instead_of_blocking() {
        let mut ring = AudioRing::new(Sample::SILENCE);
        let (mut prod, mut cons) = ring.split();
        let mut queue = IslandQueue::new(EMPTY_ISLAND);
        let (mut iprod, _icons) = queue.split();

        let mut p = AudioPipeline::new();
        p.apply_config(&Config::default());

        // Nobody drains the queue; the pipeline must keep consuming input
        // and never wedge.
        for _ in 0..20 {
            feed(&mut prod, sine(400, 55_555.0).take(400));
            let mut guard = 0;
            while p.process(&mut cons, &mut iprod) > 0 {
                guard += 1;
                assert!(guard < 1_000, "pipeline wedged on a full queue");
            }
        }
        assert_eq!(cons.available(), 0);
    }

    #[test]
    fn dc_scenario_settles_to_silence() {
        // Constant +8192 on both channels with the DC filter on: after four
        // thousand output samples the stream is at most +/-16.
        let mut ring = AudioRing::new(Sample::SILENCE);
        let (mut prod, mut cons) = ring.split();
        let mut queue = IslandQueue::new(EMPTY_ISLAND);
        let (mut iprod, mut icons) = queue.split();

        let mut p = AudioPipeline::new();
        let mut config = Config::default();
        config.dc_filter_on = true;
        p.apply_config(&config);

        // Track output level through the filter directly: drain islands but
        // judge convergence on the filter's own output by re-running the
        // stage chain on a tap.
        let mut fed = 0usize;
        let mut islands = 0usize;
        while fed < 6_500 {
            fed += feed(
                &mut prod,
                core::iter::repeat(Sample::new(8_192, 8_192)).take(100),
            );
            while p.process(&mut cons, &mut iprod) > 0 {}
            while icons.pop().is_some() {
                islands += 1;
            }
        }
        assert!(islands > 0);

        // The pipeline's own DC stage state must have decayed: one more
        // constant sample through it comes out at silence level.
        let mut tail = [Sample::new(8_192, 8_192); 1];
        p.dc.process(&mut tail);
        assert!(tail[0].l.abs() <= 16, "still at {}", tail[0].l);
    }

    #[test]
    fn overflow_counts_and_drops_exactly_the_excess() {
        let mut ring = AudioRing::new(Sample::SILENCE);
        let (mut prod, _cons) = ring.split();
        let t = Telemetry::new();

        for i in 0..(RING_DEPTH - 1) as i16 {
            push_captured(&mut prod, Sample::new(i, i), &t);
        }
        assert_eq!(t.snapshot().overflows, 0);
        for _ in 0..3 {
            push_captured(&mut prod, Sample::SILENCE, &t);
        }
        assert_eq!(t.snapshot().overflows, 3);
        assert_eq!(prod.available(), (RING_DEPTH - 1) as u32);
    }

    #[test]
    fn frame_tick_emits_acr_and_infoframe() {
        let mut queue = IslandQueue::new(EMPTY_ISLAND);
        let (mut iprod, mut icons) = queue.split();
        let mut p = AudioPipeline::new();
        p.frame_tick(&mut iprod);
        assert_eq!(icons.available(), 2);
        let first = icons.pop().unwrap();
        let second = icons.pop().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn raw_frames_take_their_low_16_bits() {
        let s = sample_from_raw(0x00AB_1234, 0x00FF_FFFF);
        assert_eq!(s.l, 0x1234);
        assert_eq!(s.r, -1);
    }

    #[test]
    fn config_idempotence() {
        let mut a = AudioPipeline::new();
        let mut b = AudioPipeline::new();
        let mut config = Config::default();
        config.src_mode = SrcMode::Linear;
        config.dc_filter_on = true;
        a.apply_config(&config);
        b.apply_config(&config);
        b.apply_config(&config);

        let mut ring_a = AudioRing::new(Sample::SILENCE);
        let (mut pa, mut ca) = ring_a.split();
        let mut ring_b = AudioRing::new(Sample::SILENCE);
        let (mut pb, mut cb) = ring_b.split();
        let mut qa = IslandQueue::new(EMPTY_ISLAND);
        let (mut qpa, mut qca) = qa.split();
        let mut qb = IslandQueue::new(EMPTY_ISLAND);
        let (mut qpb, mut qcb) = qb.split();

        feed(&mut pa, sine(64, 55_555.0));
        feed(&mut pb, sine(64, 55_555.0));
        a.process(&mut ca, &mut qpa);
        b.process(&mut cb, &mut qpb);
        loop {
            match (qca.pop(), qcb.pop()) {
                (None, None) => break,
                (x, y) => assert_eq!(x, y),
            }
        }
    }
}
