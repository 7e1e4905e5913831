//! Runtime configuration: the effect toggles the front panel and stored
//! settings can reach.
//!
//! Changes land between frames; the pipeline stages themselves own their
//! filter state and zero it when a toggle turns them off, so flipping a
//! switch never replays a stale transient.

use dsp::resample::Mode as SrcMode;
use smart_default::SmartDefault;

/// What the per-pixel shadow bit does. The shadow halving is applied when
/// the raw word is unpacked, the scanline effect when the line is composed;
/// in `Compound` mode the two are independent and stack to quarter
/// brightness, which is what the source hardware's shading looks like on a
/// CRT.
#[derive(Copy, Clone, Debug, PartialEq, Eq, SmartDefault)]
pub enum ShadowMode {
    /// Honour the shadow bit; it compounds with the scanline darken.
    #[default]
    Compound,
    /// Ignore the shadow bit entirely; only the scanline effect darkens.
    Ignore,
}

/// Video effect switches consulted by the compositor, once per scanline.
#[derive(Copy, Clone, Debug, PartialEq, Eq, SmartDefault)]
pub struct Effects {
    /// Darken odd output rows to fake the source's scanline structure.
    pub scanlines: bool,
    #[default(ShadowMode::Compound)]
    pub shadow_mode: ShadowMode,
}

/// The whole user-adjustable configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, SmartDefault)]
pub struct Config {
    pub dc_filter_on: bool,
    pub lpf_on: bool,
    #[default(SrcMode::Decimate)]
    pub src_mode: SrcMode,
    #[default(Effects { scanlines: false, shadow_mode: ShadowMode::Compound })]
    pub effects: Effects,
}

impl Config {
    /// Clamps out-of-range stored values to defaults: unknown SRC mode codes
    /// and effect bytes from a stale settings blob must not wedge the
    /// pipeline.
    pub fn src_mode_from_code(code: u8) -> SrcMode {
        match code {
            0 => SrcMode::Passthrough,
            1 => SrcMode::Decimate,
            2 => SrcMode::Linear,
            _ => SrcMode::Decimate,
        }
    }

    pub fn src_mode_code(mode: SrcMode) -> u8 {
        match mode {
            SrcMode::Passthrough => 0,
            SrcMode::Decimate => 1,
            SrcMode::Linear => 2,
        }
    }
}

/// Debounce interval for the effect buttons, milliseconds.
pub const BUTTON_DEBOUNCE_MS: u32 = 50;

/// Edge-triggered button debouncer: fires on press, then ignores presses
/// closer together than [`BUTTON_DEBOUNCE_MS`].
#[derive(Copy, Clone, Debug, Default)]
pub struct Debounce {
    was_pressed: bool,
    last_fire_ms: u32,
}

impl Debounce {
    pub const fn new() -> Self {
        Debounce {
            was_pressed: false,
            last_fire_ms: 0,
        }
    }

    /// Feeds one poll of the (active-high) button state; returns `true` when
    /// a debounced press fires.
    pub fn poll(&mut self, pressed: bool, now_ms: u32) -> bool {
        let fire = pressed
            && !self.was_pressed
            && now_ms.wrapping_sub(self.last_fire_ms) >= BUTTON_DEBOUNCE_MS;
        if fire {
            self.last_fire_ms = now_ms;
        }
        self.was_pressed = pressed;
        fire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_power_on_behaviour() {
        let c = Config::default();
        assert!(!c.dc_filter_on);
        assert!(!c.lpf_on);
        assert_eq!(c.src_mode, SrcMode::Decimate);
        assert!(!c.effects.scanlines);
        assert_eq!(c.effects.shadow_mode, ShadowMode::Compound);
    }

    #[test]
    fn src_mode_codes_round_trip_and_clamp() {
        for mode in &[SrcMode::Passthrough, SrcMode::Decimate, SrcMode::Linear] {
            assert_eq!(Config::src_mode_from_code(Config::src_mode_code(*mode)), *mode);
        }
        assert_eq!(Config::src_mode_from_code(7), SrcMode::Decimate);
        assert_eq!(Config::src_mode_from_code(0xFF), SrcMode::Decimate);
    }

    #[test]
    fn debounce_fires_once_per_press() {
        let mut d = Debounce::new();
        assert!(d.poll(true, 100));
        // Held down: no repeat.
        assert!(!d.poll(true, 110));
        assert!(!d.poll(true, 500));
        // Released and re-pressed after the interval: fires again.
        assert!(!d.poll(false, 510));
        assert!(d.poll(true, 520));
    }

    #[test]
    fn rapid_represses_are_ignored() {
        let mut d = Debounce::new();
        assert!(d.poll(true, 1_000));
        assert!(!d.poll(false, 1_010));
        // Bounce 20 ms after the fire: swallowed.
        assert!(!d.poll(true, 1_020));
        assert!(!d.poll(false, 1_030));
        // A real press 50 ms later gets through.
        assert!(d.poll(true, 1_050));
    }

    #[test]
    fn works_across_millisecond_wraparound() {
        let mut d = Debounce::new();
        assert!(d.poll(true, u32::max_value() - 10));
        assert!(!d.poll(false, u32::max_value() - 5));
        assert!(d.poll(true, 45)); // 60 ms later, counter wrapped
    }
}
