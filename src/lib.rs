//! Capture-and-retransmit core for an arcade RGB/I2S source.
//!
//! The firmware samples 15-bit RGB video and serial audio off a running
//! arcade mainboard, repacks each scanline into an RGB565 framebuffer, and
//! retransmits the result as 640x480 DVI/HDMI using the RP2350's HSTX
//! serialiser, with the audio carried in HDMI data islands.
//!
//! Everything that can be expressed without touching hardware lives in the
//! architecture-independent modules below and is tested on the host; the
//! `driver` tree (PIO capture, HSTX scanout, DMA plumbing, core-1 dispatch)
//! only exists on the target.

#![cfg_attr(not(test), no_std)]

pub mod audio;
pub mod cmdlist;
pub mod config;
pub mod firmware;
pub mod osd;
pub mod rast;
pub mod telemetry;
pub mod timing;
pub mod userdata;
pub mod util;

pub use dsp::Sample;

/// Representation of a framebuffer pixel: RGB565.
pub type Pixel = u16;

/// Capture resolution. The source produces a 384x264 total frame with this
/// much active video in it; the framebuffer is exactly the active region.
pub const SRC_WIDTH: usize = 320;
pub const SRC_HEIGHT: usize = 224;

/// Output active resolution, fixed by the 640x480@60 line timing.
pub const OUT_WIDTH: usize = 640;
pub const OUT_HEIGHT: usize = 480;

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        // re-export driver bits
        mod driver;
        pub use driver::*;
    }
}
