//! Scanline rasterization: raw capture words in, composed output lines out.
//!
//! The capture side uses [`unpack`] to turn each raw line into RGB565
//! framebuffer pixels as it lands. The scanout side uses [`compose`] once
//! per output line, inside the scanline callback, to double pixels, apply
//! the scanline effect and lay the OSD over the top.

pub mod compose;
pub mod unpack;

pub use self::compose::{compose, OsdView};

use crate::OUT_WIDTH;

/// The buffer a scanline is composed into, sized for one output line. This
/// is word-aligned because the compositor writes two RGB565 pixels per
/// 32-bit store and the scanout DMA reads words.
pub struct ScanBuffer([u32; OUT_WIDTH / 2]);

impl ScanBuffer {
    pub const fn new() -> Self {
        ScanBuffer([0; OUT_WIDTH / 2])
    }

    pub fn as_words(&self) -> &[u32; OUT_WIDTH / 2] {
        &self.0
    }

    pub fn as_words_mut(&mut self) -> &mut [u32; OUT_WIDTH / 2] {
        &mut self.0
    }
}

impl core::ops::Deref for ScanBuffer {
    type Target = [u16; OUT_WIDTH];
    fn deref(&self) -> &Self::Target {
        // Safety: same size and alignment, and we only ever pun the word
        // array as pixels. A big-endian host would see swapped pixel order,
        // which no supported target has.
        unsafe { core::mem::transmute(&self.0) }
    }
}

impl core::ops::DerefMut for ScanBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Safety: as above.
        unsafe { core::mem::transmute(&mut self.0) }
    }
}
