//! A fast routine for moving scanline-rate data around.

/// Copies words (type `u32`) from `source` to `dest`.
///
/// The scanout ISR uses this to splice data islands into the command
/// stream, so it runs inside the per-line budget: moving whole words keeps
/// the compiler on the 32-bit datapath, and the bounds check dissolves when
/// both slices are cut with the same range.
///
/// # Panics
///
/// If the slices are not the same length.
pub fn copy_words(source: &[u32], dest: &mut [u32]) {
    assert!(source.len() == dest.len());
    for (d, s) in dest.iter_mut().zip(source) {
        *d = *s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_exactly() {
        let src = [1u32, 2, 3, 4];
        let mut dst = [0u32; 4];
        copy_words(&src, &mut dst);
        assert_eq!(src, dst);
    }

    #[test]
    #[should_panic]
    fn length_mismatch_panics() {
        let src = [1u32, 2];
        let mut dst = [0u32; 3];
        copy_words(&src, &mut dst);
    }
}
