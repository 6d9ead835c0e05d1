//! Image similarity via perceptual average-hash.

use image::imageops::FilterType;
use std::path::Path;
use tracing::warn;

/// Bits in the 8x8 fingerprint.
const HASH_BITS: u32 = 64;

/// Scores two images by perceptual average-hash: downsample each to 8x8
/// grayscale, fingerprint pixels against the mean, then
/// `1 - hamming_distance / 64`, clamped at zero.
///
/// Decode failures score 0.0.
#[allow(clippy::cast_precision_loss)]
pub(super) fn score(path_a: &Path, path_b: &Path) -> f32 {
    let (Some(hash_a), Some(hash_b)) = (average_hash(path_a), average_hash(path_b)) else {
        return 0.0;
    };

    let distance = (hash_a ^ hash_b).count_ones();
    (1.0 - distance as f32 / HASH_BITS as f32).max(0.0)
}

/// Computes the 64-bit average-hash fingerprint for an image file.
#[allow(clippy::cast_precision_loss)]
fn average_hash(path: &Path) -> Option<u64> {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "image comparison: decode failed");
            return None;
        },
    };

    let small = img.resize_exact(8, 8, FilterType::Triangle).to_luma8();
    let pixels: Vec<u8> = small.pixels().map(|p| p.0[0]).collect();
    debug_assert_eq!(pixels.len(), HASH_BITS as usize);

    let mean = pixels.iter().map(|&p| f64::from(p)).sum::<f64>() / f64::from(HASH_BITS);

    let mut hash = 0u64;
    for (i, &pixel) in pixels.iter().enumerate() {
        if f64::from(pixel) > mean {
            hash |= 1 << i;
        }
    }
    Some(hash)
}
