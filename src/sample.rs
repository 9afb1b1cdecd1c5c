//! Definition of the sample type stored in tracks.
//!
//! A sample is a 32 bit signed integer of which only the lower 24 bits are
//! significant. Conversions to and from normalized floating point values are
//! provided for consumers such as playback or codecs.

/// One audio sample, a 32 bit integer with 24 valid bits.
pub type Sample = i32;

/// Number of significant bits of a [`Sample`].
pub const SAMPLE_BITS: u32 = 24;

/// Lowest sample value.
pub const SAMPLE_MIN: Sample = -(1 << (SAMPLE_BITS - 1));

/// Highest sample value.
pub const SAMPLE_MAX: Sample = (1 << (SAMPLE_BITS - 1)) - 1;

const SCALE: f32 = (1u32 << (SAMPLE_BITS - 1)) as f32;

/// Converts a sample into a normalized floating point value in `[-1.0, 1.0)`.
///
/// # Examples
/// ```
/// use sample_tracks::{sample_to_f32, SAMPLE_MIN};
///
/// assert_eq!(sample_to_f32(0), 0.0);
/// assert_eq!(sample_to_f32(SAMPLE_MIN), -1.0);
/// ```
#[inline]
pub fn sample_to_f32(sample: Sample) -> f32 {
    sample as f32 / SCALE
}

/// Converts a normalized floating point value into a sample.
///
/// Values outside of `[-1.0, 1.0)` are clipped to [`SAMPLE_MIN`] and
/// [`SAMPLE_MAX`], `NaN` maps to zero.
#[inline]
pub fn f32_to_sample(value: f32) -> Sample {
    if value.is_nan() {
        return 0;
    }
    let scaled = (value * SCALE).round();
    scaled.clamp(SAMPLE_MIN as f32, SAMPLE_MAX as f32) as Sample
}

/// Number of bytes occupied by `samples` samples in memory.
#[inline]
pub const fn bytes_of(samples: usize) -> usize {
    samples.saturating_mul(std::mem::size_of::<Sample>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        assert_eq!(SAMPLE_MIN, -8_388_608);
        assert_eq!(SAMPLE_MAX, 8_388_607);
    }

    #[test]
    fn test_conversion_round_trip_for_integers() {
        for s in [SAMPLE_MIN, -1000, -1, 0, 1, 4711, SAMPLE_MAX] {
            assert_eq!(f32_to_sample(sample_to_f32(s)), s);
        }
    }

    #[test]
    fn test_float_clipping() {
        assert_eq!(f32_to_sample(2.0), SAMPLE_MAX);
        assert_eq!(f32_to_sample(-2.0), SAMPLE_MIN);
        assert_eq!(f32_to_sample(f32::NAN), 0);
    }

    #[test]
    fn test_bytes_of() {
        assert_eq!(bytes_of(10), 40);
        assert_eq!(bytes_of(usize::MAX), usize::MAX);
    }
}
