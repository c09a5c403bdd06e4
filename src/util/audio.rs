/// Default sample rate (Hz) assumed until the host reports one.
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

#[inline(always)]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert an amplitude decibel value to a linear multiplier: 10^(db/20).
#[inline(always)]
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0f32.powf(db * 0.05)
}

/// Centre frequency of `bin` for a real transform of `frame_length` samples.
#[inline]
pub fn bin_frequency(bin: usize, sample_rate: f32, frame_length: usize) -> f32 {
    if frame_length == 0 {
        return 0.0;
    }
    bin as f32 * sample_rate / frame_length as f32
}

/// Nearest bin for `frequency_hz`, clamped to the Nyquist bin.
#[cfg_attr(not(test), allow(dead_code))]
pub fn frequency_bin(frequency_hz: f32, sample_rate: f32, frame_length: usize) -> usize {
    if sample_rate <= 0.0 || frame_length == 0 {
        return 0;
    }
    let nyquist_bin = frame_length / 2;
    let position = (frequency_hz * frame_length as f32 / sample_rate).round();
    if position <= 0.0 {
        0
    } else {
        (position as usize).min(nyquist_bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decibels_map_to_amplitude() {
        assert!((db_to_amplitude(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_amplitude(-20.0) - 0.1).abs() < 1e-6);
        assert!((db_to_amplitude(6.0206) - 2.0).abs() < 1e-3);
    }

    #[test]
    fn bin_frequency_mapping_round_trips() {
        let width = bin_frequency(1, 48_000.0, 1024);
        assert!((width - 46.875).abs() < 1e-4);
        assert_eq!(frequency_bin(3_000.0, 48_000.0, 1024), 64);
        assert_eq!(frequency_bin(30_000.0, 48_000.0, 1024), 512);
        assert_eq!(frequency_bin(-5.0, 48_000.0, 1024), 0);
    }

    #[test]
    fn lerp_blends_endpoints() {
        assert_eq!(lerp(2.0, 4.0, 0.0), 2.0);
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
        assert_eq!(lerp(2.0, 4.0, 1.0), 4.0);
    }
}
