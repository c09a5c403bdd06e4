use super::vector;
use crate::util::audio::db_to_amplitude;

/// Lowest accepted gain; at or below this the stage outputs silence.
pub const MIN_GAIN_DB: f32 = -90.0;
pub const MAX_GAIN_DB: f32 = 30.0;

/// Decibel-controlled gain applied to each channel before analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreGain {
    db: f32,
    linear: f32,
}

impl Default for PreGain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PreGain {
    pub fn new(db: f32) -> Self {
        let db = if db.is_finite() {
            db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
        } else {
            0.0
        };
        Self {
            db,
            linear: linear_gain(db),
        }
    }

    pub fn db(&self) -> f32 {
        self.db
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn linear(&self) -> f32 {
        self.linear
    }

    pub fn is_unity(&self) -> bool {
        self.db == 0.0
    }

    /// Scale `buffer` in place. Unity gain leaves the samples untouched.
    pub fn apply(&self, buffer: &mut [f32]) {
        if self.is_unity() {
            return;
        }
        vector::scale(buffer, self.linear);
    }
}

/// Clamp `db` into the supported range and convert to a linear factor. The
/// floor maps to an exact zero instead of a denormal-sized multiplier.
pub fn linear_gain(db: f32) -> f32 {
    let db = db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
    if db > MIN_GAIN_DB {
        db_to_amplitude(db)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_forces_silence() {
        assert_eq!(linear_gain(-90.0), 0.0);
        assert_eq!(linear_gain(-400.0), 0.0);
        assert!(linear_gain(-89.9) > 0.0);
    }

    #[test]
    fn clamps_to_ceiling() {
        let gain = PreGain::new(60.0);
        assert_eq!(gain.db(), MAX_GAIN_DB);
        assert!((gain.linear() - 31.622_776).abs() < 1e-3);
    }

    #[test]
    fn applying_twice_from_fresh_input_is_stable() {
        let gain = PreGain::new(-6.0);
        let input = vec![1.0f32; 10];

        let mut first = input.clone();
        gain.apply(&mut first);
        let mut second = input.clone();
        gain.apply(&mut second);

        assert_eq!(first, second);
        assert!((first[0] - 0.501_187).abs() < 1e-5);
    }

    #[test]
    fn unity_and_silence() {
        let mut buffer = vec![0.25f32, -0.5];
        PreGain::default().apply(&mut buffer);
        assert_eq!(buffer, vec![0.25, -0.5]);

        PreGain::new(MIN_GAIN_DB).apply(&mut buffer);
        assert_eq!(buffer, vec![0.0, -0.0]);

        assert_eq!(PreGain::new(f32::NAN).db(), 0.0);
    }
}
