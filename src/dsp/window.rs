//! Cosine-sum window functions.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

const HANN: [f64; 2] = [0.5, -0.5];
const HAMMING: [f64; 2] = [0.54, -0.46];
const BLACKMAN: [f64; 3] = [0.42, -0.5, 0.08];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowKind {
    Rectangular,
    #[default]
    Hann,
    Hamming,
    Blackman,
}

impl WindowKind {
    fn terms(self) -> &'static [f64] {
        match self {
            WindowKind::Rectangular => &[1.0],
            WindowKind::Hann => &HANN,
            WindowKind::Hamming => &HAMMING,
            WindowKind::Blackman => &BLACKMAN,
        }
    }

    /// Generate `len` weights. `symmetric` uses `len - 1` as the period so both
    /// endpoints sit on the curve's minimum; otherwise the period is `len`.
    pub fn coefficients(self, len: usize, symmetric: bool) -> Vec<f32> {
        cosine_sum(len, self.terms(), symmetric)
    }
}

/// `w[i] = Σ_j coeff[j] · cos(2π·i·j / L)` with `L = n - 1` when symmetric,
/// `L = n` otherwise. A single-sample window is always `[1.0]`.
pub fn cosine_sum(len: usize, coeff: &[f64], symmetric: bool) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let period = (if symmetric { len - 1 } else { len }) as f64;
            (0..len)
                .map(|i| {
                    coeff
                        .iter()
                        .enumerate()
                        .map(|(j, c)| {
                            let phase = (i * j) as f64 * core::f64::consts::TAU / period;
                            c * phase.cos()
                        })
                        .sum::<f64>() as f32
                })
                .collect()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct WindowKey {
    kind: WindowKind,
    len: usize,
    symmetric: bool,
}

/// Process-wide cache so channels and reconfigurations share one allocation
/// per (kind, length, symmetry).
pub struct WindowCache {
    entries: RwLock<FxHashMap<WindowKey, Arc<[f32]>>>,
}

impl WindowCache {
    pub fn global() -> &'static WindowCache {
        static INSTANCE: OnceLock<WindowCache> = OnceLock::new();
        INSTANCE.get_or_init(|| WindowCache {
            entries: RwLock::new(FxHashMap::default()),
        })
    }

    pub fn get(&self, kind: WindowKind, len: usize, symmetric: bool) -> Arc<[f32]> {
        let key = WindowKey {
            kind,
            len,
            symmetric,
        };
        if let Some(existing) = self.entries.read().get(&key) {
            return Arc::clone(existing);
        }

        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(key)
                .or_insert_with(|| Arc::from(kind.coefficients(len, symmetric))),
        )
    }
}
