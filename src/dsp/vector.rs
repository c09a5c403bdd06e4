//! Batched elementwise arithmetic over `f32` buffers.
//!
//! Every routine walks the buffers in fixed 8-lane chunks followed by a scalar
//! tail, which keeps the inner loops branch-free so the compiler can lower
//! them to SIMD on targets that support it.

const LANES: usize = 8;

/// `buffer[i] *= weights[i]`. Both slices must have the same length.
#[inline]
pub fn multiply(buffer: &mut [f32], weights: &[f32]) {
    debug_assert_eq!(buffer.len(), weights.len());
    let mut lhs = buffer.chunks_exact_mut(LANES);
    let mut rhs = weights.chunks_exact(LANES);
    for (a, b) in (&mut lhs).zip(&mut rhs) {
        for lane in 0..LANES {
            a[lane] *= b[lane];
        }
    }
    for (a, b) in lhs.into_remainder().iter_mut().zip(rhs.remainder()) {
        *a *= *b;
    }
}

/// `buffer[i] *= factor`.
#[inline]
pub fn scale(buffer: &mut [f32], factor: f32) {
    let mut chunks = buffer.chunks_exact_mut(LANES);
    for chunk in &mut chunks {
        for sample in chunk.iter_mut() {
            *sample *= factor;
        }
    }
    for sample in chunks.into_remainder() {
        *sample *= factor;
    }
}

/// `target[i] += source[i]`. Both slices must have the same length.
#[inline]
pub fn add(target: &mut [f32], source: &[f32]) {
    debug_assert_eq!(target.len(), source.len());
    let mut lhs = target.chunks_exact_mut(LANES);
    let mut rhs = source.chunks_exact(LANES);
    for (a, b) in (&mut lhs).zip(&mut rhs) {
        for lane in 0..LANES {
            a[lane] += b[lane];
        }
    }
    for (a, b) in lhs.into_remainder().iter_mut().zip(rhs.remainder()) {
        *a += *b;
    }
}

/// `target[i] -= source[i]`. Both slices must have the same length.
#[inline]
pub fn subtract(target: &mut [f32], source: &[f32]) {
    debug_assert_eq!(target.len(), source.len());
    let mut lhs = target.chunks_exact_mut(LANES);
    let mut rhs = source.chunks_exact(LANES);
    for (a, b) in (&mut lhs).zip(&mut rhs) {
        for lane in 0..LANES {
            a[lane] -= b[lane];
        }
    }
    for (a, b) in lhs.into_remainder().iter_mut().zip(rhs.remainder()) {
        *a -= *b;
    }
}
