//! Row primitives shared by the host attention kernels.
//!
//! Both kernels work on one query row at a time: score it against a run of
//! key rows, fold a run of value rows into an accumulator, and rescale that
//! accumulator. Each primitive has an AVX2+FMA body and a portable one.

/// `out[j] = dot(q_row, key j) * scale` for the key rows packed in `keys`.
///
/// Key rows have `q_row.len()` features; `out.len()` rows are read.
pub(crate) fn score_rows(q_row: &[f32], keys: &[f32], scale: f32, out: &mut [f32]) {
    let d = q_row.len();
    debug_assert!(keys.len() >= out.len() * d);
    let fast = avx2_fma();
    for (j, score) in out.iter_mut().enumerate() {
        let key = &keys[j * d..(j + 1) * d];
        *score = dot(q_row, key, fast) * scale;
    }
}

/// `acc += sum_j weights[j] * value j` for the value rows packed in `values`.
///
/// Value rows have `acc.len()` features.
pub(crate) fn weighted_rows(acc: &mut [f32], values: &[f32], weights: &[f32]) {
    let dv = acc.len();
    debug_assert!(values.len() >= weights.len() * dv);
    let fast = avx2_fma();
    for (j, &w) in weights.iter().enumerate() {
        axpy(acc, &values[j * dv..(j + 1) * dv], w, fast);
    }
}

/// `acc *= factor`
pub(crate) fn scale_in_place(acc: &mut [f32], factor: f32) {
    #[cfg(target_arch = "x86_64")]
    {
        if avx2_fma() {
            // SAFETY: the CPU supports AVX2 and FMA (checked above)
            unsafe { x86::scale(acc, factor) };
            return;
        }
    }
    acc.iter_mut().for_each(|a| *a *= factor);
}

#[inline]
fn avx2_fma() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32], fast: bool) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    #[cfg(target_arch = "x86_64")]
    {
        if fast {
            // SAFETY: callers pass `fast` only from `avx2_fma()`
            return unsafe { x86::dot(a, b) };
        }
    }
    let _ = fast;
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn axpy(acc: &mut [f32], x: &[f32], w: f32, fast: bool) {
    debug_assert_eq!(acc.len(), x.len());
    #[cfg(target_arch = "x86_64")]
    {
        if fast {
            // SAFETY: callers pass `fast` only from `avx2_fma()`
            unsafe { x86::axpy(acc, x, w) };
            return;
        }
    }
    let _ = fast;
    for (a, v) in acc.iter_mut().zip(x) {
        *a += w * v;
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::*;

    const LANES: usize = 8;

    /// Two independent accumulators so consecutive FMAs do not wait on each other.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn dot(a: &[f32], b: &[f32]) -> f32 {
        unsafe {
            let mut even = _mm256_setzero_ps();
            let mut odd = _mm256_setzero_ps();
            let mut pa = a.chunks_exact(2 * LANES);
            let mut pb = b.chunks_exact(2 * LANES);
            for (ca, cb) in (&mut pa).zip(&mut pb) {
                even = _mm256_fmadd_ps(
                    _mm256_loadu_ps(ca.as_ptr()),
                    _mm256_loadu_ps(cb.as_ptr()),
                    even,
                );
                odd = _mm256_fmadd_ps(
                    _mm256_loadu_ps(ca[LANES..].as_ptr()),
                    _mm256_loadu_ps(cb[LANES..].as_ptr()),
                    odd,
                );
            }
            let mut lanes = [0.0f32; LANES];
            _mm256_storeu_ps(lanes.as_mut_ptr(), _mm256_add_ps(even, odd));

            let tail = pa
                .remainder()
                .iter()
                .zip(pb.remainder())
                .fold(0.0f32, |s, (x, y)| x.mul_add(*y, s));
            lanes.iter().sum::<f32>() + tail
        }
    }

    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn axpy(acc: &mut [f32], x: &[f32], w: f32) {
        unsafe {
            let wv = _mm256_set1_ps(w);
            let mut dst = acc.chunks_exact_mut(LANES);
            let mut src = x.chunks_exact(LANES);
            for (d, s) in (&mut dst).zip(&mut src) {
                let r = _mm256_fmadd_ps(wv, _mm256_loadu_ps(s.as_ptr()), _mm256_loadu_ps(d.as_ptr()));
                _mm256_storeu_ps(d.as_mut_ptr(), r);
            }
            for (d, s) in dst.into_remainder().iter_mut().zip(src.remainder()) {
                *d = w.mul_add(*s, *d);
            }
        }
    }

    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn scale(acc: &mut [f32], factor: f32) {
        unsafe {
            let fv = _mm256_set1_ps(factor);
            let mut dst = acc.chunks_exact_mut(LANES);
            for d in &mut dst {
                _mm256_storeu_ps(d.as_mut_ptr(), _mm256_mul_ps(_mm256_loadu_ps(d.as_ptr()), fv));
            }
            dst.into_remainder().iter_mut().for_each(|d| *d *= factor);
        }
    }
}
