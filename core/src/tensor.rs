//! Minimal tensor utilities.
//!
//! All math is free functions on flat f32 slices with explicit dimensions.
//! Row-major layout throughout.

use crate::error::{ResFieldError, ResFieldResult};

/// Flat f32 tensor with shape metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

/// Element count of `shape`, or `None` if the product overflows `usize`.
pub fn checked_numel(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Element count of `shape`, as a `ShapeMismatch` on overflow.
pub fn shape_numel(shape: &[usize]) -> ResFieldResult<usize> {
    checked_numel(shape)
        .ok_or_else(|| ResFieldError::shape(format!("shape {shape:?} overflows usize")))
}

impl Tensor {
    /// # Panics
    ///
    /// If the element count of `shape` overflows `usize` or cannot be allocated.
    pub fn zeros(shape: &[usize]) -> Self {
        let n = checked_numel(shape).unwrap_or(usize::MAX);
        Tensor {
            data: vec![0.0; n],
            shape: shape.to_vec(),
        }
    }

    /// Wrap `data` with `shape`, checking that the element counts agree.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> ResFieldResult<Self> {
        let n = shape_numel(shape)?;
        if data.len() != n {
            return Err(ResFieldError::shape(format!(
                "shape {shape:?} needs {n} elements, got {}",
                data.len()
            )));
        }
        Ok(Tensor { data, shape: shape.to_vec() })
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }
}

/// Matrix multiply: C[M,N] = A[M,K] @ B[K,N].  Row-major.
/// `out` must be pre-allocated with M*N elements (will be overwritten).
pub fn matmul_f32(a: &[f32], b: &[f32], out: &mut [f32], m: usize, k: usize, n: usize) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(out.len(), m * n);

    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for p in 0..k {
                sum += a[i * k + p] * b[p * n + j];
            }
            out[i * n + j] = sum;
        }
    }
}

/// Matrix multiply against a transposed right operand: C[M,N] = A[M,K] @ B[N,K]^T.
///
/// This is the linear-layer contraction `x @ W^T` with W stored `[out, in]`,
/// so both operands are walked along contiguous rows.
pub fn matmul_transb_f32(a: &[f32], b: &[f32], out: &mut [f32], m: usize, k: usize, n: usize) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), n * k);
    debug_assert_eq!(out.len(), m * n);

    for i in 0..m {
        let a_row = &a[i * k..(i + 1) * k];
        for j in 0..n {
            let b_row = &b[j * k..(j + 1) * k];
            out[i * n + j] = a_row.iter().zip(b_row).map(|(x, y)| x * y).sum();
        }
    }
}

/// Row-broadcast add: out[r, c] += bias[c] for every row of width `bias.len()`.
pub fn add_row_bias_f32(out: &mut [f32], bias: &[f32]) {
    let cols = bias.len();
    if cols == 0 {
        return;
    }
    debug_assert_eq!(out.len() % cols, 0);
    for row in out.chunks_exact_mut(cols) {
        for (v, b) in row.iter_mut().zip(bias) {
            *v += b;
        }
    }
}

/// Element-wise add-assign: a[i] += b[i].
pub fn add_assign_f32(a: &mut [f32], b: &[f32]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

/// Simple xorshift64 PRNG for deterministic weight init. Not crypto-safe.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        SimpleRng { state: seed.max(1) } // avoid zero state
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform in [0, 1].
    fn unit(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Uniform in [-scale, scale].
    pub fn uniform(&mut self, scale: f32) -> f32 {
        (2.0 * self.unit() as f32 - 1.0) * scale
    }

    /// Fill slice with uniform random values in [-scale, scale].
    pub fn fill_uniform(&mut self, buf: &mut [f32], scale: f32) {
        for v in buf.iter_mut() {
            *v = self.uniform(scale);
        }
    }

    /// Standard normal draw (Box-Muller).
    pub fn normal(&mut self) -> f32 {
        // u1 in (0, 1] so ln(u1) stays finite
        let u1 = 1.0 - self.unit().min(1.0 - f64::EPSILON);
        let u2 = self.unit();
        ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
    }

    /// Fill slice with N(0, std^2) samples.
    pub fn fill_normal(&mut self, buf: &mut [f32], std: f32) {
        for v in buf.iter_mut() {
            *v = self.normal() * std;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_identity() {
        let a = [1.0, 0.0, 0.0, 1.0f32];
        let b = [1.0, 2.0, 3.0, 4.0f32];
        let mut out = [0.0f32; 4];
        matmul_f32(&a, &b, &mut out, 2, 2, 2);
        assert_eq!(out, b);
    }

    #[test]
    fn test_matmul_2x3_3x2() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0f32];
        let b = [7.0, 8.0, 9.0, 10.0, 11.0, 12.0f32];
        let mut out = [0.0f32; 4];
        matmul_f32(&a, &b, &mut out, 2, 3, 2);
        assert_eq!(out, [58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_transb_matches_matmul() {
        // b_t is [7 8; 9 10; 11 12] transposed → stored [N=2, K=3]
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0f32];
        let b_t = [7.0, 9.0, 11.0, 8.0, 10.0, 12.0f32];
        let mut out = [0.0f32; 4];
        matmul_transb_f32(&a, &b_t, &mut out, 2, 3, 2);
        assert_eq!(out, [58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_add_row_bias() {
        let mut out = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0f32];
        add_row_bias_f32(&mut out, &[10.0, 20.0, 30.0]);
        assert_eq!(out, [10.0, 21.0, 32.0, 13.0, 24.0, 35.0]);
    }

    #[test]
    fn test_add_row_bias_empty_is_noop() {
        let mut out = [1.0, 2.0f32];
        add_row_bias_f32(&mut out, &[]);
        assert_eq!(out, [1.0, 2.0]);
    }

    #[test]
    fn test_from_vec_checks_len() {
        assert!(Tensor::from_vec(vec![0.0; 6], &[1, 2, 3]).is_ok());
        assert!(Tensor::from_vec(vec![0.0; 5], &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_from_vec_overflowing_shape() {
        assert_eq!(checked_numel(&[1 << 62, 4, 4]), None);
        assert_eq!(checked_numel(&[]), Some(1));
        let err = Tensor::from_vec(vec![], &[1 << 62, 4, 4]).unwrap_err();
        assert!(matches!(err, ResFieldError::ShapeMismatch(_)), "got {err:?}");
    }

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = SimpleRng::new(42);
        let mut rng2 = SimpleRng::new(42);
        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_fill_range() {
        let mut rng = SimpleRng::new(123);
        let mut buf = vec![0.0f32; 1000];
        rng.fill_uniform(&mut buf, 0.1);
        for &v in &buf {
            assert!(v >= -0.1 && v <= 0.1, "Value {} out of range", v);
        }
    }

    #[test]
    fn test_rng_normal_moments() {
        let mut rng = SimpleRng::new(7);
        let mut buf = vec![0.0f32; 20_000];
        rng.fill_normal(&mut buf, 1.0);
        let n = buf.len() as f32;
        let mean = buf.iter().sum::<f32>() / n;
        let var = buf.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;
        assert!(buf.iter().all(|x| x.is_finite()));
        assert!(mean.abs() < 0.05, "mean={mean}");
        assert!((var - 1.0).abs() < 0.1, "var={var}");
    }
}
