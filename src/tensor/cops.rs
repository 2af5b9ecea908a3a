use crate::{
  scalar::Numeric,
  ops::Cops,
};


#[inline]
fn check_bounds<T>(m: usize, k: usize, n: usize, a: &[T], sa: (isize, isize), b: &[T], sb: (isize, isize), c: &[T]) {
  let extent = |rows: usize, cols: usize, (rs, cs): (isize, isize)| {
    if rows == 0 || cols == 0 { return 0 }
    (rows - 1) * rs as usize + (cols - 1) * cs as usize + 1
  };
  assert!(extent(m, k, sa) <= a.len(), "Left GEMM operand too short for {m}x{k}");
  assert!(extent(k, n, sb) <= b.len(), "Right GEMM operand too short for {k}x{n}");
  assert_eq!(c.len(), m * n, "GEMM output doesn't match {m}x{n}");
}


/// Portable fallback used when the `unsafe` feature is disabled.

#[allow(dead_code)]
fn naive_gemm<T: Numeric>(
  m: usize, k: usize, n: usize,
  a: &[T], (rsa, csa): (isize, isize),
  b: &[T], (rsb, csb): (isize, isize),
  beta: T,
  c: &mut [T],
) {
  for i in 0..m {
    for j in 0..n {
      let mut acc = T::zero();
      for l in 0..k {
        acc += a[i * rsa as usize + l * csa as usize] * b[l * rsb as usize + j * csb as usize];
      }
      let out = &mut c[i * n + j];
      *out = if beta == T::zero() { acc } else { acc + beta * *out };
    }
  }
}


macro_rules! impl_cops {
  ($type:ty, $kernel:ident) => {
    impl Cops for $type {
      fn gemm(
        m: usize, k: usize, n: usize,
        a: &[Self], a_strides: (isize, isize),
        b: &[Self], b_strides: (isize, isize),
        beta: Self,
        c: &mut [Self],
      ) {
        check_bounds(m, k, n, a, a_strides, b, b_strides, c);

        #[cfg(feature = "unsafe")]
        unsafe {
          matrixmultiply::$kernel(
            m,
            k,
            n,
            1.0,
            a.as_ptr(),
            a_strides.0,
            a_strides.1,
            b.as_ptr(),
            b_strides.0,
            b_strides.1,
            beta,
            c.as_mut_ptr(),
            n as isize,
            1,
          );
        }

        #[cfg(not(feature = "unsafe"))]
        naive_gemm(m, k, n, a, a_strides, b, b_strides, beta, c);
      }
    }
  };
}

impl_cops!(f32, sgemm);
impl_cops!(f64, dgemm);
