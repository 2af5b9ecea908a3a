use rand::Rng;

use crate::scalar::Real;


#[inline]
pub fn negative_index(i: isize, n: usize, start_behind: bool) -> usize {
  if i < 0 {
    let offset = if start_behind { 1 } else { 0 };
    (n as isize + i + offset) as usize
  } else {
    i as usize
  }
}


// Polar Box-Muller transformation

pub fn randn<T: Real>(rng: &mut impl Rng) -> (T, T) {
  let u = rng.gen_range(-T::one(), T::one());
  let v = rng.gen_range(-T::one(), T::one());
  let r = u * u + v * v;
  // Try again if outside interval
  if r == T::zero() || r >= T::one() { return randn(rng) }
  let c = (T::from(-2.0).unwrap() * r.ln() / r).sqrt();
  (u * c, v * c)
}


/// Standard normal sample, redrawn until it lies within two standard deviations.

pub fn truncated_randn<T: Real>(rng: &mut impl Rng) -> T {
  let two = T::from(2.0).unwrap();
  loop {
    let (a, b): (T, T) = randn(rng);
    if a > -two && a < two { return a }
    if b > -two && b < two { return b }
  }
}


/// Output extent of a strided window sweep, rounding partial windows up.

#[inline]
pub fn ceil_div(n: usize, d: usize) -> usize {
  (n + d - 1) / d
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn truncation() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10_000 {
      let x: f64 = truncated_randn(&mut rng);
      assert!(x.abs() < 2.0);
    }
  }

  #[test]
  fn negative() {
    assert_eq!(negative_index(-1, 4, false), 3);
    assert_eq!(negative_index(-1, 4, true), 4);
    assert_eq!(negative_index(2, 4, false), 2);
  }
}
