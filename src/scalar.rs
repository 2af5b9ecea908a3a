use rand::distributions::uniform::SampleUniform;
use num_traits::{ NumAssignOps, Num, NumCast };

use crate::ops::Cops;


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// All continuous numeric types that can be trained.
///
/// Besides the usual float operations, implementors provide
/// a [GEMM kernel](Cops), which is what convolutions and dense
/// layers bottom out in. Implemented for `f32` and `f64`.

pub trait Real: Numeric + num_traits::real::Real + SampleUniform + Cops {}
impl<T: Numeric + num_traits::real::Real + SampleUniform + Cops> Real for T {}
