// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Reference interpreter for VIR.
//!
//! Runs lowered functions lane by lane so the vector variant of a routine
//! can be checked against its scalar variant. Integer results wrap or
//! saturate to their declared width, and `real32` values round through
//! `f32`, so both variants see the same arithmetic.

mod error;
mod machine;
mod value;

pub use error::InterpError;
pub use machine::Machine;
pub use value::{Aggregate, Scalar, Value};
