// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! SIMD lowering - turns a unified routine into a scalar variant and, for
//! `simd` routines, a mask-predicated vector variant.
//!
//! Pipeline per routine:
//! 1. unify (weft-types) and divergence analysis, iterated until no more
//!    variables need promotion
//! 2. lane-width and layout planning
//! 3. predicated lowering to VIR
//! 4. optional AoS entry shim and layout verification

pub mod abi;
pub mod config;
pub mod divergence;
mod error;
pub mod layout;
mod lower;
mod mask;
mod pipeline;

pub use config::{ForeignCallPolicy, LaneWidthPolicy, LoweringConfig};
pub use divergence::{ControlTag, DivergencePlan, ExitTag, MaskExpr};
pub use error::{AbiError, DivergenceError, LayoutError, LoweringError};
pub use layout::LayoutPlan;
pub use pipeline::{
    analyze_routine, lower_module, lower_routine, ModuleOutput, RoutineAnalysis, RoutineFailure,
    RoutineOutput,
};
