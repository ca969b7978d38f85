// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Shared fixtures: module assembly, lowering and per-lane reference runs.

#![allow(dead_code)]

use weft_ast::{ClassDecl, Module, RoutineDecl};
use weft_interp::{Machine, Value};
use weft_simd::{lower_module, LoweringConfig, ModuleOutput};

pub fn module(classes: Vec<ClassDecl>, routines: Vec<RoutineDecl>) -> Module {
    Module {
        classes,
        routines,
        ..Module::default()
    }
}

/// Lower `module`, failing the test on any routine error.
pub fn lower_ok(module: &Module, config: &LoweringConfig) -> ModuleOutput {
    let output = lower_module(module, config);
    assert!(
        output.is_ok(),
        "lowering failed: {:?}",
        output
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.routine, f.error))
            .collect::<Vec<_>>()
    );
    output
}

pub fn machine(output: &ModuleOutput) -> Machine {
    let mut m = Machine::new();
    m.load(output.functions());
    m
}

/// Run the scalar variant `name` once per lane; `args(lane)` builds that
/// lane's arguments. Returns the first result of each run.
pub fn scalar_per_lane(
    m: &mut Machine,
    name: &str,
    lanes: usize,
    args: impl Fn(usize) -> Vec<Value>,
) -> Vec<Value> {
    (0..lanes)
        .map(|lane| {
            let mut out = m
                .call(name, args(lane))
                .unwrap_or_else(|e| panic!("{} lane {}: {}", name, lane, e));
            out.swap_remove(0)
        })
        .collect()
}

pub fn all_lanes(lanes: usize) -> Value {
    Value::mask(&vec![true; lanes])
}
