// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error code registry.
//!
//! Maps error codes (E0900, E0924, etc.) to titles, categories and a short
//! explanation. Used by `weft explain <code>` and by the JSON report.

use std::collections::BTreeMap;
use std::fmt;

/// Registry of all known error codes.
pub struct ErrorCodeRegistry {
    codes: BTreeMap<&'static str, ErrorCodeInfo>,
}

/// Information about a single error code.
pub struct ErrorCodeInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub category: ErrorCategory,
    pub description: &'static str,
}

/// Which lowering phase reports the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Type,
    Divergence,
    Layout,
    Abi,
    Lowering,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Type => write!(f, "Type"),
            ErrorCategory::Divergence => write!(f, "Divergence"),
            ErrorCategory::Layout => write!(f, "Layout"),
            ErrorCategory::Abi => write!(f, "ABI"),
            ErrorCategory::Lowering => write!(f, "Lowering"),
        }
    }
}

macro_rules! register_codes {
    ($($code:literal => ($title:literal, $cat:expr, $desc:literal)),* $(,)?) => {{
        let mut map = BTreeMap::new();
        $(
            map.insert($code, ErrorCodeInfo {
                code: $code,
                title: $title,
                category: $cat,
                description: $desc,
            });
        )*
        map
    }};
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        use ErrorCategory::*;

        Self {
            codes: register_codes! {
                // Type unifier (E090x)
                "E0900" => ("non-simd routine called with per-lane values", Type,
                    "Only `simd` routines accept per-lane arguments.\n\
                     A pure plain routine is applied lane by lane; one with side\n\
                     effects cannot be."),
                "E0901" => ("per-lane value in a scalar position", Type,
                    "Indices, container lengths, range bounds, lane numbers and\n\
                     `scalar` variables need one value for all lanes. Reduce the\n\
                     value with any/all/sum/min/max or extract one lane."),
                "E0902" => ("lane access outside vector code", Type,
                    "`c@`, `simd_range` and the `simd e` broadcast only make sense\n\
                     inside a simd block or a simd routine."),
                "E0903" => ("nested simd block", Type,
                    "A simd block already runs on every lane. Nesting another one\n\
                     inside vector code has no lane to give it."),
                "E0904" => ("not a container", Type,
                    "Lane access `c@` and indexing need a `simd{T}` container."),
                "E0905" => ("unknown routine", Type,
                    "The call names a routine the module does not declare."),
                "E0906" => ("unknown class", Type,
                    "A type refers to a class the module does not declare."),
                "E0907" => ("unknown variable", Type,
                    "The name is neither a parameter, a return slot nor a local."),
                "E0908" => ("no such field", Type,
                    "The class has no field with that name."),
                "E0909" => ("not assignable", Type,
                    "Only variables, fields, container elements and lane accesses\n\
                     can be assigned to."),

                // Divergence analyzer (E091x)
                "E0910" => ("foreign call under per-lane control", Divergence,
                    "A `c_call` cannot be masked. Inside a branch or loop whose\n\
                     condition differs per lane, some lanes would run it and some\n\
                     would not. Hoist the call out of the branch or reduce the\n\
                     condition first."),
                "E0911" => ("foreign call in vector code", Divergence,
                    "The foreign call policy is `reject`, so no `c_call` may appear\n\
                     in vector code at all."),
                "E0912" => ("uniform variable assigned under per-lane control", Divergence,
                    "A `scalar` variable holds one value for all lanes. Writing it\n\
                     where only some lanes are active would make it per-lane."),
                "E0913" => ("exit out of a simd block", Divergence,
                    "`break`, `continue` and `return` cannot leave a simd block.\n\
                     Move the exit after the block or use a reduction."),
                "E0914" => ("loop exit outside of a loop", Divergence,
                    "`break` and `continue` need an enclosing loop."),

                // Lane-width memory planner (E092x)
                "E0920" => ("class is not a simd class", Layout,
                    "Only classes declared `simd class` can be batched across lanes."),
                "E0921" => ("class is not vectorizable", Layout,
                    "All non-bool fields of a batched class must fit the same\n\
                     number of lanes in a register."),
                "E0922" => ("nested aggregate field", Layout,
                    "Fields of a batched class must be primitives."),
                "E0923" => ("unknown class in layout", Layout,
                    "A batched type refers to a class the module does not declare."),
                "E0924" => ("different simd lengths", Layout,
                    "The values in one vector body would need different lane\n\
                     counts. Convert them to element types of the same size or pick\n\
                     a fixed lane width."),
                "E0925" => ("lane width mismatch across a call", Layout,
                    "A vector variant can only be called from code running the same\n\
                     number of lanes."),
                "E0926" => ("implicit layout crossing", Layout,
                    "A lowered function used an aggregate in the wrong memory layout\n\
                     without a transpose. This is a lowering bug."),
                "E0927" => ("invalid lane width policy", Layout,
                    "The lane width policy must yield at least one lane."),

                // Call ABI adapter (E093x)
                "E0930" => ("return slot arity mismatch", Abi,
                    "A multi-slot call must bind exactly one target per return slot."),
                "E0931" => ("argument count mismatch", Abi,
                    "The call passes a different number of arguments than the\n\
                     routine declares."),
                "E0932" => ("inout argument is not a place", Abi,
                    "An `inout` parameter writes its final value back, so the\n\
                     argument must be assignable."),
                "E0933" => ("scalar inout parameter", Abi,
                    "An `inout` parameter of a simd routine is written per lane and\n\
                     cannot be `scalar`."),

                "E0939" => ("construct cannot be lowered", Lowering,
                    "The construct has no vector lowering."),
            },
        }
    }
}

impl ErrorCodeRegistry {
    pub fn get(&self, code: &str) -> Option<&ErrorCodeInfo> {
        self.codes.get(code)
    }

    /// All codes in ascending order.
    pub fn all(&self) -> impl Iterator<Item = &ErrorCodeInfo> {
        self.codes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_order() {
        let registry = ErrorCodeRegistry::default();
        let info = registry.get("E0924").unwrap();
        assert_eq!(info.category, ErrorCategory::Layout);
        assert_eq!(info.title, "different simd lengths");
        assert!(registry.get("E0308").is_none());

        let codes: Vec<&str> = registry.all().map(|i| i.code).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        assert_eq!(codes, sorted);
        assert!(codes.iter().all(|c| ("E0900"..="E0939").contains(c)));
    }
}
