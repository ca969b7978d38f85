// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lowering options.

use serde::{Deserialize, Serialize};

use crate::LayoutError;

/// How the lane count of a vector variant is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LaneWidthPolicy {
    /// Every vector variant and range block runs exactly `lanes` lanes.
    Fixed { lanes: u32 },
    /// Lanes are `bytes / size_of(element)`, per element type.
    Register { bytes: u32 },
}

impl LaneWidthPolicy {
    /// Width used when nothing in a routine fixes one.
    pub fn fallback_lanes(self) -> u32 {
        match self {
            LaneWidthPolicy::Fixed { lanes } => lanes,
            LaneWidthPolicy::Register { bytes } => (bytes / 4).max(1),
        }
    }
}

impl Default for LaneWidthPolicy {
    fn default() -> Self {
        LaneWidthPolicy::Register { bytes: 16 }
    }
}

/// What to do with `c_call` in vector code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignCallPolicy {
    /// Call the foreign function once per active lane.
    #[default]
    LaneLoop,
    /// Refuse foreign calls anywhere in vector code.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringConfig {
    pub lane_width: LaneWidthPolicy,
    /// Emit the array-of-structures entry shim for vector variants that
    /// pass or return classes.
    pub emit_aos_entry: bool,
    /// Upper bound on iterations of a divergent loop. `None` runs until
    /// every lane has left.
    pub loop_trip_bound: Option<u32>,
    /// Run the layout verifier over the produced functions.
    pub verify: bool,
    pub foreign_calls: ForeignCallPolicy,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            lane_width: LaneWidthPolicy::default(),
            emit_aos_entry: true,
            loop_trip_bound: None,
            verify: true,
            foreign_calls: ForeignCallPolicy::default(),
        }
    }
}

impl LoweringConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let ok = match self.lane_width {
            LaneWidthPolicy::Fixed { lanes } => lanes > 0,
            LaneWidthPolicy::Register { bytes } => bytes > 0,
        };
        if ok {
            Ok(())
        } else {
            Err(LayoutError::InvalidPolicy {
                policy: self.lane_width,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoweringConfig::default();
        assert_eq!(config.lane_width, LaneWidthPolicy::Register { bytes: 16 });
        assert!(config.emit_aos_entry);
        assert!(config.verify);
        assert_eq!(config.loop_trip_bound, None);
        assert_eq!(config.foreign_calls, ForeignCallPolicy::LaneLoop);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fallback_width_assumes_four_byte_lanes() {
        assert_eq!(LaneWidthPolicy::Register { bytes: 32 }.fallback_lanes(), 8);
        assert_eq!(LaneWidthPolicy::Register { bytes: 2 }.fallback_lanes(), 1);
        assert_eq!(LaneWidthPolicy::Fixed { lanes: 3 }.fallback_lanes(), 3);
    }

    #[test]
    fn zero_width_rejected() {
        let config = LoweringConfig {
            lane_width: LaneWidthPolicy::Fixed { lanes: 0 },
            ..LoweringConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LayoutError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LoweringConfig = serde_json::from_str(
            r#"{ "lane_width": { "kind": "fixed", "lanes": 8 }, "foreign_calls": "reject" }"#,
        )
        .unwrap();
        assert_eq!(config.lane_width, LaneWidthPolicy::Fixed { lanes: 8 });
        assert_eq!(config.foreign_calls, ForeignCallPolicy::Reject);
        assert!(config.emit_aos_entry);
    }
}
