// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lowering configuration: defaults, then an optional JSON file, then flags.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use weft_simd::{ForeignCallPolicy, LaneWidthPolicy, LoweringConfig};

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// JSON lowering config
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Run every vector body with exactly N lanes
    #[arg(long, value_name = "N", conflicts_with = "register_bytes")]
    pub lanes: Option<u32>,
    /// Derive lanes from a register of N bytes
    #[arg(long, value_name = "N")]
    pub register_bytes: Option<u32>,
    /// Stop divergent loops after N iterations
    #[arg(long, value_name = "N")]
    pub trip_bound: Option<u32>,
    /// Skip the array-of-structures entry shim
    #[arg(long)]
    pub no_aos_entry: bool,
    /// Skip the layout verifier
    #[arg(long)]
    pub no_verify: bool,
    /// Refuse foreign calls in vector code
    #[arg(long)]
    pub reject_foreign: bool,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<LoweringConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| CliError::Read {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| CliError::Config {
                    path: path.clone(),
                    source,
                })?
            }
            None => LoweringConfig::default(),
        };

        if let Some(lanes) = self.lanes {
            config.lane_width = LaneWidthPolicy::Fixed { lanes };
        }
        if let Some(bytes) = self.register_bytes {
            config.lane_width = LaneWidthPolicy::Register { bytes };
        }
        if self.trip_bound.is_some() {
            config.loop_trip_bound = self.trip_bound;
        }
        if self.no_aos_entry {
            config.emit_aos_entry = false;
        }
        if self.no_verify {
            config.verify = false;
        }
        if self.reject_foreign {
            config.foreign_calls = ForeignCallPolicy::Reject;
        }
        tracing::debug!(target: "weft::cli", ?config, "lowering config resolved");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_defaults() {
        let args = ConfigArgs {
            lanes: Some(8),
            trip_bound: Some(64),
            no_aos_entry: true,
            reject_foreign: true,
            ..ConfigArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.lane_width, LaneWidthPolicy::Fixed { lanes: 8 });
        assert_eq!(config.loop_trip_bound, Some(64));
        assert!(!config.emit_aos_entry);
        assert!(config.verify);
        assert_eq!(config.foreign_calls, ForeignCallPolicy::Reject);
    }

    #[test]
    fn flags_override_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "lane_width": {{ "kind": "register", "bytes": 32 }}, "verify": false }}"#
        )
        .unwrap();
        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            register_bytes: Some(64),
            ..ConfigArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.lane_width, LaneWidthPolicy::Register { bytes: 64 });
        assert!(!config.verify);
        assert!(config.emit_aos_entry);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ \"lane_width\": 4 }}").unwrap();
        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            ..ConfigArgs::default()
        };
        assert!(matches!(args.resolve(), Err(CliError::Config { .. })));
    }
}
