// Pipeline configuration
// One explicit config struct, deserialized from TOML at process start and
// passed by reference into every stage. No global lookup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Everything a pipeline run needs to know. Paths are relative to the
/// working directory unless absolute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub inputs: InputPaths,
    pub output: OutputPaths,
    /// CGAC agency identifier the pipeline filters for ("070" = DHS)
    pub agency_code: String,
    /// Numeric agency identifier as USAspending exports write it
    pub agency_identifier: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// Flattened OpenOMB schedule rows, one CSV for all fiscal years
    pub apportionment_csv: PathBuf,
    /// Directory scanned for AccountBalances / PA-OC snapshot CSVs
    pub usaspending_dir: PathBuf,
    /// FAST Book fund-type reference CSV
    pub fastbook_csv: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            inputs: InputPaths::default(),
            output: OutputPaths::default(),
            agency_code: "070".to_string(),
            agency_identifier: 70,
        }
    }
}

impl Default for InputPaths {
    fn default() -> Self {
        InputPaths {
            apportionment_csv: PathBuf::from("raw_data/appropriations/dhs_schedule_lines.csv"),
            usaspending_dir: PathBuf::from("raw_data/usaspending"),
            fastbook_csv: PathBuf::from("data/fast_book/dhs_tas_fund_type_mapping.csv"),
        }
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        OutputPaths {
            dir: PathBuf::from("processed_data"),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file. Missing keys fall back to defaults; a missing
    /// file is an error (an explicit config path should exist).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: PipelineConfig =
            toml::from_str(&content).context("Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load(path: Option<&str>) -> Result<PipelineConfig> {
        match path {
            Some(p) => PipelineConfig::from_file(p),
            None => Ok(PipelineConfig::default()),
        }
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output.dir.join(name)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.agency_code, "070");
        assert_eq!(config.agency_identifier, 70);
        assert_eq!(
            config.output_path("x.json"),
            PathBuf::from("processed_data/x.json")
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            agency_code = "069"

            [inputs]
            fastbook_csv = "ref/fast_book.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.agency_code, "069");
        assert_eq!(config.inputs.fastbook_csv, PathBuf::from("ref/fast_book.csv"));
        // untouched sections keep their defaults
        assert_eq!(
            config.inputs.usaspending_dir,
            PathBuf::from("raw_data/usaspending")
        );
        assert_eq!(config.output.dir, PathBuf::from("processed_data"));
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = PipelineConfig::load(None).unwrap();
        assert_eq!(config.agency_code, "070");
    }
}
