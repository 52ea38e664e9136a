//! YAML study files for the command-line driver.
//!
//! A diffusion study file is a plain [`DiffusionConfig`]. A Sobol study file
//! names the model and carries a [`SensitivityConfig`]:
//!
//! ```yaml
//! model: logistic
//! analysis:
//!   num_samples: 2000
//!   seed: 42
//!   parameters:
//!     - name: r
//!       distribution: { type: normal, mean: 0.05, std_dev: 0.01 }
//!     - name: K
//!       distribution: { type: normal, mean: 200.0, std_dev: 50.0 }
//!   initial_state: [10.0]
//!   output_times: { start: 1.0, end: 200.0, step: 1.0 }
//!   threshold: 100.0
//! ```
//!
//! Missing fields fall back to the built-in logistic scenario.

use std::fs;
use std::path::Path;

use color_eyre::eyre::WrapErr;
use dynsens_core::analysis::SensitivityConfig;
use dynsens_core::diffusion::DiffusionConfig;
use dynsens_core::model::{DerivativeModel, ExponentialGrowth, LogisticGrowth};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Built-in derivative models selectable from a study file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// `dP/dt = r P (1 - P/K)`
    #[default]
    Logistic,
    /// `dP/dt = r P`
    Exponential,
}

impl ModelKind {
    pub fn build(self) -> Box<dyn DerivativeModel> {
        match self {
            Self::Logistic => Box::new(LogisticGrowth::new()),
            Self::Exponential => Box::new(ExponentialGrowth::new()),
        }
    }
}

/// A Sobol study: which model to run and how to analyse it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SobolStudy {
    pub model: ModelKind,
    pub analysis: SensitivityConfig,
}

/// Read and parse a YAML file.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> color_eyre::Result<T> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read '{}'", path.display()))?;
    serde_saphyr::from_str(&content)
        .wrap_err_with(|| format!("failed to parse '{}'", path.display()))
}

pub fn to_yaml<T: Serialize>(value: &T) -> color_eyre::Result<String> {
    serde_saphyr::to_string(value).wrap_err("failed to serialize configuration")
}

/// Load a diffusion study, or the defaults when no file is given.
pub fn load_diffusion(path: Option<&Path>) -> color_eyre::Result<DiffusionConfig> {
    match path {
        Some(path) => {
            let config: DiffusionConfig = load_yaml(path)?;
            tracing::debug!(path = %path.display(), "loaded diffusion study");
            Ok(config)
        }
        None => Ok(DiffusionConfig::default()),
    }
}

/// Load a Sobol study, or the built-in logistic scenario when no file is
/// given.
pub fn load_sobol(path: Option<&Path>) -> color_eyre::Result<SobolStudy> {
    match path {
        Some(path) => {
            let study: SobolStudy = load_yaml(path)?;
            tracing::debug!(path = %path.display(), model = ?study.model, "loaded sobol study");
            Ok(study)
        }
        None => Ok(SobolStudy::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynsens_core::analysis::{OutputTimes, ParameterDistribution};
    use dynsens_core::diffusion::InitialProfile;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let study = load_sobol(None).unwrap();
        assert_eq!(study.model, ModelKind::Logistic);
        assert_eq!(study.analysis.num_samples, 2000);
        assert_eq!(study.analysis.threshold, 100.0);

        let diffusion = load_diffusion(None).unwrap();
        assert_eq!(diffusion, DiffusionConfig::default());
    }

    #[test]
    fn test_load_sobol_study() {
        let file = write_temp(
            r#"
model: exponential
analysis:
  num_samples: 128
  seed: 9
  parameters:
    - name: r
      distribution:
        type: uniform
        low: 0.0
        high: 0.2
  initial_state: [1.0]
  output_times: [0.0, 1.0, 2.0, 5.0]
  threshold: 1.5
"#,
        );
        let study = load_sobol(Some(file.path())).unwrap();
        assert_eq!(study.model, ModelKind::Exponential);
        assert_eq!(study.analysis.num_samples, 128);
        assert_eq!(study.analysis.seed, Some(9));
        assert_eq!(
            study.analysis.parameters[0].distribution,
            ParameterDistribution::Uniform {
                low: 0.0,
                high: 0.2
            }
        );
        assert_eq!(
            study.analysis.output_times,
            OutputTimes::List(vec![0.0, 1.0, 2.0, 5.0])
        );
        // unspecified fields keep their defaults
        assert_eq!(study.analysis.confidence_level, 0.95);

        let model = study.model.build();
        assert!(study.analysis.validate(model.as_ref()).is_ok());
    }

    #[test]
    fn test_load_diffusion_study() {
        let file = write_temp(
            r#"
initial_concentration: 5.0
num_cells: 30
diffusivity: 0.2
initial_profile: uniform
"#,
        );
        let config = load_diffusion(Some(file.path())).unwrap();
        assert_eq!(config.num_cells, 30);
        assert_eq!(config.initial_profile, InitialProfile::Uniform);
        assert_eq!(config.cell_width, 1.0);
    }

    #[test]
    fn test_yaml_round_trip_of_default_study() {
        let yaml = to_yaml(&SobolStudy::default()).unwrap();
        let file = write_temp(&yaml);
        let study = load_sobol(Some(file.path())).unwrap();
        assert_eq!(study, SobolStudy::default());
    }

    #[test]
    fn test_parse_error_names_file() {
        let file = write_temp("num_cells: [not, a, number]\n");
        let err = load_diffusion(Some(file.path())).unwrap_err();
        assert!(format!("{err}").contains("failed to parse"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_sobol(Some(Path::new("/nonexistent/study.yaml"))).unwrap_err();
        assert!(format!("{err}").contains("failed to read"));
    }
}
