use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::{EqforgeError, Result};
use serde::{Deserialize, Serialize};

/// How the reference problem draws sample batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Target expression in gene syntax.
    pub target: String,
    pub lower: f64,
    pub upper: f64,
    pub batch_size: usize,
    /// Largest RMSE a sample may have and still count as a success.
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target: "sqrt((a*a) + (b*b))".to_string(),
            lower: 1.0,
            upper: 10.0,
            batch_size: 16,
            tolerance: 1e-9,
            seed: 42,
        }
    }
}

impl ConfigSection for SamplingConfig {
    fn section_name() -> &'static str {
        "sampling"
    }

    fn validate(&self) -> Result<()> {
        if !(self.lower.is_finite() && self.upper.is_finite()) || self.lower >= self.upper {
            return Err(EqforgeError::Configuration(
                "Sampling range must be finite with lower < upper".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EqforgeError::Configuration(
                "Batch size must be at least 1".to_string(),
            ));
        }
        if self.tolerance < 0.0 || self.tolerance.is_nan() {
            return Err(EqforgeError::Configuration(
                "Tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let d = Self::default();
        ConfigManifest {
            section: "Sampling".to_string(),
            fields: vec![
                FieldManifest::text("target", d.target, "Target expression"),
                FieldManifest::float("lower", d.lower, None, "Lower bound of sampled parameters"),
                FieldManifest::float("upper", d.upper, None, "Upper bound of sampled parameters"),
                FieldManifest::integer("batch_size", d.batch_size, 1.0, "Points per sample batch"),
                FieldManifest::float("tolerance", d.tolerance, Some(0.0), "RMSE counted as a success"),
                FieldManifest::integer("seed", d.seed, 0.0, "Base seed for sample batches"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_rejected() {
        let config = SamplingConfig {
            lower: 5.0,
            upper: 1.0,
            ..SamplingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
