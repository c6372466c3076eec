use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::{EqforgeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Operator and function symbols, e.g. `["+", "*", "sqrt"]`.
    pub operators: Vec<String>,
    pub parameter_count: usize,
    /// Largest number of parameters combined by one seeded operator.
    pub max_seed_arity: usize,
    pub mutation_attempts: usize,
    pub crossover_attempts: usize,
    /// Retries per depth when falling back to mutating registered genomes.
    pub fallback_retries: usize,
    pub mutation_stream_length: usize,
    pub generation_soft_timeout_ms: u64,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            operators: vec!["+".to_string(), "*".to_string(), "sqrt".to_string()],
            parameter_count: 2,
            max_seed_arity: 3,
            mutation_attempts: 16,
            crossover_attempts: 8,
            fallback_retries: 32,
            mutation_stream_length: 24,
            generation_soft_timeout_ms: 250,
        }
    }
}

impl FactoryConfig {
    pub fn generation_soft_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_soft_timeout_ms)
    }
}

impl ConfigSection for FactoryConfig {
    fn section_name() -> &'static str {
        "factory"
    }

    fn validate(&self) -> Result<()> {
        if self.operators.is_empty() {
            return Err(EqforgeError::Configuration(
                "At least one operator symbol is required".to_string(),
            ));
        }
        if self.parameter_count == 0 {
            return Err(EqforgeError::Configuration(
                "Parameter count must be at least 1".to_string(),
            ));
        }
        if self.max_seed_arity < 1 {
            return Err(EqforgeError::Configuration(
                "Seed arity must be at least 1".to_string(),
            ));
        }
        if self.mutation_attempts == 0 || self.crossover_attempts == 0 || self.fallback_retries == 0 {
            return Err(EqforgeError::Configuration(
                "Retry limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let defaults = Self::default();
        ConfigManifest {
            section: "Factory".to_string(),
            fields: vec![
                FieldManifest {
                    name: "operators".to_string(),
                    field_type: "list".to_string(),
                    default: serde_json::json!(defaults.operators),
                    min: None,
                    max: None,
                    description: "Operator catalog symbols (+ * / sqrt ln)".to_string(),
                },
                FieldManifest::integer("parameter_count", defaults.parameter_count, 1.0, "Number of input parameters"),
                FieldManifest::integer("max_seed_arity", defaults.max_seed_arity, 1.0, "Largest seeded operator arity"),
                FieldManifest::integer("mutation_attempts", defaults.mutation_attempts, 1.0, "Retries per mutation"),
                FieldManifest::integer("crossover_attempts", defaults.crossover_attempts, 1.0, "Retries per crossover pair"),
                FieldManifest::integer("fallback_retries", defaults.fallback_retries, 1.0, "Fallback mutation retries per depth"),
                FieldManifest::integer("mutation_stream_length", defaults.mutation_stream_length, 0.0, "Mutations offered per genome"),
                FieldManifest::integer(
                    "generation_soft_timeout_ms",
                    defaults.generation_soft_timeout_ms,
                    0.0,
                    "Warn when one generation attempt takes longer",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(FactoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_parameters_rejected() {
        let config = FactoryConfig {
            parameter_count: 0,
            ..FactoryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
