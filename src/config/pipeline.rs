use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::{EqforgeError, Result};
use serde::{Deserialize, Serialize};

/// Smallest pool a tier can rank and halve meaningfully.
pub const MIN_POOL_SIZE_FLOOR: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pool_size: usize,
    pub tiers: usize,
    /// Consecutive successful samples that count as converged.
    pub convergence_threshold: u32,
    pub min_pool_size: usize,
    /// Rejections after which a genome is no longer recycled.
    pub rejection_threshold: u32,
    pub producer_capacity: usize,
    pub breeder_capacity: usize,
    pub validator_capacity: usize,
    /// Genomes handed to the breeders per round.
    pub breed_batch: usize,
    /// Crossover pairs attempted per round.
    pub crossover_pairs: usize,
    pub tournament_size: usize,
    pub hall_of_fame_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            tiers: 2,
            convergence_threshold: 5,
            min_pool_size: 4,
            rejection_threshold: 3,
            producer_capacity: 64,
            breeder_capacity: 16,
            validator_capacity: 8,
            breed_batch: 4,
            crossover_pairs: 2,
            tournament_size: 3,
            hall_of_fame_size: 10,
        }
    }
}

impl ConfigSection for PipelineConfig {
    fn section_name() -> &'static str {
        "pipeline"
    }

    fn validate(&self) -> Result<()> {
        if self.min_pool_size < MIN_POOL_SIZE_FLOOR {
            return Err(EqforgeError::Configuration(format!(
                "Minimum pool size must be at least {}",
                MIN_POOL_SIZE_FLOOR
            )));
        }
        if self.pool_size < self.min_pool_size {
            return Err(EqforgeError::Configuration(format!(
                "Pool size {} is below the minimum of {}",
                self.pool_size, self.min_pool_size
            )));
        }
        if self.tiers == 0 {
            return Err(EqforgeError::Configuration(
                "At least one tier is required".to_string(),
            ));
        }
        if self.convergence_threshold == 0 {
            return Err(EqforgeError::Configuration(
                "Convergence threshold must be at least 1".to_string(),
            ));
        }
        if self.producer_capacity == 0 || self.breeder_capacity == 0 || self.validator_capacity == 0 {
            return Err(EqforgeError::Configuration(
                "Queue capacities must be at least 1".to_string(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(EqforgeError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let d = Self::default();
        ConfigManifest {
            section: "Pipeline".to_string(),
            fields: vec![
                FieldManifest::integer("pool_size", d.pool_size, MIN_POOL_SIZE_FLOOR as f64, "Genomes per tier pool"),
                FieldManifest::integer("tiers", d.tiers, 1.0, "Number of selection tiers"),
                FieldManifest::integer("convergence_threshold", d.convergence_threshold, 1.0, "Successful samples in a row to converge"),
                FieldManifest::integer("min_pool_size", d.min_pool_size, MIN_POOL_SIZE_FLOOR as f64, "Pool size floor"),
                FieldManifest::integer("rejection_threshold", d.rejection_threshold, 0.0, "Rejections before a genome is dropped"),
                FieldManifest::integer("producer_capacity", d.producer_capacity, 1.0, "Producer queue capacity"),
                FieldManifest::integer("breeder_capacity", d.breeder_capacity, 1.0, "Breeder queue capacity"),
                FieldManifest::integer("validator_capacity", d.validator_capacity, 1.0, "Validator queue capacity"),
                FieldManifest::integer("breed_batch", d.breed_batch, 0.0, "Genomes sent to breeders per round"),
                FieldManifest::integer("crossover_pairs", d.crossover_pairs, 0.0, "Crossovers attempted per round"),
                FieldManifest::integer("tournament_size", d.tournament_size, 1.0, "Tournament selection size"),
                FieldManifest::integer("hall_of_fame_size", d.hall_of_fame_size, 1.0, "Champions kept per problem"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_below_minimum_rejected() {
        let config = PipelineConfig {
            pool_size: 3,
            min_pool_size: 4,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_floor_enforced() {
        let config = PipelineConfig {
            pool_size: 1,
            min_pool_size: 1,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
