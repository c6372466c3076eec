//! Reference problem: scores genomes against a known target function on
//! seeded random sample batches.

use crate::config::{ConfigSection, SamplingConfig};
use crate::engines::evaluation::{Fitness, FitnessStore, Problem};
use crate::engines::generation::Genome;
use crate::error::{EqforgeError, Result};
use crate::genes::Gene;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

pub type TargetFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

pub struct SampledProblem {
    id: String,
    target: TargetFn,
    parameter_count: usize,
    sampling: SamplingConfig,
    store: FitnessStore,
}

impl SampledProblem {
    pub fn new(
        id: impl Into<String>,
        target: TargetFn,
        parameter_count: usize,
        sampling: SamplingConfig,
    ) -> Result<Self> {
        if parameter_count == 0 {
            return Err(EqforgeError::Contract(
                "A sampled problem needs at least one parameter".to_string(),
            ));
        }
        sampling.validate()?;
        Ok(Self {
            id: id.into(),
            target,
            parameter_count,
            sampling,
            store: FitnessStore::new(),
        })
    }

    /// Target given as a gene, typically parsed from `sampling.target`.
    pub fn from_gene(
        id: impl Into<String>,
        target: Gene,
        parameter_count: usize,
        sampling: SamplingConfig,
    ) -> Result<Self> {
        if let Some(max) = target.max_parameter() {
            if max >= parameter_count {
                return Err(EqforgeError::Contract(format!(
                    "Target {} uses parameter {} but only {} are sampled",
                    target, max, parameter_count
                )));
            }
        }
        let target = Arc::new(move |values: &[f64]| target.calculate(values));
        Self::new(id, target, parameter_count, sampling)
    }

    /// Parses `sampling.target` and builds the problem from it.
    pub fn from_config(id: impl Into<String>, parameter_count: usize, sampling: SamplingConfig) -> Result<Self> {
        let target: Gene = sampling.target.parse()?;
        Self::from_gene(id, target, parameter_count, sampling)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn store(&self) -> &FitnessStore {
        &self.store
    }

    /// Deterministic points of batch `batch_id`.
    pub fn batch(&self, batch_id: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.sampling.seed ^ batch_id);
        (0..self.sampling.batch_size)
            .map(|_| {
                (0..self.parameter_count)
                    .map(|_| rng.gen_range(self.sampling.lower..=self.sampling.upper))
                    .collect()
            })
            .collect()
    }

    /// Root mean squared error of `genome` on batch `batch_id`; NaN when any
    /// prediction is not finite.
    pub fn rmse(&self, genome: &Genome, batch_id: u64) -> f64 {
        let points = self.batch(batch_id);
        let mut squared = 0.0;
        for point in &points {
            let predicted = genome.calculate(point);
            if !predicted.is_finite() {
                return f64::NAN;
            }
            let error = predicted - (self.target)(point);
            squared += error * error;
        }
        (squared / points.len() as f64).sqrt()
    }
}

#[async_trait::async_trait]
impl Problem for SampledProblem {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_or_create_fitness_for(&self, genome: &Genome) -> Fitness {
        self.store.get_or_create(genome.hash())
    }

    fn get_fitness_for(&self, genome: &Genome, global: bool) -> Option<Fitness> {
        self.store.get(genome.hash(), global)
    }

    async fn test_processor(&self, genome: Arc<Genome>, batch_id: u64) -> Result<Fitness> {
        let rmse = self.rmse(&genome, batch_id);
        if rmse.is_nan() {
            return Ok(Fitness::sample(f64::NAN, false));
        }
        let success = rmse <= self.sampling.tolerance;
        Ok(Fitness::sample(1.0 / (1.0 + rmse), success))
    }

    fn add_to_local_fitness(&self, genome: &Genome, sample: &Fitness) -> Fitness {
        self.store.add(genome.hash(), sample, false)
    }

    fn add_to_global_fitness(&self, genome: &Genome, fitness: &Fitness) {
        self.store.add(genome.hash(), fitness, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> SampledProblem {
        SampledProblem::from_config("hypot", 2, SamplingConfig::default()).unwrap()
    }

    fn genome(text: &str) -> Arc<Genome> {
        Arc::new(Genome::new(text.parse().unwrap()))
    }

    #[test]
    fn test_batches_are_deterministic() {
        let problem = problem();
        assert_eq!(problem.batch(3), problem.batch(3));
        assert_ne!(problem.batch(3), problem.batch(4));
        assert!(problem.batch(0).iter().flatten().all(|v| (1.0..=10.0).contains(v)));
    }

    #[test]
    fn test_rejects_target_with_unsampled_parameter() {
        let result = SampledProblem::from_gene("p", "(a + c)".parse().unwrap(), 2, SamplingConfig::default());
        assert!(matches!(result, Err(EqforgeError::Contract(_))));
    }

    #[test]
    fn test_rejects_invalid_sampling_range() {
        for (lower, upper) in [(5.0, 1.0), (1.0, f64::INFINITY), (f64::NAN, 1.0)] {
            let sampling = SamplingConfig {
                lower,
                upper,
                ..SamplingConfig::default()
            };
            let result = SampledProblem::from_config("p", 2, sampling);
            assert!(matches!(result, Err(EqforgeError::Configuration(_))));
        }
    }

    #[tokio::test]
    async fn test_exact_genome_succeeds() {
        let problem = problem();
        let sample = problem.test_processor(genome("sqrt((a*a) + (b*b))"), 7).await.unwrap();
        assert_eq!(sample.streak, 1);
        assert!((sample.average() - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_wrong_genome_scores_lower() {
        let problem = problem();
        let sample = problem.test_processor(genome("(a + b)"), 7).await.unwrap();
        assert_eq!(sample.streak, 0);
        assert!(sample.average() < 1.0);
    }

    #[tokio::test]
    async fn test_non_finite_prediction_is_nan() {
        let problem = SampledProblem::from_config(
            "p",
            2,
            SamplingConfig {
                lower: -1.0,
                upper: 1.0,
                ..SamplingConfig::default()
            },
        )
        .unwrap();
        let sample = problem.test_processor(genome("ln((a - a))"), 1).await.unwrap();
        assert!(sample.average().is_nan());
    }

    #[tokio::test]
    async fn test_fitness_accumulates_locally() {
        let problem = problem();
        let g = genome("(a + b)");
        for batch in 0..3 {
            let sample = problem.test_processor(Arc::clone(&g), batch).await.unwrap();
            problem.add_to_local_fitness(&g, &sample);
        }
        assert_eq!(problem.get_fitness_for(&g, false).map(|f| f.count), Some(3));
        assert!(problem.get_fitness_for(&g, true).is_none());
    }
}
