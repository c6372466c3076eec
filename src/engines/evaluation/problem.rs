use crate::engines::evaluation::Fitness;
use crate::engines::generation::Genome;
use crate::error::Result;
use std::sync::Arc;

/// A target the pipeline searches for.
///
/// The pipeline never samples ground truth itself: it asks the problem to
/// test a genome against batch `batch_id` and records the returned sample.
/// Local fitness is what the tiers rank by; global fitness holds samples
/// that passed convergence validation.
#[async_trait::async_trait]
pub trait Problem: Send + Sync {
    fn id(&self) -> &str;

    /// Local fitness of `genome`, created empty on first use.
    fn get_or_create_fitness_for(&self, genome: &Genome) -> Fitness;

    fn get_fitness_for(&self, genome: &Genome, global: bool) -> Option<Fitness>;

    /// Scores `genome` on one sample batch. Errors are operational faults
    /// and halt the pipeline.
    async fn test_processor(&self, genome: Arc<Genome>, batch_id: u64) -> Result<Fitness>;

    /// Folds `sample` into the local fitness and returns the new total.
    fn add_to_local_fitness(&self, genome: &Genome, sample: &Fitness) -> Fitness;

    fn add_to_global_fitness(&self, genome: &Genome, fitness: &Fitness);
}
