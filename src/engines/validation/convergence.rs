//! Re-tests genomes the tiers consider converged on batches the tiers never
//! sample, and accepts only those that stay converged.

use crate::engines::evaluation::{Fitness, Problem};
use crate::engines::generation::Genome;
use crate::engines::pipeline::stage::StageExit;
use crate::error::Result;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// First batch id used for validation. Tier batches count up from zero and
/// never reach it.
pub const VALIDATION_BATCH_BASE: u64 = 1 << 62;

/// A genome a tier saw converge on one problem.
#[derive(Debug, Clone)]
pub struct ConvergenceCandidate {
    pub problem: usize,
    pub genome: Arc<Genome>,
}

#[derive(Debug, Clone)]
pub struct ValidatedGenome {
    pub problem_id: String,
    pub genome: Arc<Genome>,
    pub fitness: Fitness,
}

/// Validated genomes keyed by problem id.
pub type Champions = Arc<Mutex<BTreeMap<String, ValidatedGenome>>>;

pub struct ConvergenceValidator {
    problems: Vec<Arc<dyn Problem>>,
    threshold: u32,
    next_batch: u64,
    tested: HashSet<(usize, String)>,
    champions: Champions,
}

impl ConvergenceValidator {
    pub fn new(problems: Vec<Arc<dyn Problem>>, threshold: u32, champions: Champions) -> Self {
        Self {
            problems,
            threshold,
            next_batch: VALIDATION_BATCH_BASE,
            tested: HashSet::new(),
            champions,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.champions.lock().len() == self.problems.len()
    }

    /// Samples `candidate` on `threshold` fresh batches. Returns the
    /// validated genome when every sample succeeded.
    pub async fn validate(&mut self, candidate: &ConvergenceCandidate) -> Result<Option<ValidatedGenome>> {
        let Some(problem) = self.problems.get(candidate.problem).cloned() else {
            return Ok(None);
        };
        let mut fitness = Fitness::new();
        for _ in 0..self.threshold {
            let batch = self.next_batch;
            self.next_batch += 1;
            let sample = problem
                .test_processor(Arc::clone(&candidate.genome), batch)
                .await?;
            fitness.merge(&sample);
        }
        if !fitness.has_converged(self.threshold) {
            return Ok(None);
        }
        problem.add_to_global_fitness(&candidate.genome, &fitness);
        Ok(Some(ValidatedGenome {
            problem_id: problem.id().to_string(),
            genome: Arc::clone(&candidate.genome),
            fitness,
        }))
    }

    /// Works through candidates until every problem has a champion.
    pub async fn run(mut self, mut candidates: mpsc::Receiver<ConvergenceCandidate>) -> Result<StageExit> {
        while let Some(candidate) = candidates.recv().await {
            let Some(problem_id) = self.problems.get(candidate.problem).map(|p| p.id().to_string()) else {
                continue;
            };
            if self.champions.lock().contains_key(&problem_id) {
                continue;
            }
            if !self
                .tested
                .insert((candidate.problem, candidate.genome.hash().to_string()))
            {
                continue;
            }
            match self.validate(&candidate).await? {
                Some(validated) => {
                    info!(
                        "Validated {} for problem '{}' ({})",
                        validated.genome, validated.problem_id, validated.fitness
                    );
                    self.champions.lock().insert(problem_id, validated);
                    if self.is_converged() {
                        return Ok(StageExit::Converged);
                    }
                }
                None => debug!(
                    "Rejected {} for problem '{}' on fresh samples",
                    candidate.genome, problem_id
                ),
            }
        }
        Ok(StageExit::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use crate::engines::evaluation::SampledProblem;

    fn problems() -> Vec<Arc<dyn Problem>> {
        let problem = SampledProblem::from_config("hypot", 2, SamplingConfig::default()).unwrap();
        vec![Arc::new(problem)]
    }

    fn candidate(text: &str) -> ConvergenceCandidate {
        ConvergenceCandidate {
            problem: 0,
            genome: Arc::new(Genome::new(text.parse().unwrap())),
        }
    }

    #[tokio::test]
    async fn test_exact_genome_validates() {
        let champions = Champions::default();
        let problems = problems();
        let mut validator = ConvergenceValidator::new(problems.clone(), 3, Arc::clone(&champions));
        let exact = candidate("sqrt((a*a) + (b*b))");
        let validated = validator.validate(&exact).await.unwrap().unwrap();
        assert_eq!(validated.fitness.count, 3);
        assert_eq!(
            problems[0].get_fitness_for(&exact.genome, true).map(|f| f.count),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_wrong_genome_is_rejected() {
        let mut validator = ConvergenceValidator::new(problems(), 3, Champions::default());
        assert!(validator.validate(&candidate("(a + b)")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_converges_once_every_problem_has_a_champion() {
        let champions = Champions::default();
        let validator = ConvergenceValidator::new(problems(), 2, Arc::clone(&champions));
        let (tx, rx) = mpsc::channel(4);
        tx.send(candidate("(a + b)")).await.unwrap();
        tx.send(candidate("sqrt((a*a) + (b*b))")).await.unwrap();
        let exit = validator.run(rx).await.unwrap();
        assert_eq!(exit, StageExit::Converged);
        assert_eq!(
            champions.lock().get("hypot").map(|c| c.genome.hash().to_string()).as_deref(),
            Some("sqrt((a*a) + (b*b))")
        );
    }
}
