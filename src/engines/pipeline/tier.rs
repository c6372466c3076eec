//! One selection tier: samples a pool, scores it against every problem and
//! decides what survives, what moves up, what is bred and what goes back to
//! the producer.

use crate::engines::evaluation::Fitness;
use crate::engines::generation::{pareto_front, roulette_selection, tournament_selection, Genome};
use crate::engines::pipeline::network::NetworkShared;
use crate::engines::pipeline::stage::{join_blocking, StageExit};
use crate::engines::validation::ConvergenceCandidate;
use crate::error::{EqforgeError, Result};
use crate::types::TopGenome;
use log::{debug, info};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinSet;

/// Where a tier draws new genomes from.
pub enum TierInput {
    Producer,
    Promoted(mpsc::Receiver<Arc<Genome>>),
}

pub struct Tier {
    index: usize,
    name: String,
    shared: Arc<NetworkShared>,
    input: TierInput,
    promote_tx: Option<mpsc::Sender<Arc<Genome>>>,
    breeder_tx: mpsc::Sender<Vec<Arc<Genome>>>,
    validator_tx: mpsc::Sender<ConvergenceCandidate>,
    pool: Vec<Arc<Genome>>,
    promoted: HashSet<String>,
}

/// Tournament winners drawn per crossover group.
const CROSSOVER_GROUP: usize = 4;

/// Scores of one round, `[genome][problem]`.
type Scores = Vec<Vec<Fitness>>;

impl Tier {
    pub(crate) fn new(
        index: usize,
        shared: Arc<NetworkShared>,
        input: TierInput,
        promote_tx: Option<mpsc::Sender<Arc<Genome>>>,
        breeder_tx: mpsc::Sender<Vec<Arc<Genome>>>,
        validator_tx: mpsc::Sender<ConvergenceCandidate>,
    ) -> Self {
        Self {
            index,
            name: format!("tier-{}", index),
            shared,
            input,
            promote_tx,
            breeder_tx,
            validator_tx,
            pool: Vec::new(),
            promoted: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn run(mut self) -> Result<StageExit> {
        loop {
            if let Some(exit) = self.fill_pool().await {
                return Ok(exit);
            }
            let scores = self.score_pool().await?;
            let round = self.shared.rounds.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("{} round {}: scored {} genomes", self.name, round, self.pool.len());

            self.post_top(&scores);
            self.submit_converged(&scores);

            let selected = self.select(&scores);
            self.promote(&scores).await;
            self.breed(&selected, &scores);
            self.cross(&selected, &scores).await?;

            let pool = std::mem::take(&mut self.pool);
            for (i, genome) in pool.into_iter().enumerate() {
                if selected.contains(&i) {
                    self.pool.push(genome);
                } else {
                    self.recycle(genome);
                }
            }
        }
    }

    /// Tops the pool up. Returns an exit when the input can no longer
    /// supply enough genomes.
    async fn fill_pool(&mut self) -> Option<StageExit> {
        let config = &self.shared.config;
        let (target, minimum) = (config.pool_size, config.min_pool_size);
        while self.pool.len() < target {
            let genome = match &mut self.input {
                TierInput::Producer => match self.shared.producer.next().await {
                    Some(genome) => genome,
                    None => return Some(StageExit::Exhausted),
                },
                TierInput::Promoted(rx) if self.pool.len() < minimum => match rx.recv().await {
                    Some(genome) => genome,
                    None => return Some(StageExit::Completed),
                },
                TierInput::Promoted(rx) => match rx.try_recv() {
                    Ok(genome) => genome,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                },
            };
            if self.pool.iter().all(|g| g.hash() != genome.hash()) {
                self.pool.push(genome);
            }
        }
        None
    }

    /// Samples every genome against every problem on one shared batch.
    async fn score_pool(&self) -> Result<Scores> {
        let problems = &self.shared.problems;
        let batch = self.shared.batches.fetch_add(1, Ordering::Relaxed);
        let mut tasks = JoinSet::new();
        for (g, genome) in self.pool.iter().enumerate() {
            for (p, problem) in problems.iter().enumerate() {
                let genome = Arc::clone(genome);
                let problem = Arc::clone(problem);
                tasks.spawn(async move {
                    let sample = problem.test_processor(Arc::clone(&genome), batch).await?;
                    let total = problem.add_to_local_fitness(&genome, &sample);
                    Ok::<_, EqforgeError>((g, p, total))
                });
            }
        }

        let mut scores = vec![vec![Fitness::new(); problems.len()]; self.pool.len()];
        while let Some(joined) = tasks.join_next().await {
            let (g, p, total) = joined.map_err(|_| EqforgeError::StagePanicked(self.name.clone()))??;
            scores[g][p] = total;
        }
        Ok(scores)
    }

    /// Pool indices ordered best first for problem `p`.
    fn ranked(scores: &Scores, p: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b][p].compare(&scores[a][p]));
        order
    }

    fn post_top(&self, scores: &Scores) {
        for (p, problem) in self.shared.problems.iter().enumerate() {
            let Some(&best) = Self::ranked(scores, p).first() else {
                continue;
            };
            let genome = &self.pool[best];
            let fitness = &scores[best][p];
            let improved = self
                .shared
                .hall_of_fame
                .lock()
                .offer(problem.id(), genome, fitness);
            if improved {
                let top = TopGenome {
                    problem_id: problem.id().to_string(),
                    genome: Arc::clone(genome),
                    fitness: fitness.clone(),
                    tier: self.index,
                };
                info!("New best {}", top);
                let _ = self.shared.top_tx.send(top);
            }
        }
    }

    fn submit_converged(&self, scores: &Scores) {
        let threshold = self.shared.config.convergence_threshold;
        for (g, row) in scores.iter().enumerate() {
            for (p, fitness) in row.iter().enumerate() {
                if !fitness.has_converged(threshold) {
                    continue;
                }
                let candidate = ConvergenceCandidate {
                    problem: p,
                    genome: Arc::clone(&self.pool[g]),
                };
                if self.validator_tx.try_send(candidate).is_err() {
                    debug!("{}: validator busy, {} waits a round", self.name, self.pool[g]);
                }
            }
        }
    }

    /// Top half per problem plus the most isolated members of the
    /// cross-problem Pareto front.
    fn select(&self, scores: &Scores) -> HashSet<usize> {
        let keep = (scores.len() + 1) / 2;
        let mut selected = HashSet::new();
        for p in 0..self.shared.problems.len() {
            selected.extend(Self::ranked(scores, p).into_iter().take(keep));
        }
        selected.extend(Self::pareto_survivors(scores, keep));
        selected
    }

    /// At most `cap` Pareto members, boundary and sparse regions first.
    fn pareto_survivors(scores: &Scores, cap: usize) -> Vec<usize> {
        let objectives: Vec<Vec<f64>> = scores
            .iter()
            .map(|row| row.iter().map(Fitness::average).collect())
            .collect();
        let mut front = pareto_front(&objectives);
        front.truncate(cap);
        front
    }

    /// Sends each problem's leaders to the next tier once.
    async fn promote(&mut self, scores: &Scores) {
        let Some(tx) = self.promote_tx.clone() else {
            return;
        };
        let count = (scores.len() / 4).max(1);
        for p in 0..self.shared.problems.len() {
            for g in Self::ranked(scores, p).into_iter().take(count) {
                let genome = &self.pool[g];
                if !self.promoted.insert(genome.hash().to_string()) {
                    continue;
                }
                if tx.send(Arc::clone(genome)).await.is_err() {
                    return;
                }
            }
        }
    }

    fn population(&self, selected: &HashSet<usize>, scores: &Scores, p: usize) -> Vec<(Arc<Genome>, Fitness)> {
        let mut indices: Vec<usize> = selected.iter().copied().collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .map(|g| (Arc::clone(&self.pool[g]), scores[g][p].clone()))
            .collect()
    }

    /// Hands a fitness-weighted batch of survivors to the breeders.
    fn breed(&self, selected: &HashSet<usize>, scores: &Scores) {
        let size = self.shared.config.breed_batch;
        if size == 0 {
            return;
        }
        let mut rng = rand::thread_rng();
        let p = rng.gen_range(0..self.shared.problems.len());
        let population = self.population(selected, scores, p);
        let mut batch: Vec<Arc<Genome>> = Vec::with_capacity(size);
        for _ in 0..size {
            if let Some(genome) = roulette_selection(&population, &mut rng) {
                if batch.iter().all(|g| g.hash() != genome.hash()) {
                    batch.push(Arc::clone(genome));
                }
            }
        }
        if batch.is_empty() {
            return;
        }
        if self.breeder_tx.try_send(batch).is_err() {
            debug!("{}: breeders busy, batch dropped", self.name);
        }
    }

    /// Crosses tournament-selected parent groups and queues the offspring.
    /// Each group retries across its pairs until one crosses.
    async fn cross(&self, selected: &HashSet<usize>, scores: &Scores) -> Result<()> {
        let config = &self.shared.config;
        if config.crossover_pairs == 0 || selected.len() < 2 {
            return Ok(());
        }
        let mut groups: Vec<Vec<Arc<Genome>>> = Vec::with_capacity(config.crossover_pairs);
        {
            let mut rng = rand::thread_rng();
            let p = rng.gen_range(0..self.shared.problems.len());
            let population = self.population(selected, scores, p);
            for _ in 0..config.crossover_pairs {
                let mut group: Vec<Arc<Genome>> = Vec::with_capacity(CROSSOVER_GROUP);
                for _ in 0..CROSSOVER_GROUP {
                    let Some(parent) = tournament_selection(&population, config.tournament_size, &mut rng) else {
                        continue;
                    };
                    if group.iter().all(|g| g.hash() != parent.hash()) {
                        group.push(Arc::clone(parent));
                    }
                }
                if group.len() >= 2 {
                    groups.push(group);
                }
            }
        }
        if groups.is_empty() {
            return Ok(());
        }

        let factory = Arc::clone(&self.shared.factory);
        let offspring = join_blocking(
            &self.name,
            tokio::task::spawn_blocking(move || -> Result<Vec<Arc<Genome>>> {
                let mut offspring = Vec::new();
                for group in &groups {
                    if let Some((left, right)) = factory.crossover_any(group)? {
                        offspring.push(left);
                        offspring.push(right);
                    }
                }
                Ok(offspring)
            }),
        )
        .await?;

        for child in offspring {
            if !self.shared.producer.try_enqueue(child) {
                debug!("{}: producer full, offspring dropped", self.name);
            }
        }
        Ok(())
    }

    /// Returns a rejected genome to the producer while it has rejections left.
    fn recycle(&self, genome: Arc<Genome>) {
        let rejections = {
            let mut entry = self
                .shared
                .rejections
                .entry(genome.hash().to_string())
                .or_insert(0);
            *entry += 1;
            *entry
        };
        if rejections >= self.shared.config.rejection_threshold {
            return;
        }
        if !self.shared.producer.try_enqueue(genome) {
            debug!("{}: rejected genome not recycled", self.name);
        }
    }
}
