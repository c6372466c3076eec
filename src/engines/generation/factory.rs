use crate::config::{ConfigSection, FactoryConfig};
use crate::engines::generation::genome::Genome;
use crate::engines::generation::operators;
use crate::engines::generation::registry::GenomeRegistry;
use crate::engines::generation::seeds;
use crate::engines::generation::sequence::LazySequence;
use crate::error::{EqforgeError, Result};
use crate::genes::{Catalog, Gene};
use log::{debug, warn};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Deepest chain of mutations tried by the generation fallback.
const MAX_FALLBACK_DEPTH: usize = 3;

type SeedSource = Box<dyn Iterator<Item = Gene> + Send>;

/// Creates, mutates and crosses genomes, deduplicating everything through
/// its own [`GenomeRegistry`].
pub struct GenomeFactory {
    catalog: Arc<Catalog>,
    config: FactoryConfig,
    registry: GenomeRegistry,
    seeds: Mutex<SeedSource>,
    generated: AtomicUsize,
    slow_generations: AtomicUsize,
}

impl GenomeFactory {
    pub fn new(catalog: Catalog, config: FactoryConfig) -> Result<Self> {
        config.validate()?;
        let seeds: SeedSource = Box::new(seeds::seed_roots(
            &catalog,
            config.parameter_count,
            config.max_seed_arity,
        ));
        Ok(Self {
            catalog: Arc::new(catalog),
            config,
            registry: GenomeRegistry::new(),
            seeds: Mutex::new(seeds),
            generated: AtomicUsize::new(0),
            slow_generations: AtomicUsize::new(0),
        })
    }

    /// Builds the catalog from the configured operator symbols.
    pub fn from_config(config: FactoryConfig) -> Result<Self> {
        let catalog = Catalog::from_symbols(&config.operators)?;
        Self::new(catalog, config)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn registry(&self) -> &GenomeRegistry {
        &self.registry
    }

    pub fn parameter_count(&self) -> usize {
        self.config.parameter_count
    }

    /// Genomes produced by [`GenomeFactory::generate`] so far.
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::Relaxed)
    }

    /// Calls to [`GenomeFactory::generate`] that ran past the soft timeout.
    pub fn slow_generations(&self) -> usize {
        self.slow_generations.load(Ordering::Relaxed)
    }

    fn check_preconditions(&self, genome: &Genome) -> Result<()> {
        let root = genome.root();
        if !root.is_well_formed() {
            return Err(EqforgeError::Contract(format!(
                "Genome {} breaks an arity rule",
                genome.hash()
            )));
        }
        if let Some(max) = root.max_parameter() {
            if max >= self.config.parameter_count {
                return Err(EqforgeError::Contract(format!(
                    "Genome {} uses parameter {} but only {} are configured",
                    genome.hash(),
                    max,
                    self.config.parameter_count
                )));
            }
        }
        Ok(())
    }

    fn mutation_stream(&self, root: Gene) -> LazySequence<Gene> {
        let catalog = Arc::clone(&self.catalog);
        let parameter_count = self.config.parameter_count;
        let attempts = self.config.mutation_attempts;
        LazySequence::new((0..self.config.mutation_stream_length).filter_map(move |_| {
            let mut rng = rand::thread_rng();
            operators::mutate(&root, &catalog, parameter_count, attempts, &mut rng)
        }))
    }

    /// Registers `genome`, returning the authoritative frozen instance.
    ///
    /// When the hash is already known the existing instance is returned and
    /// `genome` is dropped.
    pub fn register(&self, genome: Genome) -> Result<Arc<Genome>> {
        Ok(self.register_with_status(genome)?.0)
    }

    pub fn register_gene(&self, root: Gene) -> Result<Arc<Genome>> {
        self.register(Genome::new(root))
    }

    fn register_with_status(&self, mut genome: Genome) -> Result<(Arc<Genome>, bool)> {
        if let Some(existing) = self.registry.get(genome.hash()) {
            return Ok((existing, false));
        }
        self.check_preconditions(&genome)?;
        let reduced = match genome.reduced_root()? {
            Some(root) => Some(self.register_canonical(Genome::new(root))),
            None => None,
        };
        let mutations = self.mutation_stream(genome.root().clone());
        genome.attach(reduced, mutations);
        genome.freeze();
        Ok(self.registry.insert_or_get(Arc::new(genome)))
    }

    fn register_canonical(&self, mut genome: Genome) -> Arc<Genome> {
        if let Some(existing) = self.registry.get(genome.hash()) {
            return existing;
        }
        let mutations = self.mutation_stream(genome.root().clone());
        genome.attach(None, mutations);
        genome.freeze();
        self.registry.insert_or_get(Arc::new(genome)).0
    }

    /// Produces one genome the registry has not seen before, `None` once
    /// every strategy is exhausted.
    pub fn generate(&self) -> Result<Option<Arc<Genome>>> {
        let started = Instant::now();
        let result = self.generate_new();
        let elapsed = started.elapsed();
        let limit = self.config.generation_soft_timeout();
        if elapsed > limit {
            self.slow_generations.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Genome generation took {:?}, past the soft limit of {:?}",
                elapsed, limit
            );
        }
        result
    }

    fn generate_new(&self) -> Result<Option<Arc<Genome>>> {
        loop {
            let next = self.seeds.lock().next();
            let Some(root) = next else {
                break;
            };
            let (genome, inserted) = self.register_with_status(Genome::new(root))?;
            if inserted {
                self.generated.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(genome));
            }
        }

        let mut rng = rand::thread_rng();
        for depth in 1..=MAX_FALLBACK_DEPTH {
            for _ in 0..self.config.fallback_retries {
                let Some(base) = self.registry.random(&mut rng) else {
                    return Ok(None);
                };
                let Some(root) = operators::mutate_deep(
                    base.root(),
                    depth,
                    &self.catalog,
                    self.config.parameter_count,
                    self.config.mutation_attempts,
                    &mut rng,
                ) else {
                    continue;
                };
                let (genome, inserted) = self.register_with_status(Genome::new(root))?;
                if inserted {
                    self.generated.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(genome));
                }
            }
        }
        debug!(
            "Generation exhausted after {} genomes",
            self.generated.load(Ordering::Relaxed)
        );
        Ok(None)
    }

    /// Registers one mutation of `genome`, `None` when every attempt was rejected.
    pub fn mutate(&self, genome: &Genome) -> Result<Option<Arc<Genome>>> {
        let mut rng = rand::thread_rng();
        let mutant = operators::mutate(
            genome.root(),
            &self.catalog,
            self.config.parameter_count,
            self.config.mutation_attempts,
            &mut rng,
        );
        mutant.map(|root| self.register_gene(root)).transpose()
    }

    /// Crosses two genomes, rejecting offspring identical to each other or to
    /// either parent.
    pub fn attempt_new_crossover(
        &self,
        first: &Genome,
        second: &Genome,
    ) -> Result<Option<(Arc<Genome>, Arc<Genome>)>> {
        if first.hash() == second.hash() {
            return Ok(None);
        }
        let mut rng = rand::thread_rng();
        for _ in 0..self.config.crossover_attempts {
            let Some((left, right)) = operators::crossover(first.root(), second.root(), &mut rng) else {
                continue;
            };
            let (left, right) = (Genome::new(left), Genome::new(right));
            let parents = [first.hash(), second.hash()];
            if left.hash() == right.hash()
                || parents.contains(&left.hash())
                || parents.contains(&right.hash())
            {
                continue;
            }
            let left = self.register(left)?;
            let right = self.register(right)?;
            return Ok(Some((left, right)));
        }
        Ok(None)
    }

    /// Tries candidate pairs in random order until one crosses.
    pub fn crossover_any(
        &self,
        candidates: &[Arc<Genome>],
    ) -> Result<Option<(Arc<Genome>, Arc<Genome>)>> {
        let mut pairs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|i| ((i + 1)..candidates.len()).map(move |j| (i, j)))
            .collect();
        pairs.shuffle(&mut rand::thread_rng());
        for (i, j) in pairs.into_iter().take(self.config.crossover_attempts) {
            if let Some(offspring) = self.attempt_new_crossover(&candidates[i], &candidates[j])? {
                return Ok(Some(offspring));
            }
        }
        Ok(None)
    }

    /// Registers the next unseen element of the genome's variation stream.
    pub fn next_variation(&self, genome: &Genome) -> Result<Option<Arc<Genome>>> {
        while let Some(root) = genome.next_variation() {
            let (registered, inserted) = self.register_with_status(Genome::new(root))?;
            if inserted {
                return Ok(Some(registered));
            }
        }
        Ok(None)
    }

    /// Registers the next unseen element of the genome's mutation stream.
    pub fn next_mutation(&self, genome: &Genome) -> Result<Option<Arc<Genome>>> {
        while let Some(root) = genome.next_mutation() {
            let (registered, inserted) = self.register_with_status(Genome::new(root))?;
            if inserted {
                return Ok(Some(registered));
            }
        }
        Ok(None)
    }

    /// Reduced form, one variation and one mutation of `genome`.
    pub fn expand(&self, genome: &Arc<Genome>) -> Result<Vec<Arc<Genome>>> {
        let mut expanded = Vec::with_capacity(3);
        let reduced = genome.as_reduced()?;
        if !Arc::ptr_eq(&reduced, genome) {
            expanded.push(if reduced.is_frozen() {
                reduced
            } else {
                self.register_canonical(Genome::new(reduced.root().clone()))
            });
        }
        if let Some(variation) = self.next_variation(genome)? {
            expanded.push(variation);
        }
        if let Some(mutation) = self.next_mutation(genome)? {
            expanded.push(mutation);
        }
        Ok(expanded)
    }

    /// Expands a batch in parallel.
    pub fn expand_all(&self, batch: &[Arc<Genome>]) -> Result<Vec<Arc<Genome>>> {
        let expanded: Vec<Vec<Arc<Genome>>> = batch
            .par_iter()
            .map(|genome| self.expand(genome))
            .collect::<Result<_>>()?;
        Ok(expanded.into_iter().flatten().collect())
    }
}
