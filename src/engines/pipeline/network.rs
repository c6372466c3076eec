//! The supervised network of stages and its shutdown protocol.
//!
//! Wiring, with awaited sends on `=>` and dropping sends on `~>`:
//!
//! ```text
//! generation => producer => tier 0 => tier 1 => ... => tier n
//! breeders => producer
//! tier k ~> producer | breeders | validator
//! ```
//!
//! Every stage reports to the supervisor through a control channel. A
//! converged validator completes the stages in order (producer, tiers,
//! breeders, validator); any fault aborts all of them.

use crate::config::{ConfigSection, PipelineConfig, MIN_POOL_SIZE_FLOOR};
use crate::engines::evaluation::Problem;
use crate::engines::generation::{GenomeFactory, HallOfFame};
use crate::engines::pipeline::breeders::Breeders;
use crate::engines::pipeline::producer::GenomeProducer;
use crate::engines::pipeline::stage::{spawn_stage, ControlEvent, StageExit, StageHandle};
use crate::engines::pipeline::tier::{Tier, TierInput};
use crate::engines::validation::{Champions, ConvergenceValidator};
use crate::error::{EqforgeError, Result};
use crate::types::{ChampionSummary, PipelineReport, PipelineState, TopGenome};
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

/// Time a stage gets to wind down before it is aborted.
const STAGE_GRACE: Duration = Duration::from_secs(5);
const TOP_GENOME_CAPACITY: usize = 256;

/// State every tier reads or updates.
pub(crate) struct NetworkShared {
    pub(crate) config: PipelineConfig,
    pub(crate) factory: Arc<GenomeFactory>,
    pub(crate) producer: Arc<GenomeProducer>,
    pub(crate) problems: Vec<Arc<dyn Problem>>,
    pub(crate) hall_of_fame: Mutex<HallOfFame>,
    pub(crate) top_tx: broadcast::Sender<TopGenome>,
    pub(crate) rejections: DashMap<String, u32>,
    pub(crate) batches: AtomicU64,
    pub(crate) rounds: AtomicU64,
}

pub struct PipelineNetwork {
    config: PipelineConfig,
    factory: Arc<GenomeFactory>,
    problems: Vec<Arc<dyn Problem>>,
    top_tx: broadcast::Sender<TopGenome>,
    state_tx: watch::Sender<PipelineState>,
    champions: Champions,
}

impl PipelineNetwork {
    pub fn new(
        factory: Arc<GenomeFactory>,
        problems: Vec<Arc<dyn Problem>>,
        config: PipelineConfig,
    ) -> Result<Self> {
        if config.pool_size < MIN_POOL_SIZE_FLOOR || config.min_pool_size < MIN_POOL_SIZE_FLOOR {
            return Err(EqforgeError::Contract(format!(
                "Pool size {} (minimum {}) is below the floor of {}",
                config.pool_size, config.min_pool_size, MIN_POOL_SIZE_FLOOR
            )));
        }
        if problems.is_empty() {
            return Err(EqforgeError::Contract(
                "A pipeline needs at least one problem".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        if let Some(duplicate) = problems.iter().map(|p| p.id()).find(|id| !ids.insert(*id)) {
            return Err(EqforgeError::Contract(format!(
                "Problem id '{}' is used more than once",
                duplicate
            )));
        }
        config.validate()?;
        let (top_tx, _) = broadcast::channel(TOP_GENOME_CAPACITY);
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Ok(Self {
            config,
            factory,
            problems,
            top_tx,
            state_tx,
            champions: Champions::default(),
        })
    }

    /// Public stream of improving genomes.
    pub fn subscribe(&self) -> broadcast::Receiver<TopGenome> {
        self.top_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state_tx.borrow()
    }

    pub fn factory(&self) -> &Arc<GenomeFactory> {
        &self.factory
    }

    /// Moves forward to `next`; backward transitions are ignored.
    fn advance(&self, next: PipelineState) -> bool {
        let advanced = self.state_tx.send_if_modified(|state| {
            if state.can_advance_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        if advanced {
            info!("Pipeline state: {:?}", next);
        }
        advanced
    }

    /// Runs the network until a genome is validated for every problem.
    pub async fn run(&self) -> Result<PipelineReport> {
        if !self.advance(PipelineState::Running) {
            let reason = if self.state().is_terminal() {
                "has already completed"
            } else {
                "is already running"
            };
            return Err(EqforgeError::Contract(format!(
                "Pipeline network {}; it can only run once",
                reason
            )));
        }
        let started_at = Utc::now();
        let config = &self.config;

        let producer = Arc::new(GenomeProducer::new(
            Arc::clone(&self.factory),
            config.producer_capacity,
        )?);
        let shared = Arc::new(NetworkShared {
            config: config.clone(),
            factory: Arc::clone(&self.factory),
            producer: Arc::clone(&producer),
            problems: self.problems.clone(),
            hall_of_fame: Mutex::new(HallOfFame::new(config.hall_of_fame_size)),
            top_tx: self.top_tx.clone(),
            rejections: DashMap::new(),
            batches: AtomicU64::new(0),
            rounds: AtomicU64::new(0),
        });

        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let (breeder_tx, breeder_rx) = mpsc::channel(config.breeder_capacity);
        let (validator_tx, validator_rx) = mpsc::channel(config.validator_capacity);

        // shutdown order
        let mut stages: Vec<StageHandle> = Vec::with_capacity(config.tiers + 3);
        stages.push(spawn_stage(
            "producer",
            control_tx.clone(),
            Arc::clone(&producer).run(),
        ));

        let mut input = TierInput::Producer;
        for index in 0..config.tiers {
            let (promote_tx, next_input) = if index + 1 < config.tiers {
                let (tx, rx) = mpsc::channel(config.pool_size);
                (Some(tx), Some(TierInput::Promoted(rx)))
            } else {
                (None, None)
            };
            let tier = Tier::new(
                index,
                Arc::clone(&shared),
                input,
                promote_tx,
                breeder_tx.clone(),
                validator_tx.clone(),
            );
            stages.push(spawn_stage(tier.name().to_string(), control_tx.clone(), tier.run()));
            match next_input {
                Some(next) => input = next,
                None => break,
            }
        }
        drop(breeder_tx);
        drop(validator_tx);

        let breeders = Breeders::new(Arc::clone(&self.factory), Arc::clone(&producer));
        stages.push(spawn_stage("breeders", control_tx.clone(), breeders.run(breeder_rx)));

        let validator = ConvergenceValidator::new(
            self.problems.clone(),
            config.convergence_threshold,
            Arc::clone(&self.champions),
        );
        stages.push(spawn_stage("validator", control_tx.clone(), validator.run(validator_rx)));
        drop(control_tx);

        let outcome = self.supervise(&mut control_rx).await;
        match outcome {
            Ok(()) => {
                self.advance(PipelineState::Converged);
                for stage in stages {
                    debug!("Completing stage '{}'", stage.name());
                    stage.complete(STAGE_GRACE).await;
                }
                self.advance(PipelineState::Completed);
                Ok(self.report(&shared, started_at))
            }
            Err(err) => {
                self.advance(PipelineState::Faulted);
                for stage in &stages {
                    stage.abort();
                }
                error!("Pipeline faulted: {}", err);
                self.advance(PipelineState::Completed);
                Err(err)
            }
        }
    }

    /// Waits for the convergence signal or the first fault.
    async fn supervise(&self, control_rx: &mut mpsc::UnboundedReceiver<ControlEvent>) -> Result<()> {
        while let Some(event) = control_rx.recv().await {
            match event {
                ControlEvent::Finished {
                    exit: StageExit::Converged,
                    stage,
                } => {
                    info!("Stage '{}' reports convergence", stage);
                    return Ok(());
                }
                ControlEvent::Finished {
                    exit: StageExit::Exhausted,
                    stage,
                } => {
                    warn!("Stage '{}' ran out of genomes before convergence", stage);
                    return Err(EqforgeError::ProducerExhausted);
                }
                ControlEvent::Finished { stage, exit } => {
                    debug!("Stage '{}' ended early: {:?}", stage, exit);
                }
                ControlEvent::Faulted { error, .. } => return Err(error),
            }
        }
        Err(EqforgeError::ProducerExhausted)
    }

    fn report(&self, shared: &NetworkShared, started_at: chrono::DateTime<Utc>) -> PipelineReport {
        let champions = self
            .champions
            .lock()
            .values()
            .map(|validated| {
                let reduced = validated
                    .genome
                    .reduced()
                    .map(|r| r.hash().to_string())
                    .unwrap_or_else(|| validated.genome.hash().to_string());
                ChampionSummary {
                    problem_id: validated.problem_id.clone(),
                    genome: validated.genome.hash().to_string(),
                    reduced,
                    average: validated.fitness.average(),
                    samples: validated.fitness.count,
                }
            })
            .collect();
        PipelineReport {
            champions,
            rounds: shared.rounds.load(Ordering::Relaxed),
            registered: self.factory.registry().len(),
            generated: self.factory.generated(),
            started_at,
            completed_at: Utc::now(),
        }
    }
}
