use eqforge::config::{FactoryConfig, PipelineConfig, SamplingConfig};
use eqforge::engines::evaluation::{Fitness, FitnessStore, Problem, SampledProblem};
use eqforge::engines::generation::{Genome, GenomeFactory};
use eqforge::engines::pipeline::{spawn_observer, ChannelObserver, GenomeProducer, PipelineNetwork};
use eqforge::{Catalog, EqforgeError, PipelineState};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn factory(symbols: &[&str]) -> Arc<GenomeFactory> {
    Arc::new(GenomeFactory::new(Catalog::from_symbols(symbols).unwrap(), FactoryConfig::default()).unwrap())
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        pool_size: 24,
        convergence_threshold: 3,
        ..PipelineConfig::default()
    }
}

fn sampled(target: &str) -> Arc<SampledProblem> {
    let sampling = SamplingConfig {
        target: target.to_string(),
        ..SamplingConfig::default()
    };
    Arc::new(SampledProblem::from_config(target, 2, sampling).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn converges_on_a_seeded_target() {
    let problem = sampled("(a*b)");
    let problems: Vec<Arc<dyn Problem>> = vec![problem.clone()];
    let network = PipelineNetwork::new(factory(&["+", "*"]), problems, pipeline_config()).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(60), network.run())
        .await
        .expect("pipeline should converge in time")
        .unwrap();

    assert_eq!(network.state(), PipelineState::Completed);
    let champion = report.champion("(a*b)").expect("champion for the problem");
    assert_eq!(champion.reduced, "(a*b)");
    assert!(champion.samples >= 3);
    assert!(report.rounds > 0);
    assert!(report.completed_at >= report.started_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn converges_on_hypotenuse() {
    let problem = sampled("sqrt((a*a) + (b*b))");
    let problems: Vec<Arc<dyn Problem>> = vec![problem.clone()];
    let network = PipelineNetwork::new(factory(&["+", "*", "sqrt"]), problems, pipeline_config()).unwrap();

    let (tx, mut posts) = mpsc::unbounded_channel();
    let observer = spawn_observer(network.subscribe(), ChannelObserver::new(tx));

    let report = tokio::time::timeout(Duration::from_secs(300), network.run())
        .await
        .expect("pipeline should converge in time")
        .unwrap();

    let champion = report
        .champion("sqrt((a*a) + (b*b))")
        .expect("champion for the problem");
    let genome = Genome::new(champion.genome.parse().unwrap());
    for batch in [u64::MAX - 1, u64::MAX - 2, u64::MAX - 3] {
        assert!(problem.rmse(&genome, batch) <= 1e-9, "{} misses on fresh samples", champion.genome);
    }

    assert!(posts.recv().await.is_some());
    drop(network);
    observer.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producer_enqueue_waits_for_room() {
    let factory = factory(&["+", "*"]);
    let producer = Arc::new(GenomeProducer::new(Arc::clone(&factory), 2).unwrap());
    let genomes: Vec<_> = ["(a + b)", "(a*b)", "(a*a*b)"]
        .iter()
        .map(|text| factory.register_gene(text.parse().unwrap()).unwrap())
        .collect();

    assert!(producer.enqueue(Arc::clone(&genomes[0])).await);
    assert!(producer.enqueue(Arc::clone(&genomes[1])).await);

    let pending = {
        let producer = Arc::clone(&producer);
        let genome = Arc::clone(&genomes[2]);
        tokio::spawn(async move { producer.enqueue(genome).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!pending.is_finished(), "enqueue should wait while the queue is full");

    tokio::spawn(Arc::clone(&producer).run());

    let mut wanted: HashSet<String> = genomes.iter().map(|g| g.hash().to_string()).collect();
    let drained = tokio::time::timeout(Duration::from_secs(10), async {
        while !wanted.is_empty() {
            let Some(genome) = producer.next().await else {
                break;
            };
            wanted.remove(genome.hash());
        }
    })
    .await;
    assert!(drained.is_ok());
    assert!(wanted.is_empty(), "accepted genomes were dropped: {:?}", wanted);
    assert!(pending.await.unwrap());
}

/// Scores normally for a few samples, then fails or panics.
struct FaultyProblem {
    store: FitnessStore,
    calls: AtomicUsize,
    fail_after: usize,
    panic: bool,
}

impl FaultyProblem {
    fn new(fail_after: usize, panic: bool) -> Self {
        Self {
            store: FitnessStore::new(),
            calls: AtomicUsize::new(0),
            fail_after,
            panic,
        }
    }
}

#[async_trait::async_trait]
impl Problem for FaultyProblem {
    fn id(&self) -> &str {
        "faulty"
    }

    fn get_or_create_fitness_for(&self, genome: &Genome) -> Fitness {
        self.store.get_or_create(genome.hash())
    }

    fn get_fitness_for(&self, genome: &Genome, global: bool) -> Option<Fitness> {
        self.store.get(genome.hash(), global)
    }

    async fn test_processor(&self, _genome: Arc<Genome>, _batch_id: u64) -> eqforge::Result<Fitness> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_after {
            return Ok(Fitness::sample(0.5, false));
        }
        if self.panic {
            panic!("sampler crashed");
        }
        Err(EqforgeError::Evaluation("sampler unavailable".to_string()))
    }

    fn add_to_local_fitness(&self, genome: &Genome, sample: &Fitness) -> Fitness {
        self.store.add(genome.hash(), sample, false)
    }

    fn add_to_global_fitness(&self, genome: &Genome, fitness: &Fitness) {
        self.store.add(genome.hash(), fitness, true);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn evaluation_error_faults_the_pipeline() {
    let problems: Vec<Arc<dyn Problem>> = vec![Arc::new(FaultyProblem::new(50, false))];
    let network = PipelineNetwork::new(factory(&["+", "*"]), problems, pipeline_config()).unwrap();
    let mut state = network.watch_state();

    let err = tokio::time::timeout(Duration::from_secs(10), network.run())
        .await
        .expect("a fault must not stall the pipeline")
        .unwrap_err();

    assert!(matches!(err, EqforgeError::StageFaulted { .. }));
    assert!(matches!(err.root_cause(), EqforgeError::Evaluation(_)));
    assert_eq!(*state.borrow_and_update(), PipelineState::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_stage_faults_the_pipeline() {
    let problems: Vec<Arc<dyn Problem>> = vec![Arc::new(FaultyProblem::new(10, true))];
    let network = PipelineNetwork::new(factory(&["+", "*"]), problems, pipeline_config()).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(10), network.run())
        .await
        .expect("a panic must not stall the pipeline")
        .unwrap_err();

    assert!(matches!(err.root_cause(), EqforgeError::StagePanicked(_)));
}

#[test]
fn pool_below_floor_is_a_contract_violation() {
    let config = PipelineConfig {
        pool_size: 1,
        min_pool_size: 1,
        ..PipelineConfig::default()
    };
    let problems: Vec<Arc<dyn Problem>> = vec![sampled("(a*b)")];
    let result = PipelineNetwork::new(factory(&["+", "*"]), problems, config);
    assert!(matches!(result, Err(EqforgeError::Contract(_))));
}

#[test]
fn network_without_problems_is_rejected() {
    let result = PipelineNetwork::new(factory(&["+"]), Vec::new(), PipelineConfig::default());
    assert!(matches!(result, Err(EqforgeError::Contract(_))));
}

#[test]
fn duplicate_problem_ids_are_rejected() {
    let problems: Vec<Arc<dyn Problem>> = vec![sampled("(a*b)"), sampled("(a*b)")];
    let result = PipelineNetwork::new(factory(&["+", "*"]), problems, pipeline_config());
    assert!(matches!(result, Err(EqforgeError::Contract(_))));
}

#[tokio::test]
async fn network_runs_only_once() {
    let problems: Vec<Arc<dyn Problem>> = vec![Arc::new(FaultyProblem::new(0, false))];
    let network = PipelineNetwork::new(factory(&["+", "*"]), problems, pipeline_config()).unwrap();
    assert!(network.run().await.is_err());
    assert!(network.state().is_terminal());
    assert!(matches!(network.run().await, Err(EqforgeError::Contract(_))));
}
