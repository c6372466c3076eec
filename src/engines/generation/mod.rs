pub mod factory;
pub mod genome;
pub mod hall_of_fame;
pub mod operators;
pub mod pareto;
pub mod registry;
pub mod seeds;
pub mod sequence;
pub mod variation;

pub use factory::GenomeFactory;
pub use genome::Genome;
pub use hall_of_fame::{EliteGenome, HallOfFame};
pub use operators::{crossover, mutate, roulette_selection, tournament_selection, MutationKind};
pub use pareto::pareto_front;
pub use registry::GenomeRegistry;
pub use sequence::LazySequence;
