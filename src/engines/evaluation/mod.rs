pub mod fitness;
pub mod problem;
pub mod sampled;
pub mod store;

pub use fitness::Fitness;
pub use problem::Problem;
pub use sampled::{SampledProblem, TargetFn};
pub use store::FitnessStore;
