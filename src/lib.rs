pub mod config;
pub mod engines;
pub mod error;
pub mod genes;
pub mod types;

pub use engines::evaluation::{Fitness, Problem, SampledProblem};
pub use engines::generation::{Genome, GenomeFactory};
pub use engines::pipeline::{LogObserver, PipelineNetwork};
pub use error::{EqforgeError, Result};
pub use genes::{Catalog, Gene};
pub use types::{PipelineReport, PipelineState, TopGenome};
