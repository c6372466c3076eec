pub mod convergence;

pub use convergence::{
    Champions, ConvergenceCandidate, ConvergenceValidator, ValidatedGenome, VALIDATION_BATCH_BASE,
};
