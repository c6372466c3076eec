pub mod evaluation;
pub mod generation;
pub mod pipeline;
pub mod validation;
