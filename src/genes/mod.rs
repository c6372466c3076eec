pub mod catalog;
pub mod format;
pub mod gene;
pub mod parser;
pub mod reduction;

pub use catalog::{Catalog, FunctionKind, OperatorKind};
pub use format::{canonical_order, format_number, parameter_name};
pub use gene::{Gene, GeneKind};
pub use reduction::{Reduction, MAX_REDUCTION_PASSES};
