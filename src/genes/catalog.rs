use crate::error::{EqforgeError, Result};
use crate::genes::gene::Gene;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Operators that combine child genes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorKind {
    Sum,
    Product,
    /// Reciprocal of its single child.
    Division,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 3] = [OperatorKind::Sum, OperatorKind::Product, OperatorKind::Division];

    pub fn symbol(&self) -> &'static str {
        match self {
            OperatorKind::Sum => "+",
            OperatorKind::Product => "*",
            OperatorKind::Division => "/",
        }
    }

    /// Maximum child count, `None` when unbounded.
    pub fn max_children(&self) -> Option<usize> {
        match self {
            OperatorKind::Division => Some(1),
            OperatorKind::Sum | OperatorKind::Product => None,
        }
    }

    pub fn is_n_ary(&self) -> bool {
        self.max_children().is_none()
    }

    /// Value of the operator when it has no children left.
    pub fn default_if_no_children(&self) -> f64 {
        match self {
            OperatorKind::Sum => 0.0,
            OperatorKind::Product | OperatorKind::Division => 1.0,
        }
    }
}

/// Unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunctionKind {
    SquareRoot,
    NaturalLog,
}

impl FunctionKind {
    pub const ALL: [FunctionKind; 2] = [FunctionKind::SquareRoot, FunctionKind::NaturalLog];

    pub fn symbol(&self) -> &'static str {
        match self {
            FunctionKind::SquareRoot => "sqrt",
            FunctionKind::NaturalLog => "ln",
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            FunctionKind::SquareRoot => value.sqrt(),
            FunctionKind::NaturalLog => value.ln(),
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        FunctionKind::ALL.into_iter().find(|f| f.symbol() == symbol)
    }
}

/// The operator and function symbols a search is allowed to use.
///
/// Generation, mutation and crossover only ever build genes from the catalog
/// they were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    operators: Vec<OperatorKind>,
    functions: Vec<FunctionKind>,
}

impl Catalog {
    pub fn new(operators: Vec<OperatorKind>, functions: Vec<FunctionKind>) -> Result<Self> {
        let mut catalog = Self {
            operators: Vec::new(),
            functions: Vec::new(),
        };
        for op in operators {
            if !catalog.operators.contains(&op) {
                catalog.operators.push(op);
            }
        }
        for func in functions {
            if !catalog.functions.contains(&func) {
                catalog.functions.push(func);
            }
        }
        if !catalog.operators.iter().any(OperatorKind::is_n_ary) {
            return Err(EqforgeError::Configuration(
                "Catalog needs at least one of '+' or '*'".to_string(),
            ));
        }
        Ok(catalog)
    }

    /// Every operator and function the crate knows about.
    pub fn full() -> Self {
        Self {
            operators: OperatorKind::ALL.to_vec(),
            functions: FunctionKind::ALL.to_vec(),
        }
    }

    pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Result<Self> {
        let mut operators = Vec::new();
        let mut functions = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim();
            if let Some(op) = OperatorKind::ALL.into_iter().find(|o| o.symbol() == symbol) {
                operators.push(op);
            } else if let Some(func) = FunctionKind::from_symbol(symbol) {
                functions.push(func);
            } else {
                return Err(EqforgeError::Configuration(format!(
                    "Unknown operator symbol: {}",
                    symbol
                )));
            }
        }
        Self::new(operators, functions)
    }

    pub fn operators(&self) -> &[OperatorKind] {
        &self.operators
    }

    pub fn functions(&self) -> &[FunctionKind] {
        &self.functions
    }

    pub fn has_operator(&self, op: OperatorKind) -> bool {
        self.operators.contains(&op)
    }

    pub fn n_ary_operators(&self) -> impl Iterator<Item = OperatorKind> + '_ {
        self.operators.iter().copied().filter(OperatorKind::is_n_ary)
    }

    pub fn symbols(&self) -> Vec<&'static str> {
        self.operators
            .iter()
            .map(OperatorKind::symbol)
            .chain(self.functions.iter().map(FunctionKind::symbol))
            .collect()
    }

    /// Builds an empty operator or function gene for `symbol`.
    pub fn new_gene(&self, symbol: &str) -> Option<Gene> {
        if let Some(op) = self.operators.iter().find(|o| o.symbol() == symbol) {
            return Some(Gene::operator(*op, Vec::new()));
        }
        self.functions
            .iter()
            .find(|f| f.symbol() == symbol)
            .map(|f| Gene::function_empty(*f))
    }

    pub fn random_n_ary<R: Rng>(&self, rng: &mut R) -> Option<OperatorKind> {
        let n_ary: Vec<OperatorKind> = self.n_ary_operators().collect();
        n_ary.choose(rng).copied()
    }

    pub fn random_function<R: Rng>(&self, rng: &mut R) -> Option<FunctionKind> {
        self.functions.choose(rng).copied()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_from_symbols() {
        let catalog = Catalog::from_symbols(&["+", "*", "sqrt"]).unwrap();
        assert_eq!(catalog.operators(), &[OperatorKind::Sum, OperatorKind::Product]);
        assert_eq!(catalog.functions(), &[FunctionKind::SquareRoot]);
        assert_eq!(catalog.symbols(), vec!["+", "*", "sqrt"]);
    }

    #[test]
    fn test_catalog_rejects_unknown_symbol() {
        assert!(Catalog::from_symbols(&["+", "^"]).is_err());
    }

    #[test]
    fn test_catalog_needs_n_ary_operator() {
        assert!(Catalog::from_symbols(&["/", "sqrt"]).is_err());
    }

    #[test]
    fn test_new_gene_lookup() {
        let catalog = Catalog::from_symbols(&["+", "ln"]).unwrap();
        assert!(catalog.new_gene("+").is_some());
        assert!(catalog.new_gene("ln").is_some());
        assert!(catalog.new_gene("*").is_none());
    }
}
