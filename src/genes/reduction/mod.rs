//! Canonicalising term rewriting.
//!
//! [`Gene::reduce`] rewrites a tree in place towards its algebraically
//! simplest canonical form. Each pass reduces the children first and then
//! runs the rules for the node's own kind; passes repeat until nothing
//! changes. Reducing an already reduced tree reports [`Reduction::Unchanged`].

mod division;
pub mod factors;
mod function;
mod product;
mod sum;

use crate::error::{EqforgeError, Result};
use crate::genes::catalog::OperatorKind;
use crate::genes::gene::{Gene, GeneKind};

/// Passes allowed before a reduction is treated as a rewrite-rule cycle.
pub const MAX_REDUCTION_PASSES: usize = 500;

/// Outcome of reducing one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// Already canonical.
    Unchanged,
    /// Rewritten in place.
    Modified,
    /// The caller must put this gene where the reduced node was.
    Replaced(Gene),
}

impl Reduction {
    pub fn is_change(&self) -> bool {
        !matches!(self, Reduction::Unchanged)
    }
}

/// Zero, infinite and NaN multiples swallow whatever they multiply.
pub(crate) fn is_extreme(multiple: f64) -> bool {
    multiple == 0.0 || !multiple.is_finite()
}

impl Gene {
    /// Reduces this node and its subtree in place.
    pub fn reduce(&mut self) -> Result<Reduction> {
        if is_extreme(self.multiple) {
            if self.is_constant() && self.multiple.to_bits() != (-0.0f64).to_bits() {
                return Ok(Reduction::Unchanged);
            }
            return Ok(Reduction::Replaced(Gene::constant(normalize_zero(self.multiple))));
        }
        if self.is_leaf() {
            return Ok(Reduction::Unchanged);
        }

        let mut modified = false;
        let mut passes = 0;
        loop {
            if passes == MAX_REDUCTION_PASSES {
                return Err(EqforgeError::ReductionDiverged {
                    gene: self.to_string(),
                    passes,
                });
            }
            passes += 1;

            let mut changed = self.reduce_children()?;
            changed |= self.rewrite();
            if is_extreme(self.multiple) {
                return Ok(Reduction::Replaced(Gene::constant(normalize_zero(self.multiple))));
            }
            if !changed {
                break;
            }
            modified = true;
        }

        if let Some(mut replacement) = self.settle() {
            if let Reduction::Replaced(further) = replacement.reduce()? {
                replacement = further;
            }
            return Ok(Reduction::Replaced(replacement));
        }
        Ok(if modified {
            Reduction::Modified
        } else {
            Reduction::Unchanged
        })
    }

    /// Returns a reduced copy, leaving `self` untouched.
    pub fn reduced(&self) -> Result<Gene> {
        let mut copy = self.clone();
        match copy.reduce()? {
            Reduction::Replaced(gene) => Ok(gene),
            Reduction::Modified | Reduction::Unchanged => Ok(copy),
        }
    }

    fn reduce_children(&mut self) -> Result<bool> {
        let mut changed = false;
        for child in self.children.iter_mut() {
            let checksum = cfg!(debug_assertions).then(|| child.to_string());
            let outcome = child.reduce()?;
            changed |= outcome.is_change();
            match outcome {
                Reduction::Replaced(gene) => *child = gene,
                Reduction::Modified => {}
                Reduction::Unchanged => {
                    if let Some(before) = checksum {
                        assert_eq!(
                            before,
                            child.to_string(),
                            "reduce() reported Unchanged but rewrote the gene"
                        );
                    }
                }
            }
        }

        for child in self.children.iter_mut() {
            if child.is_sum() && child.children.len() == 1 {
                let multiple = child.multiple;
                if let Some(inner) = child.children.pop() {
                    let scaled = inner.multiple * multiple;
                    *child = inner.with_multiple(scaled);
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    fn rewrite(&mut self) -> bool {
        match self.kind {
            GeneKind::Operator(OperatorKind::Sum) => sum::rewrite(self),
            GeneKind::Operator(OperatorKind::Product) => product::rewrite(self),
            GeneKind::Operator(OperatorKind::Division) => division::rewrite(self),
            GeneKind::Function(func) => function::rewrite(self, func),
            GeneKind::Constant | GeneKind::Parameter(_) => false,
        }
    }

    /// Final structural collapse once the rewrite passes are stable.
    fn settle(&mut self) -> Option<Gene> {
        match self.kind {
            GeneKind::Operator(op) => {
                if self.children.is_empty() {
                    return Some(Gene::constant(self.multiple * op.default_if_no_children()));
                }
                match op {
                    OperatorKind::Sum => {
                        if self.children.iter().all(Gene::is_constant) {
                            let total: f64 = self.children.iter().map(|c| c.multiple).sum();
                            return Some(Gene::constant(normalize_zero(self.multiple * total)));
                        }
                        None
                    }
                    OperatorKind::Product => {
                        if self.children.len() == 1 {
                            let child = self.children.pop()?;
                            let scaled = child.multiple * self.multiple;
                            return Some(child.with_multiple(scaled));
                        }
                        None
                    }
                    OperatorKind::Division => None,
                }
            }
            GeneKind::Function(_) if self.children.is_empty() => Some(Gene::constant(f64::NAN)),
            _ => None,
        }
    }
}

/// Folds `-0.0` into `0.0` so both render and hash the same.
pub(crate) fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reduce(text: &str) -> String {
        let gene: Gene = text.parse().unwrap();
        gene.reduced().unwrap().to_string()
    }

    #[test]
    fn test_extreme_multiples_collapse() {
        let gene = Gene::sum(vec![Gene::parameter(0), Gene::parameter(1)]).with_multiple(f64::INFINITY);
        assert_eq!(gene.reduced().unwrap(), Gene::constant(f64::INFINITY));
        let zero = Gene::parameter(0).with_multiple(0.0);
        assert_eq!(zero.reduced().unwrap(), Gene::constant(0.0));
        let nan = Gene::product(vec![Gene::parameter(0)]).with_multiple(f64::NAN);
        assert!(nan.reduced().unwrap().multiple().is_nan());
    }

    #[test]
    fn test_like_terms() {
        assert_eq!(reduce("(a + a + b)"), "(2a + b)");
        assert_eq!(reduce("(a - a + b)"), "(b)");
    }

    #[test]
    fn test_nested_sums_flatten() {
        assert_eq!(reduce("(a + 2(b + c))"), "(2b + 2c + a)");
    }

    #[test]
    fn test_sign_normalisation() {
        assert_eq!(reduce("(-a - b)"), "-(a + b)");
    }

    #[test]
    fn test_product_rules() {
        assert_eq!(reduce("(2a*3b)"), "6(a*b)");
        assert_eq!(reduce("(a*b/b)"), "a");
        assert_eq!(reduce("(sqrt(a)*sqrt(a))"), "a");
        assert_eq!(reduce("(a*0)"), "0");
    }

    #[test]
    fn test_division_rules() {
        assert_eq!(reduce("(1/4)"), "0.25");
        assert_eq!(reduce("6(1/4a)"), "3(1/2a)");
        assert_eq!(reduce("(1/0.5a)"), "2(1/a)");
        assert_eq!(reduce("(1/(1/a))"), "a");
        assert_eq!(reduce("(1/-a)"), "-(1/a)");
    }

    #[test]
    fn test_function_rules() {
        assert_eq!(reduce("sqrt(9)"), "3");
        assert_eq!(reduce("sqrt(4a)"), "2sqrt(a)");
        assert_eq!(reduce("ln(1)"), "0");
    }

    #[test]
    fn test_unchanged_when_canonical() {
        let mut gene: Gene = "((a*a) - b + 5)".parse().unwrap();
        assert_eq!(gene.reduce().unwrap(), Reduction::Unchanged);
    }

    #[test]
    fn test_nested_change_propagates() {
        let mut gene: Gene = "(b + (a + a))".parse().unwrap();
        assert!(gene.reduce().unwrap().is_change());
        let mut reduced = "(b + (a + a))".parse::<Gene>().unwrap().reduced().unwrap();
        assert!(!reduced.reduce().unwrap().is_change());
    }
}
