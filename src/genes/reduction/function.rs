use super::factors::{as_whole, largest_square_root_factor};
use super::normalize_zero;
use crate::genes::catalog::FunctionKind;
use crate::genes::gene::Gene;

pub(super) fn rewrite(gene: &mut Gene, func: FunctionKind) -> bool {
    let Some(child) = gene.children.first_mut() else {
        return false;
    };
    if child.is_constant() {
        let value = normalize_zero(gene.multiple * func.apply(child.multiple));
        *gene = Gene::constant(value);
        return true;
    }
    if func == FunctionKind::SquareRoot && child.multiple > 0.0 {
        if let Some(whole) = as_whole(child.multiple) {
            let root = largest_square_root_factor(whole);
            if root > 1 {
                child.multiple /= (root * root) as f64;
                gene.multiple *= root as f64;
                return true;
            }
        }
    }
    false
}
