use super::factors::{as_whole, greatest_common_factor};
use super::normalize_zero;
use crate::genes::gene::Gene;

pub(super) fn rewrite(gene: &mut Gene) -> bool {
    if gene.children.len() > 1 {
        let children = std::mem::take(&mut gene.children);
        gene.children.push(Gene::product(children));
        return true;
    }
    let Some(child) = gene.children.first_mut() else {
        return false;
    };

    if child.is_constant() {
        let value = normalize_zero(gene.multiple / child.multiple);
        *gene = Gene::constant(value);
        return true;
    }

    // 1/(1/y) is y
    if child.is_division() && child.children.len() == 1 {
        let scale = child.multiple;
        if let Some(inner) = child.children.pop() {
            let multiple = gene.multiple / scale;
            *gene = Gene::product(vec![inner]).with_multiple(multiple);
            return true;
        }
    }

    let mut changed = false;
    let mut parent = gene.multiple;
    let mut inner = child.multiple;
    if inner < 0.0 {
        inner = -inner;
        parent = -parent;
        changed = true;
    }
    if inner != 1.0 {
        if let (Some(p), Some(c)) = (as_whole(parent), as_whole(inner)) {
            let common = greatest_common_factor(p, c);
            if common > 1 {
                parent /= common as f64;
                inner /= common as f64;
                changed = true;
            }
        }
        let ratio = parent / inner;
        if inner != 1.0 && ratio.is_finite() && ratio.fract() == 0.0 {
            parent = ratio;
            inner = 1.0;
            changed = true;
        }
    }
    child.multiple = inner;
    gene.multiple = parent;
    changed
}
