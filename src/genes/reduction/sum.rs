use super::normalize_zero;
use crate::genes::format::render;
use crate::genes::gene::Gene;

pub(super) fn rewrite(gene: &mut Gene) -> bool {
    let mut changed = flatten(gene);
    changed |= fold_constants(gene);
    if super::is_extreme(gene.multiple) {
        return true;
    }
    changed |= combine_like_terms(gene);
    changed |= normalize_sign(gene);
    changed
}

/// Pulls the children of nested sums up, scaled by the nested multiple.
fn flatten(gene: &mut Gene) -> bool {
    if !gene.children.iter().any(Gene::is_sum) {
        return false;
    }
    let children = std::mem::take(&mut gene.children);
    for child in children {
        if child.is_sum() {
            let multiple = child.multiple;
            for grandchild in child.children {
                let scaled = grandchild.multiple * multiple;
                gene.children.push(grandchild.with_multiple(scaled));
            }
        } else {
            gene.children.push(child);
        }
    }
    true
}

/// Folds every constant child into one. A zero total is dropped when other
/// terms remain; a non-finite total collapses the whole sum.
fn fold_constants(gene: &mut Gene) -> bool {
    let constants: Vec<f64> = gene
        .children
        .iter()
        .filter(|c| c.is_constant())
        .map(|c| c.multiple)
        .collect();
    if constants.is_empty() {
        return false;
    }
    let total = normalize_zero(constants.iter().sum());
    if !total.is_finite() {
        gene.multiple *= total;
        gene.children.clear();
        return true;
    }

    let others = gene.children.len() - constants.len();
    let keep = total != 0.0 || others == 0;
    let already_folded = constants.len() == 1 && constants[0].to_bits() == total.to_bits();
    if keep && already_folded {
        return false;
    }
    gene.children.retain(|c| !c.is_constant());
    if keep {
        gene.children.push(Gene::constant(total));
    }
    true
}

/// Merges children that differ only in their multiple. Terms that cancel out
/// are removed.
fn combine_like_terms(gene: &mut Gene) -> bool {
    let mut groups: Vec<(String, Gene, f64, usize)> = Vec::new();
    let mut constants = Vec::new();
    for child in std::mem::take(&mut gene.children) {
        if child.is_constant() {
            constants.push(child);
            continue;
        }
        let key = render(&child, 1.0);
        match groups.iter_mut().find(|(k, ..)| *k == key) {
            Some((_, _, total, count)) => {
                *total += child.multiple;
                *count += 1;
            }
            None => {
                let multiple = child.multiple;
                groups.push((key, child, multiple, 1));
            }
        }
    }

    let mut changed = false;
    for (_, representative, total, count) in groups {
        if count > 1 {
            changed = true;
        }
        if total == 0.0 {
            changed = true;
            continue;
        }
        gene.children.push(representative.with_multiple(total));
    }
    gene.children.extend(constants);
    changed
}

/// A sum whose terms are all negative carries the sign itself.
fn normalize_sign(gene: &mut Gene) -> bool {
    if gene.children.is_empty() || !gene.children.iter().all(|c| c.multiple < 0.0) {
        return false;
    }
    for child in gene.children.iter_mut() {
        child.multiple = -child.multiple;
    }
    gene.multiple = -gene.multiple;
    true
}
