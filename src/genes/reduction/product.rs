use crate::genes::catalog::FunctionKind;
use crate::genes::format::render;
use crate::genes::gene::{Gene, GeneKind};

pub(super) fn rewrite(gene: &mut Gene) -> bool {
    let mut changed = migrate_multiples(gene);
    if super::is_extreme(gene.multiple) {
        return true;
    }
    changed |= flatten(gene);
    changed |= merge_divisions(gene);
    changed |= cancel_divisors(gene);
    changed |= cancel_square_roots(gene);
    changed
}

fn is_plain_division(gene: &Gene) -> bool {
    gene.is_division() && gene.multiple == 1.0 && gene.children.len() == 1
}

/// Moves every child multiple, and every constant child, onto the product.
fn migrate_multiples(gene: &mut Gene) -> bool {
    let mut changed = false;
    let mut factor = 1.0;
    gene.children.retain_mut(|child| {
        if child.is_constant() {
            factor *= child.multiple;
            changed = true;
            return false;
        }
        if child.multiple != 1.0 {
            factor *= child.multiple;
            child.multiple = 1.0;
            changed = true;
        }
        true
    });
    gene.multiple *= factor;
    changed
}

fn flatten(gene: &mut Gene) -> bool {
    if !gene.children.iter().any(Gene::is_product) {
        return false;
    }
    let children = std::mem::take(&mut gene.children);
    for child in children {
        if child.is_product() {
            let multiple = child.multiple;
            gene.multiple *= multiple;
            gene.children.extend(child.children);
        } else {
            gene.children.push(child);
        }
    }
    true
}

/// `x/y/z` keeps a single divisor: `x/(y*z)`.
fn merge_divisions(gene: &mut Gene) -> bool {
    if gene.children.iter().filter(|c| is_plain_division(c)).count() < 2 {
        return false;
    }
    let mut denominators = Vec::new();
    gene.children.retain_mut(|child| {
        if is_plain_division(child) {
            denominators.append(&mut child.children);
            false
        } else {
            true
        }
    });
    gene.children.push(Gene::division(Gene::product(denominators)));
    true
}

/// Removes factors that also appear in the divisor.
fn cancel_divisors(gene: &mut Gene) -> bool {
    let Some(division_index) = gene.children.iter().position(is_plain_division) else {
        return false;
    };
    let factor_keys: Vec<Option<String>> = gene
        .children
        .iter()
        .enumerate()
        .map(|(i, c)| (i != division_index && c.multiple == 1.0).then(|| c.to_string()))
        .collect();
    let mut removed: Vec<usize> = Vec::new();
    let take_factor = |key: &str, removed: &mut Vec<usize>| {
        let found = factor_keys
            .iter()
            .enumerate()
            .find(|(i, k)| !removed.contains(i) && k.as_deref() == Some(key))
            .map(|(i, _)| i);
        if let Some(i) = found {
            removed.push(i);
        }
        found.is_some()
    };

    let mut divisor_scale = None;
    if let Some(divisor) = gene.children[division_index].children.first_mut() {
        if divisor.is_product() {
            let mut j = 0;
            while j < divisor.children.len() {
                let candidate = &divisor.children[j];
                if candidate.multiple == 1.0 && take_factor(&candidate.to_string(), &mut removed) {
                    divisor.children.remove(j);
                } else {
                    j += 1;
                }
            }
        } else if take_factor(&render(divisor, 1.0), &mut removed) {
            divisor_scale = Some(divisor.multiple);
        }
    }
    if let Some(scale) = divisor_scale {
        gene.multiple /= scale;
        removed.push(division_index);
    }
    if removed.is_empty() {
        return false;
    }
    removed.sort_unstable_by(|a, b| b.cmp(a));
    for index in removed {
        gene.children.remove(index);
    }
    true
}

/// `sqrt(x)*sqrt(x)` becomes `x`.
fn cancel_square_roots(gene: &mut Gene) -> bool {
    let roots: Vec<(usize, String)> = gene
        .children
        .iter()
        .enumerate()
        .filter(|(_, c)| c.kind == GeneKind::Function(FunctionKind::SquareRoot) && c.multiple == 1.0)
        .map(|(i, c)| (i, c.to_string()))
        .collect();
    let mut used = vec![false; roots.len()];
    let mut pairs = Vec::new();
    for x in 0..roots.len() {
        if used[x] {
            continue;
        }
        for y in (x + 1)..roots.len() {
            if !used[y] && roots[x].1 == roots[y].1 {
                used[x] = true;
                used[y] = true;
                pairs.push((roots[x].0, roots[y].0));
                break;
            }
        }
    }
    if pairs.is_empty() {
        return false;
    }

    let freed: Vec<Gene> = pairs
        .iter()
        .filter_map(|&(first, _)| gene.children[first].children.first().cloned())
        .collect();
    let mut removed: Vec<usize> = pairs.iter().flat_map(|&(p, q)| [p, q]).collect();
    removed.sort_unstable_by(|a, b| b.cmp(a));
    for index in removed {
        gene.children.remove(index);
    }
    gene.children.extend(freed);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_divisions() {
        let mut gene: Gene = "(a/b/c)".parse().unwrap();
        assert!(merge_divisions(&mut gene));
        assert_eq!(gene.children().len(), 2);
        assert_eq!(gene.to_string(), "(a/(b*c))");
    }

    #[test]
    fn test_cancel_inside_divisor_product() {
        let mut gene: Gene = "(a*b/(a*c))".parse().unwrap();
        assert!(cancel_divisors(&mut gene));
        assert_eq!(gene.to_string(), "(b/(c))");
    }

    #[test]
    fn test_migrate_constant_children() {
        let mut gene: Gene = "(2*a*3b)".parse().unwrap();
        assert!(migrate_multiples(&mut gene));
        assert_eq!(gene.multiple(), 6.0);
        assert_eq!(gene.children().len(), 2);
    }
}
