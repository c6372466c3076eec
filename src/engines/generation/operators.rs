use crate::engines::evaluation::Fitness;
use crate::genes::{Catalog, FunctionKind, Gene, GeneKind, OperatorKind};
use rand::seq::SliceRandom;
use rand::Rng;

/// Tournament selection: pick best of K random candidates
pub fn tournament_selection<'a, T, R: Rng>(
    population: &'a [(T, Fitness)],
    tournament_size: usize,
    rng: &mut R,
) -> Option<&'a T> {
    if population.is_empty() {
        return None;
    }
    let mut best_idx = rng.gen_range(0..population.len());

    for _ in 1..tournament_size {
        let idx = rng.gen_range(0..population.len());
        if population[idx].1.is_better_than(&population[best_idx].1) {
            best_idx = idx;
        }
    }

    Some(&population[best_idx].0)
}

/// Roulette wheel selection: probability proportional to average fitness
pub fn roulette_selection<'a, T, R: Rng>(
    population: &'a [(T, Fitness)],
    rng: &mut R,
) -> Option<&'a T> {
    if population.is_empty() {
        return None;
    }
    let weight = |f: &Fitness| {
        let average = f.average();
        if average.is_finite() { average.max(0.0) } else { 0.0 }
    };
    let total_fitness: f64 = population.iter().map(|(_, f)| weight(f)).sum();

    if total_fitness <= 0.0 {
        return Some(&population[rng.gen_range(0..population.len())].0);
    }

    let mut spin = rng.gen::<f64>() * total_fitness;

    for (item, fitness) in population {
        spin -= weight(fitness);
        if spin <= 0.0 {
            return Some(item);
        }
    }

    // Fallback
    population.last().map(|(item, _)| item)
}

/// Edits a mutation can make to one gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    FlipSign,
    ChangeMagnitude,
    SubstituteParameter,
    AddBranch,
    SubstituteOperator,
    RemoveSubtree,
    WrapFunction,
    UnwrapFunction,
    Square,
}

fn applicable(node: &Gene, is_root: bool, catalog: &Catalog, parameter_count: usize) -> Vec<MutationKind> {
    use MutationKind::*;
    let mut kinds = vec![FlipSign];
    let has_functions = !catalog.functions().is_empty();
    let can_square = catalog.has_operator(OperatorKind::Product);
    match node.kind() {
        GeneKind::Constant => kinds.push(ChangeMagnitude),
        GeneKind::Parameter(_) => {
            kinds.push(ChangeMagnitude);
            if parameter_count > 1 {
                kinds.push(SubstituteParameter);
            }
            kinds.push(AddBranch);
        }
        GeneKind::Operator(op) => {
            if op.is_n_ary() {
                kinds.push(AddBranch);
                if catalog.n_ary_operators().count() > 1 {
                    kinds.push(SubstituteOperator);
                }
            }
        }
        GeneKind::Function(_) => {
            kinds.push(UnwrapFunction);
            if catalog.functions().len() > 1 {
                kinds.push(SubstituteOperator);
            }
        }
    }
    if !is_root {
        kinds.push(RemoveSubtree);
    }
    if !node.is_constant() {
        if has_functions {
            kinds.push(WrapFunction);
        }
        if can_square {
            kinds.push(Square);
        }
    }
    kinds
}

/// Applies `kind` to the node at `path`. Returns false when the edit does
/// not apply or would break an arity rule.
fn apply<R: Rng>(
    root: &mut Gene,
    path: &[usize],
    kind: MutationKind,
    catalog: &Catalog,
    parameter_count: usize,
    rng: &mut R,
) -> bool {
    if kind == MutationKind::RemoveSubtree {
        let Some((_, parent_path)) = path.split_last() else {
            return false;
        };
        if !root.get(parent_path).map_or(false, Gene::can_spare_child) {
            return false;
        }
        return root.remove_at(path).is_some();
    }

    let Some(node) = root.get_mut(path) else {
        return false;
    };
    match kind {
        MutationKind::FlipSign => {
            let multiple = -node.multiple();
            node.set_multiple(multiple);
        }
        MutationKind::ChangeMagnitude => {
            let delta = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let mut multiple = node.multiple() + delta;
            if multiple == 0.0 {
                multiple = node.multiple() - delta;
            }
            node.set_multiple(multiple);
        }
        MutationKind::SubstituteParameter => {
            let GeneKind::Parameter(current) = node.kind() else {
                return false;
            };
            let offset = rng.gen_range(1..parameter_count);
            let replacement = (current + offset) % parameter_count;
            let multiple = node.multiple();
            *node = Gene::parameter(replacement).with_multiple(multiple);
        }
        MutationKind::AddBranch => {
            let branch = Gene::parameter(rng.gen_range(0..parameter_count));
            match node.kind() {
                GeneKind::Operator(op) if op.is_n_ary() => {
                    return node.push_child(branch);
                }
                GeneKind::Parameter(_) => {
                    let Some(op) = catalog.random_n_ary(rng) else {
                        return false;
                    };
                    let leaf = std::mem::replace(node, Gene::sum(Vec::new()));
                    *node = Gene::operator(op, vec![leaf, branch]);
                }
                _ => return false,
            }
        }
        MutationKind::SubstituteOperator => match node.kind() {
            GeneKind::Operator(current) => {
                let choices: Vec<OperatorKind> =
                    catalog.n_ary_operators().filter(|op| *op != current).collect();
                let Some(op) = choices.choose(rng).copied() else {
                    return false;
                };
                node.kind = GeneKind::Operator(op);
            }
            GeneKind::Function(current) => {
                let choices: Vec<FunctionKind> = catalog
                    .functions()
                    .iter()
                    .copied()
                    .filter(|f| *f != current)
                    .collect();
                let Some(func) = choices.choose(rng).copied() else {
                    return false;
                };
                node.kind = GeneKind::Function(func);
            }
            _ => return false,
        },
        MutationKind::WrapFunction => {
            let Some(func) = catalog.random_function(rng) else {
                return false;
            };
            let inner = std::mem::replace(node, Gene::sum(Vec::new()));
            *node = Gene::function(func, inner);
        }
        MutationKind::UnwrapFunction => {
            if !matches!(node.kind(), GeneKind::Function(_)) {
                return false;
            }
            let multiple = node.multiple();
            let Some(inner) = node.children.pop() else {
                return false;
            };
            let scaled = inner.multiple() * multiple;
            *node = inner.with_multiple(scaled);
        }
        MutationKind::Square => {
            let multiple = node.multiple();
            let base = node.clone().with_multiple(1.0);
            *node = Gene::product(vec![base.clone(), base]).with_multiple(multiple);
        }
        MutationKind::RemoveSubtree => return false,
    }
    true
}

/// Genes a mutation may leave behind: arity rules hold and at least one
/// parameter survives.
pub fn is_viable(root: &Gene) -> bool {
    root.is_well_formed() && root.contains_parameter()
}

/// Mutates one uniformly chosen gene of `root`. Gives up after `attempts`
/// rejected edits.
pub fn mutate<R: Rng>(
    root: &Gene,
    catalog: &Catalog,
    parameter_count: usize,
    attempts: usize,
    rng: &mut R,
) -> Option<Gene> {
    if parameter_count == 0 {
        return None;
    }
    let original = root.to_string();
    let paths = root.paths();
    for _ in 0..attempts {
        let path = paths.choose(rng)?;
        let Some(node) = root.get(path) else {
            continue;
        };
        let kinds = applicable(node, path.is_empty(), catalog, parameter_count);
        let Some(kind) = kinds.choose(rng).copied() else {
            continue;
        };
        let mut candidate = root.clone();
        if !apply(&mut candidate, path, kind, catalog, parameter_count, rng) {
            continue;
        }
        if is_viable(&candidate) && candidate.to_string() != original {
            return Some(candidate);
        }
    }
    None
}

/// Applies `depth` successive mutations.
pub fn mutate_deep<R: Rng>(
    root: &Gene,
    depth: usize,
    catalog: &Catalog,
    parameter_count: usize,
    attempts: usize,
    rng: &mut R,
) -> Option<Gene> {
    let mut current = root.clone();
    for _ in 0..depth {
        current = mutate(&current, catalog, parameter_count, attempts, rng)?;
    }
    Some(current)
}

/// Swaps one random non-root subtree between two trees.
pub fn crossover<R: Rng>(first: &Gene, second: &Gene, rng: &mut R) -> Option<(Gene, Gene)> {
    let first_paths: Vec<Vec<usize>> = first.paths().into_iter().filter(|p| !p.is_empty()).collect();
    let second_paths: Vec<Vec<usize>> = second.paths().into_iter().filter(|p| !p.is_empty()).collect();
    let first_path = first_paths.choose(rng)?;
    let second_path = second_paths.choose(rng)?;

    let mut child1 = first.clone();
    let mut child2 = second.clone();
    let from_second = second.get(second_path)?.clone();
    let from_first = first.get(first_path)?.clone();
    child1.replace_at(first_path, from_second)?;
    child2.replace_at(second_path, from_first)?;

    (is_viable(&child1) && is_viable(&child2)).then_some((child1, child2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn catalog() -> Catalog {
        Catalog::from_symbols(&["+", "*", "sqrt"]).unwrap()
    }

    #[test]
    fn test_tournament_prefers_better_fitness() {
        let mut rng = StdRng::seed_from_u64(7);
        let population = vec![
            ("worse", Fitness::sample(0.1, false)),
            ("better", Fitness::sample(0.9, true)),
        ];
        let mut wins = 0;
        for _ in 0..100 {
            if tournament_selection(&population, 4, &mut rng) == Some(&"better") {
                wins += 1;
            }
        }
        assert!(wins > 80);
    }

    #[test]
    fn test_roulette_ignores_nan() {
        let mut rng = StdRng::seed_from_u64(3);
        let population = vec![
            ("nan", Fitness::sample(f64::NAN, false)),
            ("good", Fitness::sample(1.0, true)),
        ];
        for _ in 0..50 {
            assert_eq!(roulette_selection(&population, &mut rng), Some(&"good"));
        }
    }

    #[test]
    fn test_empty_population_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let population: Vec<(u8, Fitness)> = Vec::new();
        assert!(tournament_selection(&population, 3, &mut rng).is_none());
        assert!(roulette_selection(&population, &mut rng).is_none());
    }

    #[test]
    fn test_mutations_stay_viable() {
        let mut rng = StdRng::seed_from_u64(11);
        let catalog = catalog();
        let root: Gene = "((a*b) + sqrt(a))".parse().unwrap();
        for _ in 0..200 {
            if let Some(mutant) = mutate(&root, &catalog, 2, 8, &mut rng) {
                assert!(is_viable(&mutant));
                assert_ne!(mutant.to_string(), root.to_string());
            }
        }
    }

    #[test]
    fn test_mutation_respects_catalog() {
        let mut rng = StdRng::seed_from_u64(5);
        let catalog = Catalog::from_symbols(&["+"]).unwrap();
        let root: Gene = "(a + b)".parse().unwrap();
        for _ in 0..200 {
            if let Some(mutant) = mutate(&root, &catalog, 2, 8, &mut rng) {
                let text = mutant.to_string();
                assert!(!text.contains('*') && !text.contains("sqrt"), "{}", text);
            }
        }
    }

    #[test]
    fn test_crossover_swaps_subtrees() {
        let mut rng = StdRng::seed_from_u64(9);
        let first: Gene = "(a + b)".parse().unwrap();
        let second: Gene = "(a*sqrt(b))".parse().unwrap();
        let (child1, child2) = (0..20)
            .find_map(|_| crossover(&first, &second, &mut rng))
            .unwrap();
        assert_eq!(child1.size() + child2.size(), first.size() + second.size());
    }

    #[test]
    fn test_crossover_needs_subtrees() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!(crossover(&Gene::parameter(0), &"(a + b)".parse().unwrap(), &mut rng).is_none());
    }
}
