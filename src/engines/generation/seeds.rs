//! Systematic seed genomes, tried before falling back to random mutation.

use crate::genes::{Catalog, Gene, OperatorKind};

/// Seed roots in escalating order: single parameters, reciprocals and
/// n-ary operators over growing parameter multisets, then functions of
/// single parameters.
pub fn seed_roots(catalog: &Catalog, parameter_count: usize, max_arity: usize) -> impl Iterator<Item = Gene> + Send {
    let single = (0..parameter_count).map(|p| Gene::sum(vec![Gene::parameter(p)]));

    let reciprocals: Vec<Gene> = if catalog.has_operator(OperatorKind::Division) {
        (0..parameter_count)
            .map(|p| Gene::division(Gene::parameter(p)))
            .collect()
    } else {
        Vec::new()
    };

    let operators: Vec<OperatorKind> = catalog.n_ary_operators().collect();
    let combined = (2..=max_arity.max(1)).flat_map(move |arity| {
        let operators = operators.clone();
        multisets(parameter_count, arity).into_iter().flat_map(move |set| {
            operators
                .clone()
                .into_iter()
                .map(move |op| Gene::operator(op, set.iter().map(|&p| Gene::parameter(p)).collect()))
        })
    });

    let functions = catalog.functions().to_vec();
    let wrapped = functions.into_iter().flat_map(move |func| {
        (0..parameter_count).map(move |p| Gene::function(func, Gene::parameter(p)))
    });

    single.chain(reciprocals).chain(combined).chain(wrapped)
}

/// Non-decreasing index sequences of length `size` over `0..count`.
pub fn multisets(count: usize, size: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if count == 0 || size == 0 {
        return out;
    }
    let mut current = vec![0usize; size];
    loop {
        out.push(current.clone());
        // advance the rightmost position that can still grow
        let Some(pos) = (0..size).rev().find(|&i| current[i] + 1 < count) else {
            return out;
        };
        let value = current[pos] + 1;
        for slot in current.iter_mut().skip(pos) {
            *slot = value;
        }
    }
}
