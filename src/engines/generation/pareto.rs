//! Pareto utilities for ranking genomes across several problems.
//! NSGA-II style non-dominated sorting and crowding distance; every objective
//! is a fitness average and is maximised.

/// A candidate and its objective values, one per problem.
#[derive(Debug, Clone)]
pub struct MultiObjectiveIndividual<T> {
    pub data: T,
    pub objectives: Vec<f64>,
    pub rank: usize,            // 0 = non-dominated front
    pub crowding_distance: f64,
}

impl<T> MultiObjectiveIndividual<T> {
    pub fn new(data: T, objectives: Vec<f64>) -> Self {
        Self {
            data,
            objectives,
            rank: 0,
            crowding_distance: 0.0,
        }
    }
}

/// NaN ranks below every number.
fn score(value: f64) -> f64 {
    if value.is_nan() {
        f64::NEG_INFINITY
    } else {
        value
    }
}

/// A dominates B when it is no worse in every objective and better in one.
pub fn dominates(a_objectives: &[f64], b_objectives: &[f64]) -> bool {
    if a_objectives.len() != b_objectives.len() {
        return false;
    }

    let mut at_least_one_better = false;
    for (&a, &b) in a_objectives.iter().zip(b_objectives) {
        let (a, b) = (score(a), score(b));
        if b > a {
            return false;
        }
        if a > b {
            at_least_one_better = true;
        }
    }
    at_least_one_better
}

/// Groups individual indices by front, best front first, and records each
/// individual's rank.
pub fn fast_non_dominated_sort<T>(individuals: &mut [MultiObjectiveIndividual<T>]) -> Vec<Vec<usize>> {
    let n = individuals.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated_solutions: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut first_front = Vec::new();

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&individuals[i].objectives, &individuals[j].objectives) {
                dominated_solutions[i].push(j);
            } else if dominates(&individuals[j].objectives, &individuals[i].objectives) {
                domination_count[i] += 1;
            }
        }
        if domination_count[i] == 0 {
            individuals[i].rank = 0;
            first_front.push(i);
        }
    }

    let mut fronts = vec![first_front];
    let mut front_index = 0;
    while front_index < fronts.len() && !fronts[front_index].is_empty() {
        let mut next_front = Vec::new();
        for &i in &fronts[front_index] {
            for &j in &dominated_solutions[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    individuals[j].rank = front_index + 1;
                    next_front.push(j);
                }
            }
        }
        if !next_front.is_empty() {
            fronts.push(next_front);
        }
        front_index += 1;
    }
    fronts
}

/// Crowding distance within one front; boundary points are infinitely far.
pub fn calculate_crowding_distance<T>(
    individuals: &mut [MultiObjectiveIndividual<T>],
    front_indices: &[usize],
) {
    let front_size = front_indices.len();
    if front_size <= 2 {
        for &idx in front_indices {
            individuals[idx].crowding_distance = f64::INFINITY;
        }
        return;
    }

    for &idx in front_indices {
        individuals[idx].crowding_distance = 0.0;
    }

    let num_objectives = individuals[front_indices[0]].objectives.len();
    for obj in 0..num_objectives {
        let mut sorted: Vec<usize> = front_indices.to_vec();
        sorted.sort_by(|&a, &b| {
            score(individuals[a].objectives[obj]).total_cmp(&score(individuals[b].objectives[obj]))
        });

        individuals[sorted[0]].crowding_distance = f64::INFINITY;
        individuals[sorted[front_size - 1]].crowding_distance = f64::INFINITY;

        let min_val = score(individuals[sorted[0]].objectives[obj]);
        let max_val = score(individuals[sorted[front_size - 1]].objectives[obj]);
        let range = max_val - min_val;
        if !range.is_finite() || range.abs() < 1e-10 {
            continue;
        }

        for i in 1..(front_size - 1) {
            let prev_val = score(individuals[sorted[i - 1]].objectives[obj]);
            let next_val = score(individuals[sorted[i + 1]].objectives[obj]);
            individuals[sorted[i]].crowding_distance += (next_val - prev_val) / range;
        }
    }
}

/// Indices of the non-dominated rows of `objectives`, most isolated first.
pub fn pareto_front(objectives: &[Vec<f64>]) -> Vec<usize> {
    let mut individuals: Vec<MultiObjectiveIndividual<usize>> = objectives
        .iter()
        .enumerate()
        .map(|(i, values)| MultiObjectiveIndividual::new(i, values.clone()))
        .collect();
    let fronts = fast_non_dominated_sort(&mut individuals);
    let Some(first) = fronts.first() else {
        return Vec::new();
    };
    calculate_crowding_distance(&mut individuals, first);
    let mut front = first.clone();
    front.sort_by(|&a, &b| {
        individuals[b]
            .crowding_distance
            .total_cmp(&individuals[a].crowding_distance)
    });
    front.into_iter().map(|i| individuals[i].data).collect()
}
