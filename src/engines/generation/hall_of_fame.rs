use crate::engines::evaluation::Fitness;
use crate::engines::generation::genome::Genome;

use std::collections::HashMap;
use std::sync::Arc;

/// Averages closer than this count as unchanged.
pub const IMPROVEMENT_EPSILON: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct EliteGenome {
    pub genome: Arc<Genome>,
    pub fitness: Fitness,
}

/// Best genomes seen so far, kept per problem and ordered best first.
pub struct HallOfFame {
    per_problem: HashMap<String, Vec<EliteGenome>>,
    last_posted: HashMap<String, EliteGenome>,
    max_size: usize,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            per_problem: HashMap::new(),
            last_posted: HashMap::new(),
            max_size: max_size.max(1),
        }
    }

    /// Records a scored genome. Returns true when the problem's best entry
    /// changed materially: first post, a different genome on top, or the
    /// top average moving by more than [`IMPROVEMENT_EPSILON`].
    pub fn offer(&mut self, problem_id: &str, genome: &Arc<Genome>, fitness: &Fitness) -> bool {
        let elites = self.per_problem.entry(problem_id.to_string()).or_default();
        match elites.iter_mut().find(|e| e.genome.hash() == genome.hash()) {
            Some(existing) => existing.fitness = fitness.clone(),
            None => elites.push(EliteGenome {
                genome: Arc::clone(genome),
                fitness: fitness.clone(),
            }),
        }
        elites.sort_by(|a, b| b.fitness.compare(&a.fitness));
        elites.truncate(self.max_size);

        let Some(best) = elites.first().cloned() else {
            return false;
        };
        let changed = match self.last_posted.get(problem_id) {
            None => true,
            Some(previous) => {
                previous.genome.hash() != best.genome.hash()
                    || moved(previous.fitness.average(), best.fitness.average())
            }
        };
        if changed {
            self.last_posted.insert(problem_id.to_string(), best);
        }
        changed
    }

    pub fn best(&self, problem_id: &str) -> Option<&EliteGenome> {
        self.per_problem.get(problem_id).and_then(|elites| elites.first())
    }

    /// Get top N genomes for one problem
    pub fn get_top_n(&self, problem_id: &str, n: usize) -> &[EliteGenome] {
        match self.per_problem.get(problem_id) {
            Some(elites) => &elites[..n.min(elites.len())],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.per_problem.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn moved(previous: f64, current: f64) -> bool {
    match (previous.is_nan(), current.is_nan()) {
        (true, true) => false,
        (false, false) => (previous - current).abs() > IMPROVEMENT_EPSILON,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genome(text: &str) -> Arc<Genome> {
        Arc::new(Genome::new(text.parse().unwrap()))
    }

    #[test]
    fn test_first_offer_posts() {
        let mut hof = HallOfFame::new(3);
        assert!(hof.offer("p", &genome("(a)"), &Fitness::sample(0.5, false)));
        assert_eq!(hof.best("p").map(|e| e.genome.hash()), Some("(a)"));
    }

    #[test]
    fn test_unchanged_best_is_not_reposted() {
        let mut hof = HallOfFame::new(3);
        let best = genome("(a + b)");
        assert!(hof.offer("p", &best, &Fitness::sample(0.9, false)));
        assert!(!hof.offer("p", &best, &Fitness::sample(0.9, false)));
        assert!(!hof.offer("p", &genome("(a)"), &Fitness::sample(0.2, false)));
        assert!(hof.offer("p", &genome("(b)"), &Fitness::sample(0.95, false)));
    }

    #[test]
    fn test_trims_to_max_size() {
        let mut hof = HallOfFame::new(2);
        hof.offer("p", &genome("(a)"), &Fitness::sample(0.1, false));
        hof.offer("p", &genome("(b)"), &Fitness::sample(0.2, false));
        hof.offer("p", &genome("(a + b)"), &Fitness::sample(0.3, false));
        let top: Vec<&str> = hof.get_top_n("p", 5).iter().map(|e| e.genome.hash()).collect();
        assert_eq!(top, vec!["(a + b)", "(b)"]);
        assert!(hof.get_top_n("missing", 5).is_empty());
    }
}
