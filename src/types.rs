use crate::engines::evaluation::Fitness;
use crate::engines::generation::Genome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An improved best genome for one problem, as posted on the public stream.
#[derive(Debug, Clone)]
pub struct TopGenome {
    pub problem_id: String,
    pub genome: Arc<Genome>,
    pub fitness: Fitness,
    /// Tier that posted it.
    pub tier: usize,
}

impl fmt::Display for TopGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] tier {}: {} ({})",
            self.problem_id, self.tier, self.genome, self.fitness
        )
    }
}

/// Lifecycle of a pipeline run. Transitions only move forward:
/// `Idle -> Running -> (Converged | Faulted) -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Running,
    Converged,
    Faulted,
    Completed,
}

impl PipelineState {
    fn rank(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Running => 1,
            PipelineState::Converged | PipelineState::Faulted => 2,
            PipelineState::Completed => 3,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(self) -> bool {
        self == PipelineState::Completed
    }
}

/// A genome that passed convergence validation for one problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChampionSummary {
    pub problem_id: String,
    pub genome: String,
    pub reduced: String,
    pub average: f64,
    pub samples: u64,
}

/// Outcome of a converged pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub champions: Vec<ChampionSummary>,
    pub rounds: u64,
    pub registered: usize,
    pub generated: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn champion(&self, problem_id: &str) -> Option<&ChampionSummary> {
        self.champions.iter().find(|c| c.problem_id == problem_id)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions_are_one_way() {
        use PipelineState::*;
        assert!(Idle.can_advance_to(Running));
        assert!(Running.can_advance_to(Faulted));
        assert!(Converged.can_advance_to(Completed));
        assert!(!Converged.can_advance_to(Faulted));
        assert!(!Completed.can_advance_to(Running));
        assert!(!Running.can_advance_to(Idle));
    }

    #[test]
    fn test_report_serializes() {
        let now = Utc::now();
        let report = PipelineReport {
            champions: vec![ChampionSummary {
                problem_id: "hypot".to_string(),
                genome: "sqrt((a*a) + (b*b))".to_string(),
                reduced: "sqrt((a*a) + (b*b))".to_string(),
                average: 1.0,
                samples: 5,
            }],
            rounds: 12,
            registered: 300,
            generated: 250,
            started_at: now,
            completed_at: now,
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: PipelineReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.champion("hypot").map(|c| c.samples), Some(5));
        assert!(back.champion("other").is_none());
    }
}
