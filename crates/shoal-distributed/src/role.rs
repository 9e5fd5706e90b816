//! What a rank does at the edges of a run.
//!
//! The role is picked once, when the group starts. Only scatter and gather
//! look at it; every step in between is identical on all ranks.

use crate::coordinator::Coordinator;
use crate::types::*;
use shoal_core::types::Agent;

#[derive(Debug, Clone)]
pub enum Role {
    /// Rank 0: seeds, scatters, gathers and writes output.
    Coordinator(Coordinator),
    /// Every other rank: receives a slice and sends it back.
    Worker,
}

impl Role {
    /// Pick the role for `rank`.
    ///
    /// The coordinator must bring the population; workers must not.
    pub fn select(rank: WorkerId, population: Option<Vec<Agent>>) -> DistributedResult<Self> {
        match (rank.is_coordinator(), population) {
            (true, Some(population)) => Ok(Role::Coordinator(Coordinator::new(population))),
            (true, None) => Err(DistributedError::Protocol {
                op: CollectiveOp::Scatter,
                reason: "coordinator started without a population".to_string(),
            }),
            (false, None) => Ok(Role::Worker),
            (false, Some(_)) => Err(DistributedError::Protocol {
                op: CollectiveOp::Scatter,
                reason: format!("{} started with a population", rank),
            }),
        }
    }

    pub fn is_coordinator(&self) -> bool {
        matches!(self, Role::Coordinator(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Coordinator(_) => "coordinator",
            Role::Worker => "worker",
        }
    }

    pub fn coordinator(&self) -> Option<&Coordinator> {
        match self {
            Role::Coordinator(c) => Some(c),
            Role::Worker => None,
        }
    }

    pub fn into_coordinator(self) -> Option<Coordinator> {
        match self {
            Role::Coordinator(c) => Some(c),
            Role::Worker => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        let coordinator = Role::select(WorkerId::COORDINATOR, Some(Vec::new())).unwrap();
        assert!(coordinator.is_coordinator());
        assert_eq!(coordinator.to_string(), "coordinator");
        assert!(coordinator.into_coordinator().is_some());

        let worker = Role::select(WorkerId::new(2), None).unwrap();
        assert!(!worker.is_coordinator());
        assert!(worker.coordinator().is_none());
    }

    #[test]
    fn test_mismatched_population_rejected() {
        assert!(Role::select(WorkerId::COORDINATOR, None).is_err());
        assert!(Role::select(WorkerId::new(1), Some(Vec::new())).is_err());
    }
}
