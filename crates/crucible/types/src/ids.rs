//! Newtype identifiers for the core entities.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn short(&self) -> &str {
                &self.0[..8.min(self.0.len())]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a generated candidate
    CandidateId
);
define_id!(
    /// Unique identifier for an evolution run
    EvolutionRunId
);
define_id!(
    /// Unique identifier for a population member
    IndividualId
);
define_id!(
    /// Unique identifier for a workflow run
    WorkflowRunId
);
define_id!(
    /// Unique identifier for a project tracked by the store
    ProjectId
);
