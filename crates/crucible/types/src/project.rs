//! Project records as accepted by the external store
//!
//! The store itself is an external collaborator; these types describe
//! the status transitions and fields it accepts.

use crate::ids::{CandidateId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-visible lifecycle of a generation project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProjectStatus {
    #[default]
    Pending,
    Generating,
    Testing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A project as held by the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    pub requirements_text: String,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_candidate: Option<CandidateId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>, requirements_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::generate(),
            name: name.into(),
            requirements_text: requirements_text.into(),
            status: ProjectStatus::Pending,
            result: None,
            quality_score: None,
            error_message: None,
            best_candidate: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, stamping `updated_at`.
    pub fn apply(&mut self, update: ProjectUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        if let Some(score) = update.quality_score {
            self.quality_score = Some(score);
        }
        if let Some(message) = update.error_message {
            self.error_message = Some(message);
        }
        if let Some(candidate) = update.best_candidate {
            self.best_candidate = Some(candidate);
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update accepted by `ProjectStore::update`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_candidate: Option<CandidateId>,
}

impl ProjectUpdate {
    pub fn status(status: ProjectStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_best_candidate(mut self, candidate: CandidateId) -> Self {
        self.best_candidate = Some(candidate);
        self
    }
}
