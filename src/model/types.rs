use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

/// A model identifier exactly as the backing service names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRef(String);

impl ModelRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModelRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

pub type DesiredList = Vec<ModelRef>;
pub type PresentSet = HashSet<ModelRef>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    AlreadyPresent,
    Fetched,
    FetchFailed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileEntry {
    pub model: ModelRef,
    #[serde(flatten)]
    pub outcome: ModelOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub entries: Vec<ReconcileEntry>,
    /// False when the inventory query failed and every entry was fetched blind.
    pub inventory_confirmed: bool,
}

impl ReconcileReport {
    pub fn outcome(&self, model: &str) -> Option<&ModelOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.model.as_str() == model)
            .map(|entry| &entry.outcome)
    }

    pub fn fetched(&self) -> impl Iterator<Item = &ModelRef> {
        self.with_outcome(|o| matches!(o, ModelOutcome::Fetched))
    }

    pub fn already_present(&self) -> impl Iterator<Item = &ModelRef> {
        self.with_outcome(|o| matches!(o, ModelOutcome::AlreadyPresent))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ModelRef> {
        self.with_outcome(|o| matches!(o, ModelOutcome::FetchFailed { .. }))
    }

    fn with_outcome<'a>(
        &'a self,
        pred: impl Fn(&ModelOutcome) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ModelRef> + 'a {
        self.entries
            .iter()
            .filter(move |entry| pred(&entry.outcome))
            .map(|entry| &entry.model)
    }
}

#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TagEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct PullResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Nanoseconds spent generating `eval_count` tokens.
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
