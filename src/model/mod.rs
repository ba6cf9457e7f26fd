mod manifest;
mod types;

pub use manifest::{load_desired, parse_manifest};
pub use types::{
    DesiredList, ErrorBody, GenerateRequest, GenerateResponse, ModelOutcome, ModelRef,
    PresentSet, PullRequest, PullResponse, ReconcileEntry, ReconcileReport, TagEntry,
    TagsResponse, VersionResponse,
};
