//! Article generation pipeline.

pub mod conformance;
pub mod dispatch;
pub mod extract;
pub mod persist;
pub mod prompt;
pub mod references;
pub mod service;
pub mod types;

pub use conformance::{ConformanceLoop, deviation_percent, in_tolerance};
pub use dispatch::{DispatchOutcome, ModelDispatcher, ensure_access};
pub use extract::{ExtractedArticle, extract_article, find_json_object};
pub use persist::PersistenceAdapter;
pub use prompt::{AdjustAction, PromptComposer};
pub use references::{
    ParsedReferences, ReferenceResolver, ReferenceSnippet, ResolvedReferences,
    parse_reference_sources,
};
pub use service::{GenerationService, ServiceParts};
pub use types::{GenerationOutcome, GenerationRequest, GenerationResponse, ValidatedRequest};
