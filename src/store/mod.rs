pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteStore;
pub use traits::{
    ArticleStore, GenerationStore, StoreFuture, StyleRebuilder, StyleSource, VerificationStore,
};
pub use types::{
    FieldSet, GenerationRecord, GenerationSummary, StoredArticle, StoredGeneration, StyleProfile,
};
