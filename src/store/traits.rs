use super::types::{
    FieldSet, GenerationRecord, GenerationSummary, StoredArticle, StoredGeneration, StyleProfile,
};
use crate::error::{StoreError, StyleError};
use std::future::Future;
use std::pin::Pin;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Read and write access to persisted style profiles.
pub trait StyleSource: Send + Sync {
    fn get_style<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, Option<StyleProfile>>;

    fn save_style<'a>(&'a self, user_id: &'a str, profile: &'a StyleProfile)
    -> StoreFuture<'a, ()>;
}

/// Derives a fresh style profile from a user's uploaded samples.
pub trait StyleRebuilder: Send + Sync {
    fn rebuild<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<StyleProfile, StyleError>> + Send + 'a>>;
}

/// Invite verification state for gated models.
pub trait VerificationStore: Send + Sync {
    fn is_verified<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, bool>;

    fn mark_verified<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, ()>;
}

/// Generation history.
///
/// `record` with [`FieldSet::Extended`] must fail with
/// [`StoreError::SchemaMismatch`] when the backing schema predates the
/// extended columns, so callers can retry with [`FieldSet::Legacy`].
pub trait GenerationStore: Send + Sync {
    fn record<'a>(
        &'a self,
        record: &'a GenerationRecord,
        fields: FieldSet,
    ) -> StoreFuture<'a, StoredGeneration>;

    /// Newest first.
    fn list<'a>(&'a self, user_id: &'a str, limit: u32) -> StoreFuture<'a, Vec<GenerationSummary>>;

    /// Returns `false` when no row with that id belongs to the user.
    fn delete<'a>(&'a self, user_id: &'a str, id: &'a str) -> StoreFuture<'a, bool>;
}

/// Uploaded writing samples.
pub trait ArticleStore: Send + Sync {
    fn add_article<'a>(
        &'a self,
        user_id: &'a str,
        filename: &'a str,
        text: &'a str,
    ) -> StoreFuture<'a, StoredArticle>;

    /// Newest first.
    fn list_articles<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, Vec<StoredArticle>>;

    /// Remove every article and the derived style profile. Returns removed article count.
    fn clear_library<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, u64>;
}
