use crate::error::{GenerationError, StoreError};
use crate::store::{FieldSet, GenerationRecord, GenerationStore, StoredGeneration};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Writes finished generations, degrading to the legacy column set when the
/// backing schema predates the extended fields.
pub struct PersistenceAdapter {
    store: Arc<dyn GenerationStore>,
    /// Flips to `false` on the first schema mismatch and never back.
    extended_supported: AtomicBool,
}

fn persistence_error(err: &StoreError) -> GenerationError {
    GenerationError::Persistence {
        message: err.to_string(),
    }
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn GenerationStore>) -> Self {
        Self {
            store,
            extended_supported: AtomicBool::new(true),
        }
    }

    pub fn supports_extended_fields(&self) -> bool {
        self.extended_supported.load(Ordering::Relaxed)
    }

    /// Record one outcome. The returned value always carries the full record,
    /// including fields a legacy write could not store.
    pub async fn record(
        &self,
        record: &GenerationRecord,
    ) -> Result<StoredGeneration, GenerationError> {
        if self.supports_extended_fields() {
            match self.store.record(record, FieldSet::Extended).await {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_schema_mismatch() => {
                    tracing::warn!(
                        error = %e,
                        "Generation schema lacks extended columns, using legacy field set"
                    );
                    self.extended_supported.store(false, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to record generation");
                    return Err(persistence_error(&e));
                }
            }
        }

        let mut stored = self
            .store
            .record(record, FieldSet::Legacy)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to record generation with legacy fields");
                persistence_error(&e)
            })?;
        stored.record = record.clone();
        Ok(stored)
    }
}
