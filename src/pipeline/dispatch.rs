use crate::error::GenerationError;
use crate::llm::{ChatMessage, ChatRequest, ProviderRegistry, SamplingParams};
use crate::models::{ModelCatalog, ModelKey, ModelSelection};

/// Reply text plus the concrete model id that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub text: String,
    pub resolved_model_id: String,
}

/// Gated selections require the caller to have passed invite verification.
pub fn ensure_access(
    selection: &ModelSelection,
    invite_verified: bool,
) -> Result<(), GenerationError> {
    if selection.invite_required && !invite_verified {
        return Err(GenerationError::VerificationRequired {
            model_key: selection.key.to_string(),
        });
    }
    Ok(())
}

/// Routes a logical model key to its provider and walks the candidate ids.
pub struct ModelDispatcher {
    catalog: ModelCatalog,
    providers: ProviderRegistry,
}

impl ModelDispatcher {
    pub fn new(catalog: ModelCatalog, providers: ProviderRegistry) -> Self {
        Self { catalog, providers }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn selection(&self, key: ModelKey) -> Result<&ModelSelection, GenerationError> {
        self.catalog
            .get(key)
            .ok_or_else(|| GenerationError::Validation(format!("Unknown model: {key}")))
    }

    /// Try the primary id, then each fallback in order. The first success wins.
    pub async fn dispatch(
        &self,
        selection: &ModelSelection,
        messages: &[ChatMessage],
        params: SamplingParams,
    ) -> Result<DispatchOutcome, GenerationError> {
        let provider =
            self.providers
                .get(selection.provider)
                .ok_or_else(|| GenerationError::Provider {
                    message: format!("no provider registered for {}", selection.provider),
                })?;

        let candidates = selection.candidates();
        let mut failures = Vec::with_capacity(candidates.len());

        for (index, model_id) in candidates.iter().enumerate() {
            let request = ChatRequest::new(model_id, messages, params);
            match provider.complete(&request).await {
                Ok(text) => {
                    if index > 0 {
                        tracing::info!(
                            model_key = %selection.key,
                            model_id,
                            attempt = index + 1,
                            "Fallback model answered"
                        );
                    }
                    return Ok(DispatchOutcome {
                        text,
                        resolved_model_id: (*model_id).to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        model_id,
                        error = %e,
                        "Model call failed"
                    );
                    if index + 1 < candidates.len() {
                        tracing::warn!(model_key = %selection.key, "Switching to fallback model");
                    }
                    failures.push(format!("{model_id}: {e}"));
                }
            }
        }

        Err(GenerationError::Provider {
            message: format!(
                "{} failed on {} candidate(s); last error: {}",
                selection.key,
                candidates.len(),
                failures.last().map_or("none", String::as_str)
            ),
        })
    }
}
