//! End-to-end generation: validation, access gate, style lookup, references,
//! prompt, dispatch, extraction, length conformance, persistence.

use super::conformance::ConformanceLoop;
use super::dispatch::{ModelDispatcher, ensure_access};
use super::extract::extract_article;
use super::persist::PersistenceAdapter;
use super::prompt::PromptComposer;
use super::references::{ReferenceResolver, ResolvedReferences, parse_reference_sources};
use super::types::{GenerationRequest, GenerationResponse};
use crate::config::{GenerationConfig, ReferenceConfig};
use crate::error::{GenerationError, StyleError};
use crate::llm::SamplingParams;
use crate::store::{
    GenerationRecord, GenerationStore, StyleProfile, StyleRebuilder, StyleSource,
    VerificationStore,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

/// Collaborators the service is wired with.
#[derive(Clone)]
pub struct ServiceParts {
    pub styles: Arc<dyn StyleSource>,
    pub rebuilder: Arc<dyn StyleRebuilder>,
    pub verification: Arc<dyn VerificationStore>,
    pub generations: Arc<dyn GenerationStore>,
    pub dispatcher: Arc<ModelDispatcher>,
}

pub struct GenerationService {
    config: GenerationConfig,
    max_reference_urls: usize,
    styles: Arc<dyn StyleSource>,
    rebuilder: Arc<dyn StyleRebuilder>,
    verification: Arc<dyn VerificationStore>,
    dispatcher: Arc<ModelDispatcher>,
    resolver: ReferenceResolver,
    composer: PromptComposer,
    persistence: PersistenceAdapter,
}

impl GenerationService {
    pub fn new(
        parts: ServiceParts,
        generation: &GenerationConfig,
        references: &ReferenceConfig,
    ) -> Result<Self> {
        Ok(Self {
            config: generation.clone(),
            max_reference_urls: references.max_urls,
            styles: parts.styles,
            rebuilder: parts.rebuilder,
            verification: parts.verification,
            dispatcher: parts.dispatcher,
            resolver: ReferenceResolver::new(references)?,
            composer: PromptComposer::new(generation.tolerance, generation.adjust_body_cap)?,
            persistence: PersistenceAdapter::new(parts.generations),
        })
    }

    pub fn dispatcher(&self) -> &ModelDispatcher {
        &self.dispatcher
    }

    /// Run one generation for `user_id` and persist the result.
    pub async fn generate(
        &self,
        user_id: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.time_budget_secs);
        let request = request.validate()?;
        let parsed_references = request
            .reference_sources
            .as_deref()
            .map(|raw| parse_reference_sources(raw, self.max_reference_urls))
            .unwrap_or_default();
        parsed_references.ensure_valid()?;

        let selection = self.dispatcher.selection(request.model_key)?.clone();
        if selection.invite_required {
            let verified = self
                .verification
                .is_verified(user_id)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Verification lookup failed");
                    GenerationError::Persistence {
                        message: e.to_string(),
                    }
                })?;
            ensure_access(&selection, verified)?;
        }

        tracing::info!(
            user_id,
            model_key = %selection.key,
            target_length = request.target_length,
            references = parsed_references.urls.len(),
            "Generation started"
        );

        let style = self.load_or_rebuild_style(user_id).await?;

        let references = if parsed_references.urls.is_empty() {
            ResolvedReferences::default()
        } else {
            self.resolver.resolve(&parsed_references).await
        };

        let messages = self
            .composer
            .compose(&request, Some(&style), &references.snippets)
            .map_err(|e| {
                tracing::error!(error = %e, "Prompt rendering failed");
                GenerationError::Provider {
                    message: format!("prompt rendering failed: {e}"),
                }
            })?;

        let params = SamplingParams {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let call = self.dispatcher.dispatch(&selection, &messages, params);
        let reply = timeout_at(deadline, call)
            .await
            .map_err(|_| GenerationError::Provider {
                message: format!(
                    "no draft within the {}s time budget",
                    self.config.time_budget_secs
                ),
            })
            .and_then(|reply| reply)
            .inspect_err(|e| tracing::error!(error = %e, "Generation call failed"))?;

        let initial = extract_article(&reply.text)
            .inspect_err(|e| tracing::error!(error = %e, "Generation reply unparsable"))?;

        let outcome = ConformanceLoop {
            dispatcher: &self.dispatcher,
            composer: &self.composer,
            config: &self.config,
            deadline,
        }
        .run(&selection, &request, initial, reply.resolved_model_id)
        .await;

        let record = GenerationRecord {
            user_id: user_id.to_string(),
            model_key: selection.key,
            model_id: outcome.resolved_model_id,
            target_length: request.target_length,
            content_outline: request.content_outline,
            key_points: request.key_points,
            constraint_conditions: request.constraint_conditions,
            author_persona: request.author_persona,
            concrete_cases: request.concrete_cases,
            reference_sources: request.reference_sources,
            include_subheadings: request.include_subheadings,
            title: outcome.title,
            article: outcome.body,
            article_char_count: outcome.body_char_count,
            deviation_percent: outcome.deviation_percent,
        };
        let stored = self.persistence.record(&record).await?;

        tracing::info!(
            user_id,
            id = stored.id.as_str(),
            model_id = stored.record.model_id.as_str(),
            chars = outcome.body_char_count,
            deviation_percent = outcome.deviation_percent,
            adjustments = outcome.adjustments,
            in_tolerance = outcome.in_tolerance,
            "Generation finished"
        );

        Ok(GenerationResponse::from_stored(
            stored,
            references.warnings,
            references.urls_used,
            references.truncated,
            outcome.warnings,
        ))
    }

    /// Stored profile, or a freshly built one when none exists or it is empty.
    async fn load_or_rebuild_style(&self, user_id: &str) -> Result<StyleProfile, GenerationError> {
        let existing = self.styles.get_style(user_id).await.map_err(|e| {
            tracing::error!(error = %e, "Style profile lookup failed");
            GenerationError::Persistence {
                message: e.to_string(),
            }
        })?;

        if let Some(profile) = existing.filter(|p| !p.is_empty()) {
            return Ok(profile);
        }

        tracing::info!(user_id, "No usable style profile, rebuilding");
        self.rebuilder.rebuild(user_id).await.map_err(|e| match e {
            StyleError::NoSourceMaterial => GenerationError::NoStyleProfile(
                "Upload at least one article before generating.".to_string(),
            ),
            StyleError::Analysis(message) => {
                tracing::error!(error = %message, "Style rebuild failed");
                GenerationError::NoStyleProfile(
                    "The style profile could not be built, please try again later.".to_string(),
                )
            }
            StyleError::Store(e) => {
                tracing::error!(error = %e, "Style rebuild storage failure");
                GenerationError::Persistence {
                    message: e.to_string(),
                }
            }
        })
    }
}
