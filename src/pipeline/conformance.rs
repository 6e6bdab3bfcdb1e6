use super::dispatch::ModelDispatcher;
use super::extract::{ExtractedArticle, extract_article};
use super::prompt::{AdjustAction, AdjustmentPrompt, PromptComposer};
use super::types::{GenerationOutcome, ValidatedRequest};
use crate::config::GenerationConfig;
use crate::llm::SamplingParams;
use crate::models::ModelSelection;
use crate::utils::text::char_len;
use tokio::time::{Instant, timeout_at};

/// Signed percentage deviation of `actual` from `target`, rounded half-up.
/// A non-positive target yields `0`.
pub fn deviation_percent(actual: usize, target: u32) -> i64 {
    if target == 0 {
        return 0;
    }
    // floor(n / d + 1/2) == floor((2n + d) / 2d), in integers to keep .5 cases exact
    let numerator = 100 * (actual as i128 - i128::from(target));
    let denominator = i128::from(target);
    let rounded = (2 * numerator + denominator).div_euclid(2 * denominator);
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

/// `target * (1 - tolerance) <= actual <= target * (1 + tolerance)`.
#[allow(clippy::cast_precision_loss)]
pub fn in_tolerance(actual: usize, target: u32, tolerance: f64) -> bool {
    let target = f64::from(target);
    let actual = actual as f64;
    actual >= target * (1.0 - tolerance) && actual <= target * (1.0 + tolerance)
}

/// Bounded expand/compress refinement of a generated body.
pub struct ConformanceLoop<'a> {
    pub dispatcher: &'a ModelDispatcher,
    pub composer: &'a PromptComposer,
    pub config: &'a GenerationConfig,
    /// Adjustments are abandoned once this passes.
    pub deadline: Instant,
}

impl ConformanceLoop<'_> {
    /// Refine `initial` until its length is within tolerance or the retry
    /// budget is spent. Failed adjustments keep the last good body; the title
    /// from the initial attempt is always kept.
    pub async fn run(
        &self,
        selection: &ModelSelection,
        request: &ValidatedRequest,
        initial: ExtractedArticle,
        initial_model_id: String,
    ) -> GenerationOutcome {
        let target = request.target_length;
        let tolerance = self.config.tolerance;
        let params = SamplingParams {
            temperature: self.config.adjust_temperature,
            max_tokens: self.config.max_tokens,
        };

        let ExtractedArticle { title, mut article } = initial;
        let mut count = char_len(&article);
        let mut resolved_model_id = initial_model_id;
        let mut warnings = Vec::new();
        let mut adjustments = 0u32;
        let mut attempts = 0u32;

        while !in_tolerance(count, target, tolerance) && attempts < self.config.max_retries {
            if Instant::now() >= self.deadline {
                tracing::warn!(attempt = attempts + 1, "Time budget spent before adjusting");
                warnings.push("Length adjustment stopped: the time budget ran out".into());
                break;
            }
            attempts += 1;
            let action = AdjustAction::for_lengths(count, target);
            tracing::debug!(
                attempt = attempts,
                action = action.as_str(),
                current = count,
                target,
                "Adjusting article length"
            );

            let prompt = AdjustmentPrompt {
                action,
                title: &title,
                body: &article,
                current_chars: count,
                request,
            };
            let messages = match self.composer.compose_adjustment(&prompt) {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(error = %e, "Adjustment prompt could not be rendered");
                    warnings.push("Length adjustment stopped: prompt rendering failed".into());
                    break;
                }
            };

            let call = self.dispatcher.dispatch(selection, &messages, params);
            let reply = match timeout_at(self.deadline, call).await {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, attempt = attempts, "Adjustment call failed");
                    warnings.push("Length adjustment stopped: the model call failed".into());
                    break;
                }
                Err(_) => {
                    tracing::warn!(attempt = attempts, "Adjustment call outran the time budget");
                    warnings.push("Length adjustment stopped: the time budget ran out".into());
                    break;
                }
            };

            let adjusted = match extract_article(&reply.text) {
                Ok(adjusted) => adjusted,
                Err(e) => {
                    tracing::warn!(error = %e, attempt = attempts, "Adjustment reply unparsable");
                    warnings.push("Length adjustment stopped: the reply could not be parsed".into());
                    break;
                }
            };

            if adjusted.article.is_empty() {
                tracing::warn!(attempt = attempts, "Adjustment reply had an empty body");
                warnings.push("Length adjustment stopped: the reply had an empty body".into());
                break;
            }

            article = adjusted.article;
            count = char_len(&article);
            resolved_model_id = reply.resolved_model_id;
            adjustments += 1;
        }

        let within = in_tolerance(count, target, tolerance);
        if !within {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let percent = (tolerance * 100.0).round() as u32;
            warnings.push(format!(
                "Article length {count} is outside ±{percent}% of the target {target}"
            ));
        }

        GenerationOutcome {
            title,
            deviation_percent: deviation_percent(count, target),
            body: article,
            body_char_count: count,
            resolved_model_id,
            adjustments,
            in_tolerance: within,
            warnings,
        }
    }
}
