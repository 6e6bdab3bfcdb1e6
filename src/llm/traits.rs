use super::types::ChatRequest;
use std::future::Future;
use std::pin::Pin;

/// A text-generation backend speaking chat completions.
///
/// One implementation exists per provider kind; the dispatcher selects an
/// implementation from configuration and walks its candidate model ids.
pub trait ChatProvider: Send + Sync {
    /// Provider identifier (e.g. "deepseek", "openrouter").
    fn name(&self) -> &str;

    /// Run one completion and return the assistant text.
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}
