pub mod compatible;
pub mod factory;
pub mod scrub;
pub mod traits;
pub mod types;

pub use compatible::OpenAiCompatibleProvider;
pub use factory::{ProviderRegistry, create_provider, resolve_api_key};
pub use scrub::sanitize_api_error;
pub use traits::ChatProvider;
pub use types::{ChatMessage, ChatRequest, ChatRole, SamplingParams};
