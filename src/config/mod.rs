pub mod schema;

pub use schema::{
    Config, DeepseekConfig, GatewayConfig, GenerationConfig, OpenRouterConfig, ProvidersConfig,
    ReferenceConfig,
};
