use crate::config::Config;
use crate::llm::ProviderRegistry;
use crate::models::{ModelCatalog, ModelKey, ProviderKind};
use crate::pipeline::{GenerationService, ModelDispatcher, ServiceParts};
use crate::store::{
    ArticleStore, GenerationStore, SqliteStore, StyleRebuilder, StyleSource, VerificationStore,
};
use crate::style::StyleAnalyzer;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything a request handler or CLI command needs, wired once from config.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    pub catalog: Arc<ModelCatalog>,
    pub styles: Arc<dyn StyleSource>,
    pub rebuilder: Arc<dyn StyleRebuilder>,
    pub verification: Arc<dyn VerificationStore>,
    pub generations: Arc<dyn GenerationStore>,
    pub articles: Arc<dyn ArticleStore>,
    pub invite_code: Arc<str>,
}

impl AppState {
    /// Open the configured database and build providers from config.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.database_path();
        let store = SqliteStore::open(&db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let providers = ProviderRegistry::from_config(&config.providers);
        Self::assemble(config, store, providers)
    }

    /// Wire the pipeline over an already-open store and provider set.
    pub fn assemble(config: &Config, store: SqliteStore, providers: ProviderRegistry) -> Result<Self> {
        let catalog = config.model_catalog();
        let builtin = providers
            .get(ProviderKind::Deepseek)
            .context("Built-in provider is not registered")?;
        let analysis_model = catalog
            .get(ModelKey::Deepseek)
            .map_or_else(
                || config.providers.deepseek.model.clone(),
                |s| s.primary_model_id.clone(),
            );

        let store = Arc::new(store);
        let rebuilder: Arc<dyn StyleRebuilder> = Arc::new(StyleAnalyzer::new(
            store.clone(),
            store.clone(),
            builtin,
            analysis_model,
        ));
        let dispatcher = Arc::new(ModelDispatcher::new(catalog.clone(), providers));

        let service = GenerationService::new(
            ServiceParts {
                styles: store.clone(),
                rebuilder: rebuilder.clone(),
                verification: store.clone(),
                generations: store.clone(),
                dispatcher,
            },
            &config.generation,
            &config.references,
        )?;

        Ok(Self {
            service: Arc::new(service),
            catalog: Arc::new(catalog),
            styles: store.clone(),
            rebuilder,
            verification: store.clone(),
            generations: store.clone(),
            articles: store,
            invite_code: Arc::from(config.invite_code.trim()),
        })
    }
}
