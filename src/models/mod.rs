pub mod catalog;

pub use catalog::{ModelCatalog, ModelKey, ModelOption, ModelSelection, ProviderKind};
