#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod style;
pub mod utils;

pub use app::AppState;
pub use config::Config;
pub use error::{GenerationError, StoreError, StyleError, StylegenError};
