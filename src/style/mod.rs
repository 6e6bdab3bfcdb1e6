pub mod analyzer;

pub use analyzer::{StyleAnalyzer, combine_samples, parse_analysis};
