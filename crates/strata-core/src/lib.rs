pub mod analyzer;
pub mod classify;
pub mod complexity;
pub mod config;
pub mod error;
pub mod facts;
pub mod graph;
pub mod oop;
pub mod patterns;
pub mod pipeline;
pub mod ranking;
pub mod scoring;
pub mod types;

pub use analyzer::{ParsedFile, StructuralExtractor};
pub use complexity::{ComplexityAnalyzer, ComplexityInsight, ComplexityReport};
pub use config::Config;
pub use error::ExtractionError;
pub use facts::StructuralFacts;
pub use graph::InheritanceGraph;
pub use pipeline::{AnalysisPipeline, ProjectAnalysis};
pub use ranking::{rank, RankedEntry, Ranking};
pub use scoring::{analyze_project, ProjectScore};
pub use types::*;
