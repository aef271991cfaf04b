pub mod filters;
pub mod generator;
pub mod keywords;
pub mod metrics;
pub mod mood;
pub mod pipeline;
pub mod prompts;
pub mod recommendation_service;
pub mod retriever;

// Re-export public types
pub use generator::{GenerationPort, OllamaGenerator};
pub use keywords::KeywordTables;
pub use pipeline::{RecommendOptions, RecommendationPipeline};
pub use recommendation_service::RecommendationService;
pub use retriever::{Retriever, VectorIndexProvider};
