pub mod huggingface_embedder;

pub use huggingface_embedder::{EmbeddingPort, HuggingFaceEmbedder};
