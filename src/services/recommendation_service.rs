use crate::error::{ApiError, Result};
use crate::models::{BookSummary, Mood, PipelineResult, RankedCandidate};
use crate::services::pipeline::{RecommendOptions, RecommendationPipeline};
use crate::services::retriever::{Retriever, VectorIndexProvider};
use chrono::Utc;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const FALLBACK_TOP_K: usize = 5;

pub const TIMEOUT_FALLBACK_MESSAGE: &str =
    "The language model took too long to respond, so I'm showing the closest matches \
     retrieved directly from the catalog.";

pub const FORMAT_FALLBACK_MESSAGE: &str =
    "I had trouble interpreting the model's answer this time. Here are candidate books \
     retrieved directly from the catalog.";

/// High-level facade the HTTP handlers talk to.
///
/// Holds the long-lived singletons (retriever over the index, pipeline over
/// the generator), absorbs generation failures into a catalog-only fallback,
/// and keeps lightweight per-title recommendation counts for analytics.
pub struct RecommendationService {
    retriever: Arc<Retriever>,
    pipeline: RecommendationPipeline,
    recommend_counts: Mutex<HashMap<String, u64>>,
    interaction_log_dir: Option<PathBuf>,
}

impl RecommendationService {
    pub fn new(
        retriever: Arc<Retriever>,
        pipeline: RecommendationPipeline,
        interaction_log_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            retriever,
            pipeline,
            recommend_counts: Mutex::new(HashMap::new()),
            interaction_log_dir,
        }
    }

    /// Main entry point. Generation failures never escape: a timed-out or
    /// undecodable backend answer degrades to the raw retrieved list with a
    /// templated message. Only index/embedding unavailability propagates.
    pub async fn recommend(&self, query: &str, options: &RecommendOptions) -> Result<PipelineResult> {
        let result = match self.pipeline.run(query, options).await {
            Ok(result) => result,
            Err(ApiError::GenerationTimeout) => {
                warn!("Generation timed out; serving catalog-only fallback");
                self.fallback_result(query, options, TIMEOUT_FALLBACK_MESSAGE)
                    .await
            }
            Err(ApiError::GenerationFormat(reason)) => {
                warn!(
                    "Generation output unusable ({}); serving catalog-only fallback",
                    reason
                );
                self.fallback_result(query, options, FORMAT_FALLBACK_MESSAGE)
                    .await
            }
            Err(e) => return Err(e),
        };

        self.update_recommend_counts(&result.recommended_books);
        self.log_interaction(&result);

        Ok(result)
    }

    /// Catalog-only answer used when the generator fails: the reranked
    /// retrieval results stand in for a generated recommendation, and
    /// `recommended_books` stays empty because nothing was verified.
    async fn fallback_result(
        &self,
        query: &str,
        options: &RecommendOptions,
        message: &str,
    ) -> PipelineResult {
        let candidates = self.safe_retrieval(query, FALLBACK_TOP_K).await;
        let retrieved_books: Vec<BookSummary> =
            candidates.iter().map(|c| BookSummary::from(&c.book)).collect();

        PipelineResult {
            query: query.to_string(),
            retrieved: candidates,
            retrieved_books,
            recommended_books: Vec::new(),
            context: String::new(),
            answer: message.to_string(),
            raw_model_output: String::new(),
            style: options.style.clone().unwrap_or_else(|| "default".to_string()),
            mood: Mood::Neutral,
        }
    }

    async fn safe_retrieval(&self, query: &str, top_k: usize) -> Vec<RankedCandidate> {
        match self.retriever.retrieve(query, top_k, true).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Fallback retrieval also failed: {}", e);
                Vec::new()
            }
        }
    }

    fn update_recommend_counts(&self, books: &[BookSummary]) {
        if books.is_empty() {
            return;
        }
        if let Ok(mut counts) = self.recommend_counts.lock() {
            for book in books {
                *counts.entry(book.title.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn recommendation_stats(&self) -> HashMap<String, u64> {
        self.recommend_counts
            .lock()
            .map(|counts| counts.clone())
            .unwrap_or_default()
    }

    /// All catalog titles, in index order. Used by the analytics surface.
    pub fn all_titles(&self) -> Vec<String> {
        match self.retriever.vector_index().read() {
            Ok(index) => index
                .all_metadata()
                .iter()
                .filter_map(|book| book.title.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn indexed_books(&self) -> usize {
        self.retriever
            .vector_index()
            .read()
            .map(|index| index.len())
            .unwrap_or(0)
    }

    /// Append one interaction record to the JSONL log. Deliberately
    /// defensive: logging must never break a request.
    fn log_interaction(&self, result: &PipelineResult) {
        let Some(dir) = &self.interaction_log_dir else {
            return;
        };

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "query": result.query,
            "retrieved_titles": result
                .retrieved_books
                .iter()
                .map(|b| b.title.clone())
                .collect::<Vec<_>>(),
            "top_scores": result
                .retrieved
                .iter()
                .take(5)
                .map(|c| c.score)
                .collect::<Vec<_>>(),
            "answer": result.answer,
            "recommended_titles": result
                .recommended_books
                .iter()
                .map(|b| b.title.clone())
                .collect::<Vec<_>>(),
        });

        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(dir)?;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("results.jsonl"))?;
            writeln!(file, "{}", entry)?;
            Ok(())
        };

        if let Err(e) = write() {
            warn!("Failed to append interaction log: {}", e);
        } else {
            info!("Logged interaction for query '{}'", result.query);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VectorIndex;
    use crate::ml::EmbeddingPort;
    use crate::models::Book;
    use crate::services::generator::GenerationPort;
    use crate::services::keywords::KeywordTables;
    use async_trait::async_trait;
    use std::sync::RwLock;

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingPort for StubEmbedder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dim(&self) -> usize {
            2
        }
    }

    enum Script {
        Answer(String),
        Timeout,
        Garbled,
    }

    struct ScriptedGenerator(Script);

    #[async_trait]
    impl GenerationPort for ScriptedGenerator {
        async fn generate(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _temperature: f32,
            _max_tokens: Option<u32>,
        ) -> Result<String> {
            match &self.0 {
                Script::Answer(text) => Ok(text.clone()),
                Script::Timeout => Err(ApiError::GenerationTimeout),
                Script::Garbled => Err(ApiError::GenerationFormat("bad payload".to_string())),
            }
        }
    }

    fn book(title: &str) -> Book {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "author": "A. Author",
            "genres": "Fantasy",
            "rating": 4.0,
            "description": "a story"
        }))
        .unwrap()
    }

    fn service_with(titles: &[&str], script: Script) -> RecommendationService {
        let mut index = VectorIndex::new(2);
        let vectors: Vec<Vec<f32>> = (0..titles.len())
            .map(|i| {
                let t = i as f32 * 0.1;
                vec![1.0 - t, t]
            })
            .collect();
        index
            .add(&vectors, titles.iter().map(|t| book(t)).collect())
            .unwrap();

        let retriever = Arc::new(Retriever::new(
            Arc::new(StubEmbedder),
            Arc::new(RwLock::new(index)),
            KeywordTables::default(),
        ));
        let pipeline = RecommendationPipeline::new(
            retriever.clone(),
            Arc::new(ScriptedGenerator(script)),
            None,
        );
        RecommendationService::new(retriever, pipeline, None)
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_catalog_matches() {
        let service = service_with(&["The Hobbit", "Piranesi"], Script::Timeout);

        let result = service
            .recommend("an adventure", &RecommendOptions::default())
            .await
            .unwrap();

        assert!(result.answer.contains("closest matches"));
        assert!(result.recommended_books.is_empty());
        assert!(!result.retrieved_books.is_empty());
    }

    #[tokio::test]
    async fn test_format_error_falls_back_with_distinct_message() {
        let service = service_with(&["The Hobbit"], Script::Garbled);

        let result = service
            .recommend("an adventure", &RecommendOptions::default())
            .await
            .unwrap();

        assert_eq!(result.answer, FORMAT_FALLBACK_MESSAGE);
        assert!(result.recommended_books.is_empty());
    }

    #[tokio::test]
    async fn test_recommend_counts_accumulate() {
        let service = service_with(
            &["The Hobbit"],
            Script::Answer("- **The Hobbit**: a classic.".to_string()),
        );

        for _ in 0..3 {
            service
                .recommend("an adventure", &RecommendOptions::default())
                .await
                .unwrap();
        }

        let stats = service.recommendation_stats();
        assert_eq!(stats.get("The Hobbit"), Some(&3));
    }

    #[tokio::test]
    async fn test_all_titles_lists_catalog() {
        let service = service_with(
            &["The Hobbit", "Piranesi"],
            Script::Answer("ok".to_string()),
        );
        assert_eq!(service.all_titles(), vec!["The Hobbit", "Piranesi"]);
        assert_eq!(service.indexed_books(), 2);
    }

    #[tokio::test]
    async fn test_interaction_log_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new(2);
        index.add(&[vec![1.0, 0.0]], vec![book("The Hobbit")]).unwrap();

        let retriever = Arc::new(Retriever::new(
            Arc::new(StubEmbedder),
            Arc::new(RwLock::new(index)),
            KeywordTables::default(),
        ));
        let pipeline = RecommendationPipeline::new(
            retriever.clone(),
            Arc::new(ScriptedGenerator(Script::Answer(
                "- **The Hobbit**".to_string(),
            ))),
            None,
        );
        let service = RecommendationService::new(
            retriever,
            pipeline,
            Some(dir.path().to_path_buf()),
        );

        service
            .recommend("an adventure", &RecommendOptions::default())
            .await
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join("results.jsonl")).unwrap();
        let line: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(line["query"], "an adventure");
        assert_eq!(line["recommended_titles"][0], "The Hobbit");
    }
}
