use serde::{Deserialize, Serialize};

pub use book::{Book, BookSummary};

mod book;

/// Raw nearest-neighbor hit, ordered by ascending distance. Not yet rescored.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub book: Book,
    pub distance: f32,
}

/// A hit after reranking. `similarity` is the monotone transform of the raw
/// distance; `score` is the final blended value in [0, 1] that downstream
/// formatting and generation consume.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub book: Book,
    pub distance: f32,
    pub similarity: f32,
    pub score: f32,
}

/// Soft numeric constraints parsed out of the query text. Advisory only:
/// they attenuate scores, they never exclude a candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    pub min_pages: Option<i32>,
    pub max_pages: Option<i32>,
    pub min_rating: Option<f32>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.min_pages.is_none() && self.max_pages.is_none() && self.min_rating.is_none()
    }
}

/// One turn of prior conversation, passed through to the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Detected query mood; shapes the generation prompt, never the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Neutral,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Neutral => "neutral",
        }
    }
}

/// Everything one `recommend` call produces. Built once per request, never
/// persisted. `recommended_books` is always a subset of `retrieved_books`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub query: String,
    pub retrieved: Vec<RankedCandidate>,
    pub retrieved_books: Vec<BookSummary>,
    pub recommended_books: Vec<BookSummary>,
    pub context: String,
    pub answer: String,
    pub raw_model_output: String,
    pub style: String,
    pub mood: Mood,
}

/// Request body for POST /api/recommendations.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default = "default_true")]
    pub use_mood: bool,
    #[serde(default)]
    pub explain: bool,
    #[serde(default)]
    pub second_opinion: bool,
    #[serde(default)]
    pub history: Option<Vec<ChatTurn>>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub indexed_books: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub recommendation_counts: std::collections::HashMap<String, u64>,
}
