use crate::error::{ApiError, Result};
use crate::index::VectorIndex;
use crate::ml::EmbeddingPort;
use crate::models::{RankedCandidate, SearchHit};
use crate::services::filters::parse_filters;
use crate::services::keywords::KeywordTables;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

// Weights of the blended ranking score. They sum to 1.0 so the score stays
// in [0, 1] before penalties.
const SIMILARITY_WEIGHT: f32 = 0.60;
const RATING_WEIGHT: f32 = 0.15;
const GENRE_WEIGHT: f32 = 0.10;
const THEME_WEIGHT: f32 = 0.10;
const TONE_WEIGHT: f32 = 0.05;

// Soft filters attenuate, they never exclude.
const FILTER_PENALTY: f32 = 0.6;
const TONE_MISMATCH_PENALTY: f32 = 0.8;

const THEME_MATCH_CEILING: f32 = 3.0;
const TONE_MATCH_CEILING: f32 = 2.0;

/// Exposes the retriever's underlying vector index so the facade can serve
/// catalog-wide views (titles, metadata) without a second handle.
pub trait VectorIndexProvider {
    fn vector_index(&self) -> &Arc<RwLock<VectorIndex>>;
}

/// Embedding + nearest-neighbor search + multi-signal reranking behind a
/// single `retrieve` call.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingPort>,
    index: Arc<RwLock<VectorIndex>>,
    keywords: KeywordTables,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingPort>,
        index: Arc<RwLock<VectorIndex>>,
        keywords: KeywordTables,
    ) -> Self {
        Self {
            embedder,
            index,
            keywords,
        }
    }

    /// Retrieve the `k` nearest catalog entries for `query`, reranked by the
    /// blended score unless `rerank` is off (then index order is kept and
    /// `score == similarity`).
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        rerank: bool,
    ) -> Result<Vec<RankedCandidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.encode(query).await?;
        if query_vec.is_empty() {
            return Ok(Vec::new());
        }

        let hits = {
            let index = self
                .index
                .read()
                .map_err(|_| ApiError::IndexUnavailable("index lock poisoned".to_string()))?;
            index.search(&query_vec, k)?
        };

        debug!("Vector search returned {} hits for '{}'", hits.len(), query);

        let candidates = if rerank {
            self.rerank(query, hits)
        } else {
            hits.into_iter()
                .map(|hit| {
                    let similarity = similarity_from_distance(hit.distance);
                    RankedCandidate {
                        book: hit.book,
                        distance: hit.distance,
                        similarity,
                        score: similarity,
                    }
                })
                .collect()
        };

        info!(
            "Returning {} candidates for '{}'. Top: {:?}",
            candidates.len(),
            query,
            candidates.first().map(|c| c.book.display_title())
        );

        Ok(candidates)
    }

    /// Blend semantic similarity with rating, genre overlap, and theme/tone
    /// keyword signals, then apply the soft filter and tone penalties.
    ///
    /// The sort is stable and descending by score, so candidates with equal
    /// scores keep their ascending-distance order and the ranking is
    /// deterministic for identical inputs.
    fn rerank(&self, query: &str, hits: Vec<SearchHit>) -> Vec<RankedCandidate> {
        let query_lower = query.to_lowercase();
        let query_tokens: HashSet<&str> = query_lower.split_whitespace().collect();
        let filters = parse_filters(query);

        if !filters.is_empty() {
            debug!("Soft filters parsed from query: {:?}", filters);
        }

        let mut reranked: Vec<RankedCandidate> = hits
            .into_iter()
            .map(|hit| {
                let similarity = similarity_from_distance(hit.distance);
                let book = hit.book;

                // Missing or junk ratings score as zero rather than erroring.
                let rating = book.rating.unwrap_or(0.0);
                let rating_norm = (rating / 5.0).clamp(0.0, 1.0);

                let genre_tokens: HashSet<String> = book
                    .genres
                    .iter()
                    .flat_map(|g| {
                        g.to_lowercase()
                            .split_whitespace()
                            .map(|t| t.to_string())
                            .collect::<Vec<_>>()
                    })
                    .collect();
                let overlap = query_tokens
                    .iter()
                    .filter(|t| genre_tokens.contains(**t))
                    .count();
                let genre_overlap = overlap as f32 / (query_tokens.len() as f32 + 1.0);

                let text = book.description.as_deref().unwrap_or("").to_lowercase();
                let theme_matches =
                    KeywordTables::matching_categories(&self.keywords.themes, &query_lower, &text);
                let theme_overlap = (theme_matches as f32 / THEME_MATCH_CEILING).min(1.0);

                let tone_matches =
                    KeywordTables::matching_categories(&self.keywords.tones, &query_lower, &text);
                let tone_alignment = (tone_matches as f32 / TONE_MATCH_CEILING).min(1.0);

                let mut score = SIMILARITY_WEIGHT * similarity
                    + RATING_WEIGHT * rating_norm
                    + GENRE_WEIGHT * genre_overlap
                    + THEME_WEIGHT * theme_overlap
                    + TONE_WEIGHT * tone_alignment;

                if let Some(min_rating) = filters.min_rating {
                    if rating < min_rating {
                        score *= FILTER_PENALTY;
                    }
                }
                // Items without page data are never penalized for it.
                if let (Some(max_pages), Some(pages)) = (filters.max_pages, book.pages) {
                    if pages > max_pages {
                        score *= FILTER_PENALTY;
                    }
                }
                if let (Some(min_pages), Some(pages)) = (filters.min_pages, book.pages) {
                    if pages < min_pages {
                        score *= FILTER_PENALTY;
                    }
                }

                // Asymmetric by design: a reader asking for cozy is steered
                // away from grim material; the reverse request is left alone.
                if KeywordTables::category_present(&self.keywords.tones, "cozy", &query_lower)
                    && KeywordTables::category_present(&self.keywords.tones, "dark", &text)
                {
                    score *= TONE_MISMATCH_PENALTY;
                }

                RankedCandidate {
                    book,
                    distance: hit.distance,
                    similarity,
                    score,
                }
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        reranked
    }
}

impl VectorIndexProvider for Retriever {
    fn vector_index(&self) -> &Arc<RwLock<VectorIndex>> {
        &self.index
    }
}

/// Distance-to-similarity transform. `1/(1+d)` keeps similarity in (0, 1]
/// for any non-negative distance without clamping.
fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}
