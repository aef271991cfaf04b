use crate::error::Result;
use crate::models::{BookSummary, ChatTurn, Mood, PipelineResult, RankedCandidate};
use crate::services::generator::GenerationPort;
use crate::services::mood::{detect_mood, MoodPort};
use crate::services::prompts::{
    build_system_prompt, build_user_prompt, extract_recommended_titles, format_context,
    normalize_title, style_directives, PromptOptions,
};
use crate::services::retriever::Retriever;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How many candidates each request pulls from the index. Fixed and
/// independent of how many the answer ultimately shows.
const RETRIEVAL_FAN_OUT: usize = 10;

/// How many of the top candidates are rendered into the generation context.
const CONTEXT_DOCS: usize = 3;

const GENERATION_TEMPERATURE: f32 = 0.7;

pub const CLARIFICATION_MESSAGE: &str =
    "Please tell me a bit more about what you'd like to read - a genre, a theme, \
     or a book you enjoyed.";

pub const SAFETY_MESSAGE: &str =
    "I'm really sorry you're going through a difficult moment. I can't help with that \
     here, but please consider reaching out to someone you trust or a local support \
     line - you deserve real support. If it would help, I'd be glad to suggest some \
     gentle, comforting reads instead.";

// Checked before anything else touches the catalog or the generator.
const SELF_HARM_PHRASES: &[&str] = &[
    "suicide",
    "kill myself",
    "self-harm",
    "self harm",
    "hurt myself",
    "end my life",
    "want to die",
];

/// Per-request options, as chosen in the UI layer.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub style: Option<String>,
    pub use_mood: bool,
    pub explain: bool,
    pub second_opinion: bool,
    pub history: Vec<ChatTurn>,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            style: None,
            use_mood: true,
            explain: false,
            second_opinion: false,
            history: Vec::new(),
        }
    }
}

/// Top-level request orchestration: sanitize, safety-gate, infer mood, map
/// style, retrieve, format, generate, and reconcile the answer back to the
/// verified retrieved set.
pub struct RecommendationPipeline {
    retriever: Arc<Retriever>,
    generator: Arc<dyn GenerationPort>,
    mood_classifier: Option<Arc<dyn MoodPort>>,
}

impl RecommendationPipeline {
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<dyn GenerationPort>,
        mood_classifier: Option<Arc<dyn MoodPort>>,
    ) -> Self {
        Self {
            retriever,
            generator,
            mood_classifier,
        }
    }

    pub async fn run(&self, query: &str, options: &RecommendOptions) -> Result<PipelineResult> {
        let style = options.style.clone().unwrap_or_else(|| "default".to_string());

        let query = query.trim();
        if query.is_empty() {
            return Ok(terminal_result("", &style, CLARIFICATION_MESSAGE));
        }

        if let Some(phrase) = blocked_phrase(query) {
            warn!("Safety gate triggered by phrase '{}'", phrase);
            return Ok(terminal_result(query, &style, SAFETY_MESSAGE));
        }

        let mood = if options.use_mood {
            detect_mood(query, self.mood_classifier.as_deref()).await
        } else {
            Mood::Neutral
        };
        debug!("Detected mood: {}", mood.as_str());

        let candidates = self
            .retriever
            .retrieve(query, RETRIEVAL_FAN_OUT, true)
            .await?;

        let context = format_context(&candidates[..candidates.len().min(CONTEXT_DOCS)]);

        let system_prompt = build_system_prompt(&PromptOptions {
            directives: style_directives(&style),
            mood,
            explain: options.explain,
            second_opinion: options.second_opinion,
        });
        let user_prompt = build_user_prompt(query, &context, &options.history);

        let answer = self
            .generator
            .generate(&system_prompt, &user_prompt, GENERATION_TEMPERATURE, None)
            .await?;

        let recommended_books = reconcile(&answer, &candidates);
        info!(
            "Answer mentions {} verified catalog titles",
            recommended_books.len()
        );

        let retrieved_books: Vec<BookSummary> =
            candidates.iter().map(|c| BookSummary::from(&c.book)).collect();

        Ok(PipelineResult {
            query: query.to_string(),
            retrieved: candidates,
            retrieved_books,
            recommended_books,
            context,
            raw_model_output: answer.clone(),
            answer,
            style,
            mood,
        })
    }
}

fn blocked_phrase(query: &str) -> Option<&'static str> {
    let lowered = query.to_lowercase();
    SELF_HARM_PHRASES
        .iter()
        .find(|phrase| lowered.contains(**phrase))
        .copied()
}

fn terminal_result(query: &str, style: &str, answer: &str) -> PipelineResult {
    PipelineResult {
        query: query.to_string(),
        retrieved: Vec::new(),
        retrieved_books: Vec::new(),
        recommended_books: Vec::new(),
        context: String::new(),
        answer: answer.to_string(),
        raw_model_output: String::new(),
        style: style.to_string(),
        mood: Mood::Neutral,
    }
}

/// Match the titles the answer claims to recommend against the retrieved
/// candidates, by normalized title equality only. Mentions that match
/// nothing we retrieved are dropped: the system never reports a book it
/// cannot verify came from the catalog.
fn reconcile(answer: &str, candidates: &[RankedCandidate]) -> Vec<BookSummary> {
    extract_recommended_titles(answer)
        .iter()
        .filter_map(|mention| {
            let normalized = normalize_title(mention);
            let matched = candidates.iter().find(|c| {
                c.book
                    .title
                    .as_deref()
                    .map(|t| normalize_title(t) == normalized)
                    .unwrap_or(false)
            });
            if matched.is_none() {
                debug!("Dropping unverifiable title mention: '{}'", mention);
            }
            matched.map(|c| BookSummary::from(&c.book))
        })
        .collect()
}
