use crate::models::Mood;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::warn;

static SAD_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "sad",
        "down",
        "lonely",
        "tired",
        "anxious",
        "depressed",
        "upset",
        "heartbroken",
        "empty",
    ]
    .into()
});

static HAPPY_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "happy",
        "excited",
        "joy",
        "joyful",
        "optimistic",
        "delighted",
        "glad",
    ]
    .into()
});

/// Optional sentiment classifier consulted when the keyword heuristic is
/// inconclusive. Failures degrade to neutral; mood detection never breaks
/// a request.
#[async_trait]
pub trait MoodPort: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<Mood>;
}

/// Infer a coarse mood from user text.
///
/// Keyword heuristic first (fast, robust), classifier fallback second.
pub async fn detect_mood(text: &str, classifier: Option<&dyn MoodPort>) -> Mood {
    let txt = text.trim().to_lowercase();
    if txt.is_empty() {
        return Mood::Neutral;
    }

    let tokens: HashSet<&str> = txt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.iter().any(|t| SAD_WORDS.contains(t)) {
        return Mood::Sad;
    }
    if tokens.iter().any(|t| HAPPY_WORDS.contains(t)) {
        return Mood::Happy;
    }

    if let Some(classifier) = classifier {
        match classifier.classify(&txt).await {
            Ok(mood) => return mood,
            Err(e) => {
                warn!("Mood classifier failed, defaulting to neutral: {}", e);
            }
        }
    }

    Mood::Neutral
}
