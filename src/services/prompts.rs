use crate::models::{ChatTurn, Mood, RankedCandidate};
use regex::Regex;
use std::sync::LazyLock;

const MAX_CONTEXT_DOCS: usize = 5;
const MAX_SNIPPET_CHARS: usize = 400;
const MAX_HISTORY_TURNS: usize = 6;

/// How long the generated answer should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terseness {
    Short,
    Detailed,
}

/// Which voice the generated answer should take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Personality {
    Friendly,
    Academic,
    Custom(String),
}

/// The two generation directives a UI-level style label maps to. The two
/// axes are independent; a style sets one, the other, or neither.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleDirectives {
    pub terseness: Option<Terseness>,
    pub personality: Option<Personality>,
}

/// Fixed lookup from UI style label to generation directives. Unknown
/// labels degrade to no directives rather than erroring.
pub fn style_directives(style: &str) -> StyleDirectives {
    match style.trim().to_lowercase().as_str() {
        "friendly" => StyleDirectives {
            terseness: None,
            personality: Some(Personality::Friendly),
        },
        "formal" => StyleDirectives {
            terseness: None,
            personality: Some(Personality::Academic),
        },
        "concise" => StyleDirectives {
            terseness: Some(Terseness::Short),
            personality: None,
        },
        "detailed" => StyleDirectives {
            terseness: Some(Terseness::Detailed),
            personality: None,
        },
        _ => StyleDirectives::default(),
    }
}

/// Render the retrieved candidates as the context block sent to the
/// generator. Bounded fields only; internal ranking scores never appear
/// here.
pub fn format_context(candidates: &[RankedCandidate]) -> String {
    let mut blocks = Vec::new();

    for (i, candidate) in candidates.iter().take(MAX_CONTEXT_DOCS).enumerate() {
        let book = &candidate.book;
        let snippet = truncate_on_word_boundary(
            book.description.as_deref().unwrap_or("").trim(),
            MAX_SNIPPET_CHARS,
        );
        let rating = book
            .rating
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "N/A".to_string());

        blocks.push(format!(
            "[BOOK {}]\nTitle: {}\nAuthor: {}\nGenres: {}\nRating: {}\nDescription: {}\n",
            i + 1,
            book.display_title(),
            book.display_author(),
            book.genres_joined(),
            rating,
            snippet,
        ));
    }

    blocks.join("\n")
}

fn truncate_on_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(' ') {
        Some(pos) => &cut[..pos],
        None => cut.as_str(),
    };
    format!("{}...", trimmed)
}

pub struct PromptOptions {
    pub directives: StyleDirectives,
    pub mood: Mood,
    pub explain: bool,
    pub second_opinion: bool,
}

pub fn build_system_prompt(opts: &PromptOptions) -> String {
    let mut prompt = String::from(
        "You are a book recommendation assistant operating on top of a retrieval system. \
         You must ONLY recommend books from the provided retrieved list. \
         Do NOT invent authors, titles, plots, or metadata. \
         If no books match, state this clearly and suggest the closest fits. \
         Start each recommendation on its own line as a bullet with the title in bold, \
         like: - **Title** followed by your explanation.",
    );

    match opts.terseness() {
        Some(Terseness::Short) => {
            prompt.push_str(" Keep answers extremely concise (1-2 sentences per book).");
        }
        Some(Terseness::Detailed) => {
            prompt.push_str(" Provide detailed explanations (3-4 sentences per book).");
        }
        None => {}
    }

    match opts.personality() {
        Some(Personality::Friendly) => {
            prompt.push_str(" Use a warm, friendly, accessible tone.");
        }
        Some(Personality::Academic) => {
            prompt.push_str(" Use a formal and academically appropriate tone.");
        }
        Some(Personality::Custom(voice)) => {
            prompt.push_str(&format!(" Answer in a {} style.", voice));
        }
        None => {}
    }

    match opts.mood {
        Mood::Sad => {
            prompt.push_str(
                " The reader seems to be feeling low; lean toward gentle, uplifting picks \
                 and a considerate tone.",
            );
        }
        Mood::Happy => {
            prompt.push_str(" The reader is in high spirits; match their energy.");
        }
        Mood::Neutral => {}
    }

    if opts.explain {
        prompt.push_str(
            " For each book, explain which aspects of the request it matches \
             (genres, themes, rating).",
        );
    }

    if opts.second_opinion {
        prompt.push_str(
            " After the main picks, add one alternative from the list for readers \
             who want something slightly different.",
        );
    }

    prompt
}

impl PromptOptions {
    fn terseness(&self) -> Option<Terseness> {
        self.directives.terseness
    }

    fn personality(&self) -> Option<&Personality> {
        self.directives.personality.as_ref()
    }
}

pub fn build_user_prompt(query: &str, context: &str, history: &[ChatTurn]) -> String {
    let mut prompt = String::new();

    if !history.is_empty() {
        prompt.push_str("CONVERSATION SO FAR:\n");
        let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
        for turn in &history[start..] {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "USER QUERY:\n{}\n\nRETRIEVED BOOKS (you MUST recommend only from these):\n{}\n\n\
         TASK:\nFrom the retrieved books, recommend 2-3 that best match the query. \
         For each, mention the title and a short explanation. \
         Only mention books that appear in the list above.",
        query, context
    ));

    prompt
}

static TITLE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*•]+\s*\*\*([^*\n]+)\*\*").unwrap());

/// Pull out the titles the generated answer claims to recommend: a leading
/// bullet followed by a bolded title segment. Deduplicated
/// case-insensitively, first-seen order preserved.
pub fn extract_recommended_titles(answer: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut titles = Vec::new();

    for cap in TITLE_MENTION.captures_iter(answer) {
        let title = cap[1].trim().to_string();
        if title.is_empty() {
            continue;
        }
        if seen.insert(normalize_title(&title)) {
            titles.push(title);
        }
    }

    titles
}

/// Canonical form used for title equality: lowercase, quotes stripped,
/// trailing punctuation dropped, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !matches!(c, '"' | '\u{201c}' | '\u{201d}' | '\u{2018}' | '\u{2019}' | '\''))
        .collect();
    stripped
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
