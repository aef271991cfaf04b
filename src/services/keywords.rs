use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Theme and tone vocabularies used by the reranking scorer.
///
/// Each entry maps a category name to the words that signal it. The tables
/// ship with compiled defaults and can be replaced wholesale from a JSON
/// file without touching code; whatever is loaded is validated at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordTables {
    pub themes: BTreeMap<String, Vec<String>>,
    pub tones: BTreeMap<String, Vec<String>>,
}

impl Default for KeywordTables {
    fn default() -> Self {
        let themes = [
            ("mystery", vec!["mystery", "detective", "murder", "crime", "whodunit"]),
            ("fantasy", vec!["fantasy", "magic", "dragon", "wizard", "sorcery"]),
            ("academy", vec!["academy", "school", "university", "boarding", "campus"]),
            ("politics", vec!["politics", "political", "empire", "throne", "rebellion"]),
            ("sci-fi", vec!["sci-fi", "science", "space", "robot", "alien", "futuristic"]),
            ("post-apocalyptic", vec!["post-apocalyptic", "apocalypse", "wasteland", "survivors", "dystopian"]),
            ("found-family", vec!["found-family", "crew", "companions", "ragtag", "belonging"]),
            ("historical", vec!["historical", "history", "war", "victorian", "medieval"]),
            ("romance", vec!["romance", "love", "romantic", "relationship"]),
        ];
        let tones = [
            ("cozy", vec!["cozy", "comforting", "gentle", "heartwarming", "wholesome"]),
            ("dark", vec!["dark", "grim", "bleak", "brutal", "disturbing"]),
            ("atmospheric", vec!["atmospheric", "haunting", "moody", "evocative"]),
            ("fast-paced", vec!["fast-paced", "thrilling", "gripping", "page-turner"]),
            ("slow-burn", vec!["slow-burn", "contemplative", "meditative", "reflective"]),
        ];

        fn build(entries: &[(&str, Vec<&str>)]) -> BTreeMap<String, Vec<String>> {
            entries
                .iter()
                .map(|(name, words)| {
                    (
                        name.to_string(),
                        words.iter().map(|w| w.to_string()).collect(),
                    )
                })
                .collect()
        }

        Self {
            themes: build(&themes),
            tones: build(&tones),
        }
    }
}

impl KeywordTables {
    /// Load tables from a JSON file, or fall back to the compiled defaults
    /// when no path is given. Either way the result is validated.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let tables = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(Path::new(p)).map_err(|e| {
                    ApiError::InternalError(format!("failed to read keyword tables {}: {}", p, e))
                })?;
                serde_json::from_str(&raw).map_err(|e| {
                    ApiError::InternalError(format!("invalid keyword tables {}: {}", p, e))
                })?
            }
            None => Self::default(),
        };
        tables.validate()?;
        Ok(tables)
    }

    /// Every category must carry at least one keyword; an empty list would
    /// silently disable a scoring signal.
    pub fn validate(&self) -> Result<()> {
        for (name, words) in self.themes.iter().chain(self.tones.iter()) {
            if words.is_empty() {
                return Err(ApiError::InternalError(format!(
                    "keyword category '{}' has no keywords",
                    name
                )));
            }
        }
        if self.themes.is_empty() || self.tones.is_empty() {
            return Err(ApiError::InternalError(
                "keyword tables must define at least one theme and one tone".to_string(),
            ));
        }
        Ok(())
    }

    /// Count categories whose vocabulary appears in both texts.
    pub fn matching_categories(
        table: &BTreeMap<String, Vec<String>>,
        query: &str,
        text: &str,
    ) -> usize {
        table
            .values()
            .filter(|words| {
                words.iter().any(|w| query.contains(w.as_str()))
                    && words.iter().any(|w| text.contains(w.as_str()))
            })
            .count()
    }

    /// Whether any keyword of the named category occurs in `text`.
    pub fn category_present(
        table: &BTreeMap<String, Vec<String>>,
        category: &str,
        text: &str,
    ) -> bool {
        table
            .get(category)
            .map(|words| words.iter().any(|w| text.contains(w.as_str())))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        KeywordTables::default().validate().unwrap();
    }

    #[test]
    fn test_empty_category_rejected() {
        let mut tables = KeywordTables::default();
        tables.themes.insert("empty".to_string(), Vec::new());
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_matching_categories_requires_both_sides() {
        let tables = KeywordTables::default();
        let n = KeywordTables::matching_categories(
            &tables.themes,
            "a mystery set in a magic academy",
            "a detective investigates a murder at a school of sorcery",
        );
        // mystery, fantasy, and academy all appear on both sides
        assert_eq!(n, 3);

        let none = KeywordTables::matching_categories(
            &tables.themes,
            "a mystery novel",
            "two people fall in love",
        );
        assert_eq!(none, 0);
    }

    #[test]
    fn test_category_present() {
        let tables = KeywordTables::default();
        assert!(KeywordTables::category_present(
            &tables.tones,
            "dark",
            "a grim and brutal tale"
        ));
        assert!(!KeywordTables::category_present(
            &tables.tones,
            "dark",
            "a gentle afternoon"
        ));
    }
}
