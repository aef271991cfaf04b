use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

fn deserialize_genres<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match Option::<StringOrVec>::deserialize(deserializer)? {
        Some(StringOrVec::String(s)) => Ok(s
            .split(',')
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect()),
        Some(StringOrVec::Vec(v)) => Ok(v),
        None => Ok(Vec::new()),
    }
}

fn deserialize_optional_f32<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f32),
        Null,
    }

    // Unparseable values are treated as missing, not as errors; catalog rows
    // with junk in the rating column must still index.
    match Option::<StringOrFloat>::deserialize(deserializer)? {
        Some(StringOrFloat::String(s)) => Ok(f32::from_str(s.trim()).ok()),
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        _ => Ok(None),
    }
}

fn deserialize_optional_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i32),
        Null,
    }

    match Option::<StringOrInt>::deserialize(deserializer)? {
        Some(StringOrInt::String(s)) => Ok(i32::from_str(s.trim()).ok()),
        Some(StringOrInt::Int(i)) => Ok(Some(i)),
        _ => Ok(None),
    }
}

/// One catalog entry. Created at index-build time and immutable afterwards;
/// everything downstream works on copies or references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_genres")]
    pub genres: Vec<String>,
    #[serde(
        alias = "average_rating",
        default,
        deserialize_with = "deserialize_optional_f32"
    )]
    pub rating: Option<f32>,
    #[serde(
        alias = "publishedYear",
        default,
        deserialize_with = "deserialize_optional_i32"
    )]
    pub year: Option<i32>,
    #[serde(
        alias = "page_count",
        default,
        deserialize_with = "deserialize_optional_i32"
    )]
    pub pages: Option<i32>,
    pub publisher: Option<String>,
}

impl Book {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown title")
    }

    pub fn display_author(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown author")
    }

    pub fn genres_joined(&self) -> String {
        if self.genres.is_empty() {
            "Unknown".to_string()
        } else {
            self.genres.join(", ")
        }
    }
}

/// Flattened, response-friendly view of a book. This is what handlers and
/// the fallback path return; internal scores stay out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        BookSummary {
            title: book.display_title().to_string(),
            author: book.display_author().to_string(),
            genres: book.genres.clone(),
            rating: book.rating,
            year: book.year,
            publisher: book.publisher.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genres_from_comma_separated_string() {
        let book: Book =
            serde_json::from_str(r#"{"title": "T", "genres": "Fantasy, Romance"}"#).unwrap();
        assert_eq!(book.genres, vec!["Fantasy", "Romance"]);
    }

    #[test]
    fn test_rating_from_string_and_junk() {
        let book: Book = serde_json::from_str(r#"{"rating": "4.25"}"#).unwrap();
        assert_eq!(book.rating, Some(4.25));

        let junk: Book = serde_json::from_str(r#"{"rating": "n/a"}"#).unwrap();
        assert_eq!(junk.rating, None);
    }

    #[test]
    fn test_pages_from_string() {
        let book: Book = serde_json::from_str(r#"{"pages": "312"}"#).unwrap();
        assert_eq!(book.pages, Some(312));
    }

    #[test]
    fn test_average_rating_alias() {
        let book: Book = serde_json::from_str(r#"{"average_rating": 3.9}"#).unwrap();
        assert_eq!(book.rating, Some(3.9));
    }
}
