//! Build the vector index artifacts from the cleaned catalog CSV.
//!
//! Usage:
//!   build_index <books.csv> [index_path] [metadata_path]
//!
//! Reads the catalog, builds one retrieval text per book, embeds the texts
//! in batches, and writes the two companion artifacts the serving process
//! loads at startup.

use anyhow::{bail, Context, Result};
use book_rag_api::config::Config;
use book_rag_api::index::VectorIndex;
use book_rag_api::ml::{EmbeddingPort, HuggingFaceEmbedder};
use book_rag_api::models::Book;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EMBED_BATCH_SIZE: usize = 16;

#[derive(Debug, Deserialize)]
struct BookCsvRecord {
    #[serde(alias = "Book Id", alias = "book_id")]
    id: Option<String>,
    #[serde(alias = "Title")]
    title: Option<String>,
    #[serde(alias = "Author", alias = "Authors")]
    author: Option<String>,
    #[serde(alias = "Description")]
    description: Option<String>,
    #[serde(alias = "Genres", alias = "categories")]
    genres: Option<String>,
    #[serde(alias = "average_rating", alias = "rating")]
    average_rating: Option<String>,
    #[serde(alias = "Year", alias = "published_year")]
    year: Option<String>,
    #[serde(alias = "Publisher")]
    publisher: Option<String>,
    #[serde(alias = "pages", alias = "page_count")]
    num_pages: Option<String>,
    retrieval_text: Option<String>,
}

/// Columns the cleaned dataset must carry; anything else is optional.
const REQUIRED_COLUMNS: &[&str] = &["Book Id", "Title", "Author", "genres", "average_rating"];

fn validate_headers(headers: &csv::StringRecord) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h.eq_ignore_ascii_case(c)))
        .copied()
        .collect();
    if !missing.is_empty() {
        bail!("Dataset is missing required columns: {:?}", missing);
    }
    Ok(())
}

/// Skip rows without a usable title or author; coerce everything else.
fn validate_record(record: BookCsvRecord) -> Option<(Book, String)> {
    let title = record.title.as_deref().unwrap_or("").trim().to_string();
    let author = record.author.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() || author.is_empty() {
        return None;
    }

    let book = Book {
        id: record.id.filter(|s| !s.trim().is_empty()),
        title: Some(title),
        author: Some(author),
        description: record
            .description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        genres: record
            .genres
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect(),
        rating: record
            .average_rating
            .as_deref()
            .and_then(|s| s.trim().parse().ok()),
        year: record.year.as_deref().and_then(|s| s.trim().parse().ok()),
        pages: record
            .num_pages
            .as_deref()
            .and_then(|s| s.trim().parse().ok()),
        publisher: record.publisher.filter(|s| !s.trim().is_empty()),
    };

    let text = match record
        .retrieval_text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(precomputed) => precomputed.to_string(),
        None => searchable_text(&book),
    };

    Some((book, text))
}

/// Rich text representation used for embedding when the dataset does not
/// ship a precomputed retrieval text.
fn searchable_text(book: &Book) -> String {
    let mut parts = Vec::new();

    if let Some(title) = &book.title {
        parts.push(format!("Title: {}", title));
    }
    if let Some(author) = &book.author {
        parts.push(format!("Author: {}", author));
    }
    if !book.genres.is_empty() {
        parts.push(format!("Genres: {}", book.genres.join(", ")));
    }
    if let Some(description) = &book.description {
        parts.push(format!("Description: {}", description));
    }

    parts.join(". ")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "build_index=info,book_rag_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let csv_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("data/clean_books.csv");

    let config = Config::from_env()?;
    let index_path = args.get(2).cloned().unwrap_or(config.index_path.clone());
    let metadata_path = args.get(3).cloned().unwrap_or(config.metadata_path.clone());

    if !Path::new(csv_path).exists() {
        bail!("Dataset not found at: {}", csv_path);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path))?;
    validate_headers(reader.headers()?)?;

    let mut books = Vec::new();
    let mut texts = Vec::new();
    let mut skipped = 0usize;

    for row in reader.deserialize::<BookCsvRecord>() {
        match row {
            Ok(record) => match validate_record(record) {
                Some((book, text)) => {
                    books.push(book);
                    texts.push(text);
                }
                None => skipped += 1,
            },
            Err(e) => {
                warn!("Skipping unreadable row: {}", e);
                skipped += 1;
            }
        }
    }

    info!(
        "Loaded {} books from {} ({} rows skipped)",
        books.len(),
        csv_path,
        skipped
    );
    if books.is_empty() {
        bail!("No usable rows in {}", csv_path);
    }

    let embedder = HuggingFaceEmbedder::new(&config)?;
    embedder.prewarm().await?;

    let mut index = VectorIndex::new(embedder.dim());
    for (batch_start, (text_batch, book_batch)) in texts
        .chunks(EMBED_BATCH_SIZE)
        .zip(books.chunks(EMBED_BATCH_SIZE))
        .enumerate()
    {
        let vectors = embedder.encode_batch(text_batch).await?;
        index.add(&vectors, book_batch.to_vec())?;
        info!(
            "Indexed {}/{} books",
            (batch_start * EMBED_BATCH_SIZE + text_batch.len()).min(books.len()),
            books.len()
        );
    }

    index.save(&index_path, &metadata_path)?;
    info!(
        "Done: {} books indexed into {} / {}",
        index.len(),
        index_path,
        metadata_path
    );

    Ok(())
}
