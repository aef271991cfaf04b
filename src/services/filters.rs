use crate::models::QueryFilters;
use regex::Regex;
use std::sync::LazyLock;

static MAX_PAGES_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(?:under|below|less than)\s+(\d+)\s+pages").unwrap(),
        Regex::new(r"(?i)<\s*(\d+)\s*pages").unwrap(),
    ]
});

static MIN_PAGES_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(?:over|more than|at least)\s+(\d+)\s+pages").unwrap(),
        Regex::new(r"(?i)>\s*(\d+)\s*pages").unwrap(),
    ]
});

static MIN_RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(?:above|over|at least)\s+(\d+(?:\.\d+)?)\s+stars?").unwrap(),
        Regex::new(r"(?i)rat(?:ing|ed)\s+(?:above|over|at least)\s+(\d+(?:\.\d+)?)").unwrap(),
        Regex::new(r"(?i)>=\s*(\d+(?:\.\d+)?)\s*stars?").unwrap(),
    ]
});

/// Extract soft numeric constraints from a free-text query.
///
/// Pure function over the text: the first matching pattern per field wins,
/// absent or unparseable phrases simply leave the field unset. The caller
/// applies these as score attenuations, never as hard exclusions.
pub fn parse_filters(query: &str) -> QueryFilters {
    let mut filters = QueryFilters::default();

    filters.max_pages = first_match(&MAX_PAGES_PATTERNS, query).and_then(|s| s.parse().ok());
    filters.min_pages = first_match(&MIN_PAGES_PATTERNS, query).and_then(|s| s.parse().ok());
    filters.min_rating = first_match(&MIN_RATING_PATTERNS, query).and_then(|s| s.parse().ok());

    filters
}

fn first_match(patterns: &[Regex], query: &str) -> Option<String> {
    for pattern in patterns {
        if let Some(cap) = pattern.captures(query) {
            return Some(cap[1].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_rating_and_page_constraints() {
        let filters = parse_filters("mystery rated above 4.2 under 350 pages");
        assert_eq!(filters.min_rating, Some(4.2));
        assert_eq!(filters.max_pages, Some(350));
        assert_eq!(filters.min_pages, None);
    }

    #[test]
    fn test_min_pages_phrasings() {
        assert_eq!(
            parse_filters("something over 500 pages").min_pages,
            Some(500)
        );
        assert_eq!(
            parse_filters("more than 200 pages please").min_pages,
            Some(200)
        );
        assert_eq!(parse_filters("epics > 800 pages").min_pages, Some(800));
    }

    #[test]
    fn test_max_pages_phrasings() {
        assert_eq!(parse_filters("under 300 pages").max_pages, Some(300));
        assert_eq!(parse_filters("below 400 pages").max_pages, Some(400));
        assert_eq!(parse_filters("less than 250 pages").max_pages, Some(250));
        assert_eq!(parse_filters("< 300 pages").max_pages, Some(300));
    }

    #[test]
    fn test_rating_phrasings() {
        assert_eq!(parse_filters("above 4 stars").min_rating, Some(4.0));
        assert_eq!(parse_filters("at least 4.5 stars").min_rating, Some(4.5));
        assert_eq!(parse_filters("rating above 3.8").min_rating, Some(3.8));
        assert_eq!(parse_filters("rated at least 4").min_rating, Some(4.0));
        assert_eq!(parse_filters(">= 4 stars").min_rating, Some(4.0));
    }

    #[test]
    fn test_unconstrained_query_leaves_fields_unset() {
        let filters = parse_filters("a reflective novel about identity");
        assert!(filters.is_empty());
    }

    #[test]
    fn test_same_input_same_output() {
        let q = "fantasy rated above 4.2 under 350 pages";
        assert_eq!(parse_filters(q), parse_filters(q));
    }

    #[test]
    fn test_case_insensitive() {
        let filters = parse_filters("Mystery Rated ABOVE 4.2 UNDER 350 Pages");
        assert_eq!(filters.min_rating, Some(4.2));
        assert_eq!(filters.max_pages, Some(350));
    }
}
