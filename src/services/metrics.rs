//! Retrieval quality metrics used by the evaluation tests.

/// Fraction of the relevant titles that appear in the top `k` retrieved.
pub fn recall_at_k(retrieved: &[String], relevant: &[String], k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top_k = &retrieved[..retrieved.len().min(k)];
    let hits = relevant.iter().filter(|r| top_k.contains(r)).count();
    hits as f64 / relevant.len() as f64
}

/// Fraction of the top `k` retrieved that are relevant.
pub fn precision_at_k(retrieved: &[String], relevant: &[String], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let top_k = &retrieved[..retrieved.len().min(k)];
    let hits = relevant.iter().filter(|r| top_k.contains(r)).count();
    hits as f64 / k as f64
}

/// Reciprocal rank of the first relevant title, or 0 when none appears.
pub fn reciprocal_rank(retrieved: &[String], relevant: &[String]) -> f64 {
    for (i, title) in retrieved.iter().enumerate() {
        if relevant.contains(title) {
            return 1.0 / (i as f64 + 1.0);
        }
    }
    0.0
}
