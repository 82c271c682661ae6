//! Token-set similarity for memory deduplication.

use std::collections::HashSet;

/// Intersection-over-union of the two texts' lowercase word sets.
/// Word order and repetition are ignored; an empty union scores 0.0.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a = tokens(a);
    let set_b = tokens(b);
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}
