//! Fuzzy activity lookup for `start-activity`.

use harmony_protocol::Activity;

/// Outcome of resolving a user-supplied activity name.
#[derive(Debug, PartialEq)]
pub enum Match<'a> {
    Unique(&'a Activity),
    /// Several candidates; nothing is started.
    Ambiguous(Vec<&'a Activity>),
    None,
}

/// Resolves `query` against the configured activities.
///
/// A case-insensitive substring match on labels wins if it is unique.
/// Otherwise ids are tried the same way; when several ids contain the
/// query, an exact id match still counts as unique.
pub fn resolve<'a>(activities: &'a [Activity], query: &str) -> Match<'a> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Match::None;
    }

    let by_label: Vec<&Activity> = activities
        .iter()
        .filter(|a| a.label.to_lowercase().contains(&needle))
        .collect();
    if let [only] = by_label.as_slice() {
        return Match::Unique(*only);
    }

    let by_id: Vec<&Activity> = activities
        .iter()
        .filter(|a| a.id.to_lowercase().contains(&needle))
        .collect();
    if let [only] = by_id.as_slice() {
        return Match::Unique(*only);
    }
    if let Some(exact) = by_id.iter().find(|a| a.id.eq_ignore_ascii_case(&needle)) {
        return Match::Unique(*exact);
    }

    match (by_label.is_empty(), by_id.is_empty()) {
        (true, true) => Match::None,
        (false, _) => Match::Ambiguous(by_label),
        (true, false) => Match::Ambiguous(by_id),
    }
}
