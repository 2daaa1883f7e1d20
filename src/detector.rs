/// Cheap gate in front of the oracle: a paragraph is worth sending only if it
/// holds at least one `(` and at least one `)`. Order and nesting are not
/// checked; the oracle makes the final call.
pub fn is_candidate(text: &str) -> bool {
    text.contains('(') && text.contains(')')
}
