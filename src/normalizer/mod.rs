// Text normalization for semantic search.
// Queries and indexed terms must compare equal after normalization even when
// they differ in case, accents or spacing.


use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Remove diacritics by decomposing to NFD and dropping combining marks.
/// Plain ASCII letters and digits pass through untouched ("ñoño" -> "nono",
/// "Configuración" -> "Configuracion").
#[inline]
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Full normalization: strip diacritics, lowercase, trim and collapse
/// internal whitespace runs to a single space.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`. Empty or
/// whitespace-only input normalizes to the empty string. Length limits are
/// the caller's concern (the search service rejects over-long queries before
/// normalizing).
#[inline]
pub fn normalize(text: &str) -> String {
    let stripped = strip_diacritics(text).to_lowercase();
    let mut out = String::with_capacity(stripped.len());
    for word in stripped.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Whether a string is already in normalized form.
#[inline]
pub fn is_normalized(text: &str) -> bool {
    normalize(text) == text
}
