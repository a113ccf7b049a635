// Canonical text construction
// Derives, for each record, the exact string handed to the embedding
// provider. Pure and deterministic; a record always yields byte-identical
// output so re-indexing is reproducible.


use std::fmt::Write;

use itertools::Itertools;

use super::CatalogRecord;

/// Build the canonical text for a record.
///
/// A non-blank precomputed `texto_indexado` is used verbatim. Otherwise the
/// text is assembled as `"Route: <levels>. Description: <description>. "`
/// with optional `"Synonyms: .... "` and `"Actions: .... "` clauses. Legacy
/// keywords feed the Synonyms clause. Empty lists produce no clause at all.
///
/// The output is embedded as-is, without normalization; only the query side
/// is normalized at search time.
#[inline]
pub fn build(record: &CatalogRecord) -> String {
    if let CatalogRecord::Extended(extended) = record {
        if let Some(precomputed) = extended.canonical_text.as_deref() {
            if !precomputed.trim().is_empty() {
                return precomputed.to_string();
            }
        }
    }

    let levels: Vec<&str> = match record {
        CatalogRecord::Legacy(legacy) => std::iter::once(legacy.category.as_str())
            .chain(legacy.subcategory.as_deref())
            .collect(),
        CatalogRecord::Extended(extended) => {
            extended.levels.iter().map(String::as_str).collect()
        }
    };

    let mut text = format!(
        "Route: {}. Description: {}. ",
        levels.iter().join(" > "),
        record.effective_description()
    );

    let synonyms = match record {
        CatalogRecord::Legacy(legacy) => dedup_terms(legacy.keywords.as_deref()),
        CatalogRecord::Extended(extended) => dedup_terms(extended.synonyms.as_deref()),
    };
    if !synonyms.is_empty() {
        let _ = write!(text, "Synonyms: {}. ", synonyms.iter().join(", "));
    }

    if let CatalogRecord::Extended(extended) = record {
        let actions = dedup_terms(extended.actions.as_deref());
        if !actions.is_empty() {
            let _ = write!(text, "Actions: {}. ", actions.iter().join(", "));
        }
    }

    text
}

/// Drop blank entries and duplicates, preserving first-occurrence order.
fn dedup_terms(terms: Option<&[String]>) -> Vec<&str> {
    let mut seen = Vec::new();
    for term in terms.unwrap_or_default() {
        let term = term.trim();
        if !term.is_empty() && !seen.contains(&term) {
            seen.push(term);
        }
    }
    seen
}
