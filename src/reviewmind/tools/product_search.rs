//! Hybrid Product Search
//!
//! Search and comparison over the [`ReviewCatalog`], exposed to agents and
//! MCP clients through
//! [`ProductSearchProtocol`](crate::tool_protocols::ProductSearchProtocol).
//!
//! "Hybrid" here means each product is scored two ways and the scores are
//! blended: exact keyword hits against name, category, and description, plus
//! Jaccard overlap between the normalised word sets of the query and the
//! product text. Ranking is deterministic: score descending, then product id
//! ascending.

use crate::reviewmind::tools::review_catalog::{CatalogError, Product, ReviewCatalog, ReviewStats};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Weight of exact keyword hits relative to word-set overlap.
const KEYWORD_WEIGHT: f64 = 0.6;
const OVERLAP_WEIGHT: f64 = 0.4;

/// A scored search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub product: Product,
    /// Blended relevance score in `[0, 1]`.
    pub score: f64,
}

/// One product's column in a comparison report.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonEntry {
    pub product: Product,
    pub stats: ReviewStats,
}

/// Hybrid search engine over a shared review catalog.
pub struct ProductSearch {
    catalog: Arc<ReviewCatalog>,
}

impl ProductSearch {
    /// Create a search engine backed by the given catalog.
    pub fn new(catalog: Arc<ReviewCatalog>) -> Self {
        Self { catalog }
    }

    /// Search the catalog, returning at most `limit` scored hits.
    ///
    /// Products with a zero score are omitted. An empty or whitespace-only
    /// query returns no hits rather than the whole catalog.
    pub fn hybrid_search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let query_words = word_set(query);
        if query_words.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .catalog
            .products()
            .into_iter()
            .filter_map(|product| {
                let score = self.score(&query_words, &product);
                if score > 0.0 {
                    Some(SearchHit { product, score })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.product.id.cmp(&b.product.id))
        });
        hits.truncate(limit);
        hits
    }

    /// Build a side-by-side comparison of products.
    ///
    /// Fails with [`CatalogError::UnknownProduct`] if any id is missing from
    /// the catalog. The two-product minimum is enforced at the protocol
    /// layer, where it maps to an invalid-parameters response.
    pub fn compare(&self, product_ids: &[u64]) -> Result<Vec<ComparisonEntry>, CatalogError> {
        product_ids
            .iter()
            .map(|&id| {
                let product = self
                    .catalog
                    .product(id)
                    .ok_or(CatalogError::UnknownProduct(id))?;
                let stats = self
                    .catalog
                    .stats_for(id)
                    .ok_or(CatalogError::UnknownProduct(id))?;
                Ok(ComparisonEntry { product, stats })
            })
            .collect()
    }

    fn score(&self, query_words: &HashSet<String>, product: &Product) -> f64 {
        let doc = format!(
            "{} {} {}",
            product.name, product.category, product.description
        );
        let doc_words = word_set(&doc);
        let doc_lower = doc.to_lowercase();

        // Keyword component: fraction of query words appearing verbatim.
        let keyword_hits = query_words
            .iter()
            .filter(|w| doc_lower.contains(w.as_str()))
            .count();
        let keyword_score = keyword_hits as f64 / query_words.len() as f64;

        let overlap_score = jaccard(query_words, &doc_words);

        KEYWORD_WEIGHT * keyword_score + OVERLAP_WEIGHT * overlap_score
    }
}

/// Normalise text into a word set.
///
/// Words shorter than 3 characters are ignored to reduce noise from articles
/// and prepositions. The input is lowercased before tokenisation.
fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Jaccard similarity between two word sets.
///
/// Returns `0.0` when either set is empty; word sets from
/// [`word_set`] are never both empty by the time this is called.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}
