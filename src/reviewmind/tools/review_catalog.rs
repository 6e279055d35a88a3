//! Product Review Catalog
//!
//! In-memory store of products and their customer reviews, used as the data
//! source for review analysis runs. The collector agent reads from it through
//! [`ReviewCatalogProtocol`](crate::tool_protocols::ReviewCatalogProtocol),
//! and the REST layer consults it to reject requests for unknown products.
//!
//! # Features
//!
//! - **Rating validation**: reviews outside the 1-5 star range are rejected at ingestion
//! - **Aggregated statistics**: averages, per-star histograms, and language mix
//! - **Seedable**: from a JSON document or the built-in demo dataset
//! - **Thread-safe**: share one instance across agents and servers via `Arc`
//!
//! # Example
//!
//! ```ignore
//! use reviewmind::tools::ReviewCatalog;
//!
//! let catalog = ReviewCatalog::with_demo_data();
//!
//! let reviews = catalog.reviews_for(1001).expect("demo product");
//! let stats = catalog.stats_for(1001).expect("demo product");
//! println!("{} reviews, {:.1} average", stats.review_count, stats.average_rating);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::RwLock;

/// A product that customers can review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Price in cents, to keep comparisons exact.
    pub price_cents: u64,
}

/// A single customer review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductReview {
    pub id: u64,
    pub product_id: u64,
    pub author: String,
    /// Star rating, 1 through 5.
    pub rating: u8,
    pub title: String,
    pub body: String,
    /// ISO 639-1 code of the language the review was written in (e.g. "es").
    pub language: String,
    pub submitted_at: DateTime<Utc>,
}

/// Aggregated review statistics for one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewStats {
    pub product_id: u64,
    pub review_count: usize,
    pub average_rating: f64,
    /// Review counts indexed by star rating; `rating_histogram[0]` is 1-star.
    pub rating_histogram: [usize; 5],
    /// Distinct review languages, sorted.
    pub languages: Vec<String>,
}

/// Error types for catalog operations
#[derive(Debug, Clone)]
pub enum CatalogError {
    /// No product with the given id exists in the catalog.
    UnknownProduct(u64),
    /// A review carried a star rating outside the 1-5 range.
    InvalidRating(u8),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::UnknownProduct(id) => write!(f, "Unknown product: {}", id),
            CatalogError::InvalidRating(rating) => {
                write!(f, "Invalid rating: {} (must be between 1 and 5)", rating)
            }
        }
    }
}

impl Error for CatalogError {}

/// Shape of a JSON seed document accepted by [`ReviewCatalog::load_from_json`].
#[derive(Debug, Deserialize)]
struct CatalogSeed {
    products: Vec<Product>,
    #[serde(default)]
    reviews: Vec<ProductReview>,
}

/// Product Review Catalog
///
/// A thread-safe store of products and reviews. All accessors return owned
/// clones so no lock is held across await points in the calling code.
#[derive(Debug, Default)]
pub struct ReviewCatalog {
    products: RwLock<HashMap<u64, Product>>,
    reviews: RwLock<HashMap<u64, Vec<ProductReview>>>,
}

impl ReviewCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog pre-seeded with the demo product line.
    ///
    /// The demo data intentionally mixes review languages (English, Spanish,
    /// German, French, Italian, Portuguese) so the translation stage of an
    /// analysis run has real work to do.
    pub fn with_demo_data() -> Self {
        let catalog = Self::new();
        seed_demo_data(&catalog);
        catalog
    }

    /// Insert or replace a product.
    pub fn add_product(&self, product: Product) {
        let mut products = self.products.write().unwrap();
        products.insert(product.id, product);
    }

    /// Add a review after validating it.
    ///
    /// Fails with [`CatalogError::InvalidRating`] when the star rating falls
    /// outside 1-5, and with [`CatalogError::UnknownProduct`] when the
    /// referenced product does not exist.
    pub fn add_review(&self, review: ProductReview) -> Result<(), CatalogError> {
        if review.rating < 1 || review.rating > 5 {
            return Err(CatalogError::InvalidRating(review.rating));
        }
        if !self.product_exists(review.product_id) {
            return Err(CatalogError::UnknownProduct(review.product_id));
        }
        let mut reviews = self.reviews.write().unwrap();
        reviews.entry(review.product_id).or_default().push(review);
        Ok(())
    }

    /// Load products and reviews from a JSON document.
    ///
    /// Expected shape:
    ///
    /// ```json
    /// {
    ///   "products": [{"id": 1, "name": "...", "description": "...",
    ///                 "category": "...", "price_cents": 1999}],
    ///   "reviews":  [{"id": 1, "product_id": 1, "author": "...", "rating": 5,
    ///                 "title": "...", "body": "...", "language": "en",
    ///                 "submitted_at": "2026-01-15T09:30:00Z"}]
    /// }
    /// ```
    ///
    /// Products are loaded before reviews so reviews can reference products
    /// from the same document. Every review passes through the same
    /// validation as [`add_review`](ReviewCatalog::add_review); the first
    /// invalid entry aborts the load. Returns the number of reviews loaded.
    pub fn load_from_json(&self, json: &str) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let seed: CatalogSeed = serde_json::from_str(json)?;
        for product in seed.products {
            self.add_product(product);
        }
        let count = seed.reviews.len();
        for review in seed.reviews {
            self.add_review(review)?;
        }
        Ok(count)
    }

    /// Whether a product with this id exists.
    pub fn product_exists(&self, product_id: u64) -> bool {
        self.products.read().unwrap().contains_key(&product_id)
    }

    /// Look up a product by id.
    pub fn product(&self, product_id: u64) -> Option<Product> {
        self.products.read().unwrap().get(&product_id).cloned()
    }

    /// All products, sorted by id for deterministic output.
    pub fn products(&self) -> Vec<Product> {
        let products = self.products.read().unwrap();
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        all
    }

    /// Reviews for a product, newest first.
    ///
    /// Returns `None` for an unknown product and `Some(vec![])` for a known
    /// product that simply has no reviews yet; callers use the distinction to
    /// answer "not found" versus "nothing to analyze".
    pub fn reviews_for(&self, product_id: u64) -> Option<Vec<ProductReview>> {
        if !self.product_exists(product_id) {
            return None;
        }
        let reviews = self.reviews.read().unwrap();
        let mut list = reviews.get(&product_id).cloned().unwrap_or_default();
        list.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Some(list)
    }

    /// Aggregated statistics for a product, or `None` if the product is unknown.
    pub fn stats_for(&self, product_id: u64) -> Option<ReviewStats> {
        let list = self.reviews_for(product_id)?;
        let review_count = list.len();
        let mut rating_histogram = [0usize; 5];
        let mut rating_sum = 0u64;
        let mut languages: Vec<String> = Vec::new();

        for review in &list {
            rating_histogram[(review.rating - 1) as usize] += 1;
            rating_sum += review.rating as u64;
            if !languages.contains(&review.language) {
                languages.push(review.language.clone());
            }
        }
        languages.sort();

        let average_rating = if review_count == 0 {
            0.0
        } else {
            rating_sum as f64 / review_count as f64
        };

        Some(ReviewStats {
            product_id,
            review_count,
            average_rating,
            rating_histogram,
            languages,
        })
    }

    /// Total number of reviews across all products.
    pub fn review_count(&self) -> usize {
        self.reviews.read().unwrap().values().map(|v| v.len()).sum()
    }
}

fn demo_time(days_ago: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days_ago)
}

fn seed_demo_data(catalog: &ReviewCatalog) {
    let products = vec![
        Product {
            id: 1001,
            name: "AeroSound Max Wireless Headphones".to_string(),
            description: "Over-ear noise-cancelling headphones with 40-hour battery life"
                .to_string(),
            category: "Audio".to_string(),
            price_cents: 19999,
        },
        Product {
            id: 1002,
            name: "BrewMaster Pro Espresso Machine".to_string(),
            description: "Semi-automatic espresso machine with integrated grinder and steam wand"
                .to_string(),
            category: "Kitchen".to_string(),
            price_cents: 64900,
        },
        Product {
            id: 1003,
            name: "TrailBlazer GTX Running Shoes".to_string(),
            description: "Waterproof trail running shoes with aggressive grip".to_string(),
            category: "Sports".to_string(),
            price_cents: 14950,
        },
        Product {
            id: 1004,
            name: "TypeStorm 87 Mechanical Keyboard".to_string(),
            description: "Tenkeyless mechanical keyboard with hot-swappable switches".to_string(),
            category: "Electronics".to_string(),
            price_cents: 8999,
        },
    ];
    for product in products {
        catalog.add_product(product);
    }

    let reviews = vec![
        (
            1001, "Maya R.", 5, "Incredible battery life",
            "Three long-haul flights on one charge and the noise cancelling made the engine hum disappear.",
            "en", 4,
        ),
        (
            1001, "Carlos M.", 4, "Muy cómodos para viajes largos",
            "Las almohadillas no aprietan ni después de seis horas, aunque el estuche podría ser más compacto.",
            "es", 9,
        ),
        (
            1001, "Jonas K.", 2, "Verbindungsabbrüche am PC",
            "Am Handy einwandfrei, aber unter Windows bricht die Bluetooth-Verbindung mehrmals pro Stunde ab.",
            "de", 15,
        ),
        (
            1001, "Amélie D.", 5, "Réduction de bruit impressionnante",
            "Le mode transparence est naturel et la réduction de bruit surpasse celle de mon ancien casque.",
            "fr", 21,
        ),
        (
            1001, "Dan W.", 4, "Great sound, average mic",
            "Sound quality punches above the price, but colleagues say I sound muffled on calls.",
            "en", 30,
        ),
        (
            1002, "Priya S.", 5, "Barista-level shots at home",
            "Consistent extraction once dialed in, and the grinder is quieter than expected.",
            "en", 6,
        ),
        (
            1002, "Marco B.", 3, "La caldaia impiega troppo a scaldarsi",
            "Ottimo espresso, ma ogni mattina aspetto quasi dieci minuti prima che sia pronta.",
            "it", 12,
        ),
        (
            1002, "Tom H.", 1, "Leaked after two weeks",
            "Water pooled under the machine after two weeks of light use. Support was slow to respond.",
            "en", 18,
        ),
        (
            1002, "Ana L.", 4, "Espuma de leite perfeita",
            "O vaporizador faz microespuma digna de cafeteria, só acho o reservatório pequeno.",
            "pt", 27,
        ),
        (
            1003, "Erin P.", 4, "Solid grip on wet rock",
            "Held firm on a rainy ridge scramble. Toe box is roomy, heel lock is secure.",
            "en", 3,
        ),
        (
            1003, "Diego F.", 5, "El mejor agarre en senderos mojados",
            "He corrido con ellas bajo lluvia intensa y no he resbalado ni una vez.",
            "es", 10,
        ),
        (
            1003, "Sam T.", 3, "Runs half a size small",
            "Comfortable once broken in, but order half a size up from your road shoe size.",
            "en", 16,
        ),
        (
            1003, "Lena M.", 4, "Sehr bequem auf langen Läufen",
            "Auch nach dreißig Kilometern keine Blasen, nur die Schnürsenkel lösen sich gelegentlich.",
            "de", 24,
        ),
        (
            1004, "Alex J.", 5, "Best board under a hundred",
            "Gasket mount feel, clean RGB, and the stock switches are shockingly good.",
            "en", 5,
        ),
        (
            1004, "Chris N.", 2, "Keycaps started shining within a month",
            "The board itself is great but the ABS keycaps wear fast. Budget for replacements.",
            "en", 13,
        ),
        (
            1004, "Pauline V.", 4, "Frappe très agréable",
            "La frappe est douce et silencieuse, parfaite pour un open space.",
            "fr", 19,
        ),
    ];

    for (i, (product_id, author, rating, title, body, language, days_ago)) in
        reviews.into_iter().enumerate()
    {
        // Seed data is known-valid; ignore the impossible error.
        let _ = catalog.add_review(ProductReview {
            id: (i + 1) as u64,
            product_id,
            author: author.to_string(),
            rating,
            title: title.to_string(),
            body: body.to_string(),
            language: language.to_string(),
            submitted_at: demo_time(days_ago),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_review(product_id: u64, rating: u8) -> ProductReview {
        ProductReview {
            id: 1,
            product_id,
            author: "Test".to_string(),
            rating,
            title: "Title".to_string(),
            body: "Body".to_string(),
            language: "en".to_string(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_out_of_range_ratings() {
        let catalog = ReviewCatalog::new();
        catalog.add_product(Product {
            id: 1,
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            category: "Misc".to_string(),
            price_cents: 100,
        });

        assert!(matches!(
            catalog.add_review(sample_review(1, 0)),
            Err(CatalogError::InvalidRating(0))
        ));
        assert!(matches!(
            catalog.add_review(sample_review(1, 6)),
            Err(CatalogError::InvalidRating(6))
        ));
        assert!(catalog.add_review(sample_review(1, 5)).is_ok());
    }

    #[test]
    fn rejects_reviews_for_unknown_products() {
        let catalog = ReviewCatalog::new();
        assert!(matches!(
            catalog.add_review(sample_review(42, 3)),
            Err(CatalogError::UnknownProduct(42))
        ));
    }

    #[test]
    fn distinguishes_unknown_product_from_empty_reviews() {
        let catalog = ReviewCatalog::new();
        catalog.add_product(Product {
            id: 7,
            name: "Gadget".to_string(),
            description: "A gadget".to_string(),
            category: "Misc".to_string(),
            price_cents: 500,
        });

        assert!(catalog.reviews_for(999).is_none());
        assert_eq!(catalog.reviews_for(7).map(|v| v.len()), Some(0));
    }

    #[test]
    fn stats_aggregate_ratings_and_languages() {
        let catalog = ReviewCatalog::with_demo_data();
        let stats = catalog.stats_for(1001).expect("demo product");

        assert_eq!(stats.review_count, 5);
        assert!(stats.average_rating > 3.9 && stats.average_rating < 4.1);
        assert_eq!(stats.rating_histogram.iter().sum::<usize>(), 5);
        assert_eq!(stats.languages, vec!["de", "en", "es", "fr"]);
    }

    #[test]
    fn demo_reviews_are_newest_first() {
        let catalog = ReviewCatalog::with_demo_data();
        let reviews = catalog.reviews_for(1001).expect("demo product");
        for pair in reviews.windows(2) {
            assert!(pair[0].submitted_at >= pair[1].submitted_at);
        }
    }
}
