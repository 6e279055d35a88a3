//! Built-in Tool Implementations
//!
//! This module provides the data-side tools that review agents use while
//! analyzing a product. These tools can be used individually or composed
//! together via the tool protocol system.
//!
//! # Available Tools
//!
//! - **ReviewCatalog**: In-memory store of products and their customer reviews
//!   - Seedable from JSON or the built-in demo dataset
//!   - Rating validation on ingestion (1-5 stars)
//!   - Aggregated statistics (averages, histograms, language mix)
//!   - Thread-safe shared access via `Arc`
//!
//! - **ProductSearch**: Hybrid keyword + token-overlap search over the catalog
//!   - Deterministic ranking (score, then product id)
//!   - Side-by-side product comparison backed by review statistics
//!
//! # Integration with Agents
//!
//! These tools are exposed to agents through the tool protocol system:
//!
//! ```ignore
//! use reviewmind::tools::ReviewCatalog;
//! use reviewmind::tool_protocols::ReviewCatalogProtocol;
//! use reviewmind::tool_protocol::ToolRegistry;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(ReviewCatalog::with_demo_data());
//! let protocol = Arc::new(ReviewCatalogProtocol::new(catalog));
//! let mut registry = ToolRegistry::empty();
//! registry.add_protocol("catalog", protocol).await?;
//! agent.with_tools(registry);
//! ```

pub mod product_search;
pub mod review_catalog;

pub use product_search::{ProductSearch, SearchHit};
pub use review_catalog::{CatalogError, Product, ProductReview, ReviewCatalog, ReviewStats};
