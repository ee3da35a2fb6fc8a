//! Channel-aware document fetching.
//!
//! This crate provides:
//! - [`strategy`] — Per-request fetch parameters and product-type defaults
//! - [`channels`] — Channel definitions and the pure URL router
//! - [`fetcher`] — Retrying single fetch and ordered concurrent fan-out
//! - [`collector`] — Route, then fetch each bucket with its channel's strategy
//! - [`extract`] — Plain text and title from HTML

pub mod channels;
pub mod collector;
pub mod extract;
pub mod fetcher;
pub mod strategy;

pub use channels::{Channel, RoutedUrls, channels_for_product_type, route};
pub use collector::{CollectOptions, Collector};
pub use extract::{extract_title, strip_markup};
pub use fetcher::{FailureReason, FetchFailure, Fetcher};
pub use strategy::{DEFAULT_USER_AGENT, FetchStrategy, ProductCategory, resolve_strategy};
