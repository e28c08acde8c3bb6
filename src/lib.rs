//! Inciguard — cosmetic ingredient safety and eco-profile resolution engine.
//!
//! Given a list of raw ingredient tokens (typed, scraped, or OCR'd), the
//! engine canonicalizes each token, resolves it against a set of external
//! safety databases through a per-provider resilience layer, merges the
//! answers into one canonical record, caches the result, and returns a
//! product-level analysis.
//!
//! Entry point: [`engine::Engine`].

pub mod aggregate;
pub mod cache;
pub mod canonical;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod logging;
pub mod providers;
pub mod resilience;
pub mod store;
pub mod types;
