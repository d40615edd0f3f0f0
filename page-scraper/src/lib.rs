//! Page Scraper module for the bookmark manager
//!
//! This module turns a URL into page metadata and a locally stored icon,
//! and classifies bookmark hosts by network.
//!
//! # Features
//! - Four extraction strategies behind one contract (three static HTTP
//!   variants and a headless browser), run as a prioritized fallback chain
//! - Per-URL memoization of metadata in a bounded cache
//! - Icon download, validation, thumbnailing and per-domain storage
//! - Private / VPN / remote classification with reachability probing

pub mod http;
pub mod html;
pub mod icon;
pub mod headless;
pub mod strategy;
pub mod orchestrator;
pub mod reachability;
pub mod network;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use html::{extract_page, ExtractedPage, IconCandidate};
pub use http::ClientProfile;
pub use icon::{IconAcquirer, IconAcquirerConfig};
pub use headless::{HeadlessConfig, HeadlessFetcher};
pub use strategy::{Extractor, IconPolicy, Strategy};
pub use orchestrator::{MetadataFetcher, MetadataFetcherConfig, EXHAUSTED_ERROR};
pub use reachability::{HttpReachability, ReachabilityProbe};
pub use network::{is_ip_host, NetworkClassifier, NetworkClassifierConfig};
