//! Headless-browser scraping of product specification panels, driven by
//! ordered selector fallbacks so small markup changes don't break a run.

pub mod chrome;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod fixture;
pub mod offers;
pub mod output;
pub mod page;
pub mod resolver;
pub mod runner;
pub mod scrape;
pub mod selector;
pub mod sites;
pub mod variants;
pub mod wait;

pub use error::{Result, ScrapeError};
pub use page::Page;
pub use resolver::{resolve, Resolution, SelectorSet};
pub use scrape::{ExtractionResult, SpecSection, SpecValue};
