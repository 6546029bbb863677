//! Grouped sales summaries over delimited retail datasets.
//!
//! A run is a straight line: [`loader`] reads the sales table (trying a list
//! of text encodings), [`join`] optionally adds a region from a store
//! locations table, and each configured report goes through [`aggregate`],
//! [`derive`], [`rank`] and [`report`].

pub mod aggregate;
pub mod config;
pub mod derive;
pub mod error;
pub mod join;
pub mod loader;
pub mod pipeline;
pub mod rank;
pub mod report;

pub use error::{ReportError, Result};
