//! Yearly fiscal result (revenue minus expense) from two locale formatted
//! CSV exports, filtered by year and prepared for charting and tabular
//! presentation.

pub mod args;
pub mod cache;
pub mod engine;
pub mod errors;
pub mod format;
pub mod merge;
pub mod parser;
pub mod range;
pub mod schema;
