//! entrust-core: Evaluation lifecycle, viewer buckets and entrustment aggregation.
//!
//! This crate defines the data model, the two-party evaluation state machine,
//! and the read-side aggregation that the rest of entrust builds on.

pub mod aggregate;
pub mod catalogue;
pub mod dataset;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod overview;
pub mod report;
pub mod scale;
pub mod service;
pub mod store;
pub mod traits;
pub mod viewer;
