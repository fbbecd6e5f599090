//! Core types and trait definitions for the Ara audit service.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the domain model, the static criteria catalog, and the pure computations
//! (collection reconciliation, result-matrix synthesis, report aggregation)
//! that storage backends and the API layer build on.

pub mod audit;
pub mod criteria;
pub mod error;
pub mod lifecycle;
pub mod reconcile;
pub mod report;
pub mod result;
pub mod store;
pub mod token;

pub use error::{Error, Result};
