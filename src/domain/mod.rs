//! Domain types for stored documents.
//!
//! [`Task`] and [`DeliveryToken`] are explicit, validated schemas for the
//! two collections the pipeline reads. Decoding goes through
//! `from_document`, which turns malformed records into
//! [`StoreError::Malformed`](crate::error::StoreError::Malformed) at the
//! storage boundary instead of failing deep inside a dispatch run.

pub mod task;
pub mod timestamp;
pub mod token;

pub use task::Task;
pub use token::DeliveryToken;
