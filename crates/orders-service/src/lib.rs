//! The three client-facing services the daemon calls into: Creation,
//! Retrieval, Cancellation.
//!
//! Each service is a thin struct composing `PgPool` + `orders_cache::OrderCache`.
//! None of these wrap the Store behind a trait — free functions over
//! `&PgPool` are passed directly and composed here.

mod cancellation;
mod creation;
mod retrieval;

pub use cancellation::{CancelOutcome, CancellationService};
pub use creation::CreationService;
pub use retrieval::RetrievalService;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("order not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
    #[error("transaction could not be serialized after retrying")]
    Conflict,
}

impl From<orders_db::StoreError> for ServiceError {
    fn from(e: orders_db::StoreError) -> Self {
        match e {
            orders_db::StoreError::NotFound => ServiceError::NotFound,
            orders_db::StoreError::StorageUnavailable(inner) => {
                ServiceError::StorageUnavailable(inner)
            }
            orders_db::StoreError::Conflict => ServiceError::Conflict,
        }
    }
}
