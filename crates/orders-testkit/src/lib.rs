//! Shared integration-test helpers for the order write-path service: pool
//! bootstrap + migration, fixture builders, and a fake bus double.
//!
//! Centralized once rather than repeated per test file, since the scenario
//! list is large enough that per-file `make_pool` boilerplate would
//! dominate the tests themselves.

mod fake_bus;
mod fixtures;
mod pool;

pub use fake_bus::FakeBus;
pub use fixtures::{sample_new_order, sample_new_order_with_amounts};
pub use pool::{require_database_url, test_pool};
