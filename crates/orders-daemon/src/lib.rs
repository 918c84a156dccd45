//! orders-daemon: the HTTP surface for the order write-path service.
//!
//! Thin by design: `routes.rs` holds handlers, `state.rs` holds the shared
//! `AppState`, `api_types.rs` holds wire DTOs, `validation.rs` holds the
//! request decode/validate layer that sits outside the core service crate.
//! `main.rs` wires everything together and starts `axum::serve`.

pub mod api_types;
pub mod routes;
pub mod state;
pub mod validation;
