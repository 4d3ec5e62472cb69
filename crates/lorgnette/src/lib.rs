//! Client engine for a compiler under inspection.
//!
//! The remote compiler pauses at breakpoints and exposes a small HTTP debug
//! surface: a full breakpoint listing, a per-index snapshot dump, and a
//! "continue" trigger. This crate polls that surface and maintains the
//! client-side model behind a graph viewer:
//!
//! - an append-only [`history::HistoryStore`] of every breakpoint seen,
//!   with a write-once snapshot cache per entry,
//! - a tri-state connection-health indicator fed by request outcomes,
//! - a derived active view (active breakpoint → active method → rendered
//!   markup) that is recomputed whenever any of its inputs change.
//!
//! All mutable state is owned by a single [`session::Session`] actor task;
//! HTTP fetches and graph layout run as side tasks whose completions come
//! back as messages, so late results can be checked for staleness before
//! they are allowed to touch anything. Consumers observe the model through
//! a `tokio::sync::watch` receiver of [`session::ViewState`] and drive it
//! through [`session::SessionHandle`].

pub mod api;
pub mod history;
pub mod layout;
pub mod session;
pub mod view;

pub use api::{ApiClient, HealthCell};
pub use layout::{DotProcessLayout, LayoutEngine};
pub use session::{DEFAULT_POLL_INTERVAL, Session, SessionConfig, SessionHandle, ViewState};
