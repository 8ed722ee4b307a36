//! rewind-core library.
//!
//! Point-in-time reads over an append-only event log. An addressing path is
//! resolved to a [`scope`], compiled into a [`plan`], executed against an
//! [`store::EventStore`], and the located hop paths are turned back into
//! documents by [`reconstruct`]. [`filter()`] narrows the same listing with a
//! [`expr::Predicate`] over document content.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at module seams, `anyhow::Result`
//!   for store and I/O plumbing.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod expr;
pub mod filter;
pub mod model;
pub mod pattern;
pub mod plan;
pub mod reconstruct;
pub mod scope;
pub mod show;
pub mod store;

pub use expr::Predicate;
pub use filter::{FilterOptions, filter};
pub use plan::{GroupBy, Plan, ShowOptions, SortDir};
pub use show::{ShowError, ShowOutput, show};
