//! Log records, node identities, catalog metadata, and time bounds.

pub mod catalog;
pub mod event;
pub mod time;

pub use catalog::{Catalog, CollectionInfo, CollectionKind, GraphInfo};
pub use event::{Event, EventKind, collection_of, in_collection};
