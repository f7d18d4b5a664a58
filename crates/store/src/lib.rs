//! Persistence for the widget chat backend.
//!
//! [`ChatStore`] is the relational side (threads, turns, attachment records,
//! assistant profiles); [`BlobStore`] holds attachment bytes.

pub mod blob;
pub mod sqlite;
pub mod store;

pub use blob::{BlobStore, LocalBlobStore};
pub use sqlite::SqliteChatStore;
pub use store::ChatStore;
