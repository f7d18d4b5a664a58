//! Shared types for the widget chat backend: the error taxonomy, the
//! configuration model and the persisted data model.

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, Result};
