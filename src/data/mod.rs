// src/data/mod.rs

//! Datasets and the data registry.
//!
//! - [`value`] holds the opaque [`Value`] passed between nodes.
//! - [`dataset`] defines the capability contract every dataset handle
//!   implements, plus the in-memory implementation backing feed overrides.
//! - [`registry`] maps logical names to dataset handles.

pub mod dataset;
pub mod registry;
pub mod value;

pub use dataset::{Dataset, MemoryDataset, Persistence};
pub use registry::DataRegistry;
pub use value::Value;

/// Marker separating a base name from its transcoding variant, as in
/// `ds@parquet`.
pub const TRANSCODING_SEPARATOR: char = '@';

/// Strip the transcoding variant from a dataset name.
///
/// Entries named `ds@save` and `ds@load` denote the same underlying
/// artifact `ds` through different physical encodings; dependency matching
/// and release coordination both work on the base identity.
pub fn base_name(name: &str) -> &str {
    match name.split_once(TRANSCODING_SEPARATOR) {
        Some((base, _variant)) => base,
        None => name,
    }
}
