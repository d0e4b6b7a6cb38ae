//! # nits-store — Cache Store Layer
//!
//! Three independently keyed stores back the binary cache:
//!
//! - [`BlobStore`]: compressed NAR bytes, keyed by `{hash}-{ext}`.
//! - [`MetadataStore`]: one narinfo document per store hash.
//! - [`AccessLog`]: one entry per store hash whose last-write time records
//!   when the artifact was last touched.
//!
//! There is no transaction spanning the stores. Each single put, get, or
//! delete on one key in one store is atomic; cross-store sequences belong to
//! the callers.
//!
//! ## Backends
//!
//! - [`backend::memory`]: `parking_lot` maps, for tests and ephemeral caches.
//! - [`backend::fs`]: one directory per collection, temp-file-then-rename
//!   writes, access time recorded as file modification time.
//!
//! All timestamps come from an injected [`Clock`].

pub mod backend;
pub mod bundle;
pub mod clock;
pub mod error;
pub mod key;
pub mod store;

pub use bundle::{Collections, Stores};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::StoreError;
pub use store::{
    AccessLog, BlobObject, BlobReader, BlobStore, MetadataEntry, MetadataEvent, MetadataScan,
    MetadataStore, Operation,
};
