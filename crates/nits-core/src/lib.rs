//! # nits-core — Foundational Types for the Binary Cache
//!
//! Defines the vocabulary shared by every other crate in the workspace:
//! which compression variants a blob may carry, how blobs are keyed, how
//! narinfo metadata is parsed and re-serialized, and what the cache
//! advertises at `/nix-cache-info`.
//!
//! ## Key Design Principles
//!
//! 1. **Validated newtypes.** `StoreHash` and `NarKey` can only be built
//!    through constructors that reject malformed input, so a handler holding
//!    a `NarKey` never has to re-check it before touching a store.
//!
//! 2. **Lossless narinfo.** `NarInfo` keeps every line it does not interpret.
//!    The cache only ever adds signatures; it never drops fields it does not
//!    understand.
//!
//! 3. **One compression table.** `Compression` owns both spellings (narinfo
//!    name and URL extension). Unknown tokens are a validation error.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `nits-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod cache_info;
pub mod compression;
pub mod error;
pub mod key;
pub mod narinfo;

pub use cache_info::CacheInfo;
pub use compression::Compression;
pub use error::{NarInfoError, ValidationError};
pub use key::{NarKey, StoreHash};
pub use narinfo::{NarInfo, NarSignature};
