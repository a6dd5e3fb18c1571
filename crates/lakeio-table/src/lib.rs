//! LakeIO Table - Durable table-configuration store
//!
//! Persists the identity and schema-adjacent metadata of a managed lake
//! table as a small property file inside the table's metadata directory
//! (`hoodie.properties`), with a crash-consistent rewrite protocol that
//! needs only create-overwrite and rename from the underlying store.
//!
//! # Update protocol
//!
//! Rewrites stage the pre-update image to `hoodie.properties.backup`,
//! write the new primary, then drop the backup. Every mutation begins
//! with a recovery pass over the pair, so a crash at any point leaves
//! the table readable with either the pre- or post-update state. A torn
//! primary is never mistaken for a valid one: each file carries a CRC32C
//! digest over its entries.
//!
//! # Concurrency
//!
//! At most one writer per table directory (enforced externally);
//! arbitrarily many readers. Readers never modify files. A reader racing
//! a rewrite falls back to the backup image and retries a bounded number
//! of times before reporting failure.

pub mod codec;
pub mod config;
pub mod fs;
pub mod recovery;
pub mod update;

pub use config::{TableConfig, TableType};
pub use fs::{FileSystem, LocalFileSystem};
pub use lakeio_common::{Error, Result};
pub use recovery::recover_if_needed;
pub use update::{create, delete_keys, update};
