//! Table configuration facade
//!
//! `TableConfig` is the public surface of the store: it loads a
//! validated snapshot of the table's property file and exposes typed
//! accessors over the reserved entries. Snapshots are immutable; callers
//! wanting fresh state load again. Mutations live in [`crate::update`].
//!
//! The read path is a bounded-retry fallback chain: decode the primary,
//! fall back to the backup, sleep a short exponential backoff, repeat.
//! Reads never modify the pair, so a reader can always race a writer
//! safely; an in-flight rewrite keeps a valid pre-update image in the
//! backup for exactly the window in which the primary may be torn.

use crate::codec;
use crate::fs::{self, FileSystem};
use lakeio_common::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Primary config file name within the metadata directory.
pub const PROPERTIES_FILE: &str = "hoodie.properties";
/// Staging copy holding the pre-update image while a rewrite is in flight.
pub const PROPERTIES_FILE_BACKUP: &str = "hoodie.properties.backup";

/// Table identity. Required at create.
pub const TABLE_NAME_KEY: &str = "hoodie.table.name";
/// Storage layout of the table.
pub const TABLE_TYPE_KEY: &str = "hoodie.table.type";
/// On-disk format version.
pub const TABLE_VERSION_KEY: &str = "hoodie.table.version";
/// Timeline layout version.
pub const TIMELINE_LAYOUT_VERSION_KEY: &str = "hoodie.timeline.layout.version";
/// Subdirectory of the metadata folder holding the archived timeline.
pub const ARCHIVELOG_FOLDER_KEY: &str = "hoodie.archivelog.folder";
/// Field used to pick a winner among records sharing a key.
pub const PRECOMBINE_FIELD_KEY: &str = "hoodie.table.precombine.field";

const DEFAULT_TABLE_VERSION: u32 = 5;
const DEFAULT_TIMELINE_LAYOUT_VERSION: u32 = 1;
const DEFAULT_ARCHIVELOG_FOLDER: &str = "archived";

/// Read attempts before a load reports failure. A reader racing a
/// rewrite normally succeeds on the first or second attempt; the rest of
/// the budget covers slow substrates.
const LOAD_ATTEMPTS: u32 = 5;

/// Storage layout of a managed table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableType {
    /// Rewrites file groups in place on update.
    CopyOnWrite,
    /// Appends row-level deltas that are merged at read time.
    MergeOnRead,
}

impl TableType {
    /// The on-disk spelling of this table type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CopyOnWrite => "COPY_ON_WRITE",
            Self::MergeOnRead => "MERGE_ON_READ",
        }
    }
}

impl FromStr for TableType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "COPY_ON_WRITE" => Ok(Self::CopyOnWrite),
            "MERGE_ON_READ" => Ok(Self::MergeOnRead),
            other => Err(Error::invalid_config(format!(
                "unrecognized table type: {other}"
            ))),
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path of the primary config file under `dir`.
#[must_use]
pub fn primary_path(dir: &Path) -> PathBuf {
    dir.join(PROPERTIES_FILE)
}

/// Path of the backup config file under `dir`.
#[must_use]
pub fn backup_path(dir: &Path) -> PathBuf {
    dir.join(PROPERTIES_FILE_BACKUP)
}

/// Properties injected under the caller's map at create time.
pub(crate) fn default_properties() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            TABLE_TYPE_KEY.to_string(),
            TableType::CopyOnWrite.as_str().to_string(),
        ),
        (
            TABLE_VERSION_KEY.to_string(),
            DEFAULT_TABLE_VERSION.to_string(),
        ),
        (
            TIMELINE_LAYOUT_VERSION_KEY.to_string(),
            DEFAULT_TIMELINE_LAYOUT_VERSION.to_string(),
        ),
        (
            ARCHIVELOG_FOLDER_KEY.to_string(),
            DEFAULT_ARCHIVELOG_FOLDER.to_string(),
        ),
    ])
}

/// Immutable snapshot of a table's configuration.
#[derive(Clone, Debug)]
pub struct TableConfig {
    props: BTreeMap<String, String>,
}

impl TableConfig {
    /// Load the current valid configuration from `dir`.
    ///
    /// Decodes the primary file and falls back to the backup, retrying
    /// with a short backoff to ride out an in-flight rewrite. `defaults`
    /// merge under the loaded entries, `overrides` over them; neither is
    /// written back.
    ///
    /// # Errors
    ///
    /// `NotFound` if neither file exists, `InvalidConfig` if files exist
    /// but none validates within the retry budget, `Io` for substrate
    /// failures other than a missing file.
    pub fn load(
        fs: &dyn FileSystem,
        dir: &Path,
        defaults: Option<&BTreeMap<String, String>>,
        overrides: Option<&BTreeMap<String, String>>,
    ) -> Result<Self> {
        let primary = primary_path(dir);
        let backup = backup_path(dir);

        for attempt in 0..LOAD_ATTEMPTS {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(1 << attempt));
            }

            match try_read(fs, &primary) {
                Ok(props) => return Ok(Self::assemble(props, defaults, overrides)),
                Err(err) if recoverable(&err) => {
                    debug!(attempt, %err, "primary unreadable, trying backup");
                }
                Err(err) => return Err(err),
            }

            match try_read(fs, &backup) {
                Ok(props) => {
                    debug!(attempt, "loaded pre-update image from backup");
                    return Ok(Self::assemble(props, defaults, overrides));
                }
                Err(err) if recoverable(&err) => {
                    debug!(attempt, %err, "backup unreadable too");
                }
                Err(err) => return Err(err),
            }
        }

        // Retry budget exhausted. An empty directory is a missing table;
        // anything else is a config that never validated.
        if !fs.exists(&primary)? && !fs.exists(&backup)? {
            return Err(Error::NotFound { path: primary });
        }
        warn!(dir = %dir.display(), "no valid config after {LOAD_ATTEMPTS} attempts");
        Err(Error::invalid_config(format!(
            "could not load a valid config from {}",
            dir.display()
        )))
    }

    fn assemble(
        props: BTreeMap<String, String>,
        defaults: Option<&BTreeMap<String, String>>,
        overrides: Option<&BTreeMap<String, String>>,
    ) -> Self {
        let mut merged = defaults.cloned().unwrap_or_default();
        merged.extend(props);
        if let Some(overrides) = overrides {
            merged.extend(overrides.clone());
        }
        Self { props: merged }
    }

    /// Table identity.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the entry is missing.
    pub fn table_name(&self) -> Result<&str> {
        self.props
            .get(TABLE_NAME_KEY)
            .map(String::as_str)
            .ok_or_else(|| Error::invalid_config(format!("{TABLE_NAME_KEY} is not set")))
    }

    /// Storage layout of the table.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on an unrecognized value.
    pub fn table_type(&self) -> Result<TableType> {
        match self.props.get(TABLE_TYPE_KEY) {
            Some(raw) => raw.parse(),
            None => Ok(TableType::CopyOnWrite),
        }
    }

    /// On-disk format version.
    pub fn table_version(&self) -> Result<u32> {
        self.parse_u32(TABLE_VERSION_KEY, DEFAULT_TABLE_VERSION)
    }

    /// Timeline layout version.
    pub fn timeline_layout_version(&self) -> Result<u32> {
        self.parse_u32(TIMELINE_LAYOUT_VERSION_KEY, DEFAULT_TIMELINE_LAYOUT_VERSION)
    }

    /// Conflict-resolution field, if configured.
    #[must_use]
    pub fn precombine_field(&self) -> Option<&str> {
        self.props.get(PRECOMBINE_FIELD_KEY).map(String::as_str)
    }

    /// Subdirectory of the archived timeline.
    #[must_use]
    pub fn archivelog_folder(&self) -> &str {
        self.props
            .get(ARCHIVELOG_FOLDER_KEY)
            .map_or(DEFAULT_ARCHIVELOG_FOLDER, String::as_str)
    }

    /// Look up an arbitrary entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    /// Number of entries, the checksum entry included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Whether the snapshot holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Full entry view.
    #[must_use]
    pub fn props(&self) -> &BTreeMap<String, String> {
        &self.props
    }

    /// Consume the snapshot into its underlying map.
    pub(crate) fn into_props(self) -> BTreeMap<String, String> {
        self.props
    }

    fn parse_u32(&self, key: &str, default: u32) -> Result<u32> {
        match self.props.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::invalid_config(format!("{key} is not an integer: {raw}"))),
            None => Ok(default),
        }
    }
}

fn try_read(fs: &dyn FileSystem, path: &Path) -> Result<BTreeMap<String, String>> {
    let bytes = fs::read_bytes(fs, path)?;
    codec::decode(&bytes)
}

/// Failures the fallback chain absorbs: a missing file or one that does
/// not validate. Everything else is a substrate fault to surface as is.
fn recoverable(err: &Error) -> bool {
    err.is_not_found() || err.is_invalid_config()
}
