//! Update protocol
//!
//! Mutations rewrite the primary file through a staging dance so that a
//! crash at any point leaves a recoverable pair:
//!
//! 1. recover anything a previous crash left behind
//! 2. load the current state
//! 3. rename primary -> backup (the pre-update image)
//! 4. write the new primary
//! 5. read the new primary back and verify its digest
//! 6. delete the backup
//!
//! The backup holds a valid pre-update image for the whole window in
//! which the primary is absent or possibly torn, so readers always have
//! one consistent side to fall back to and recovery can roll either way.

use crate::codec;
use crate::config::{self, TableConfig};
use crate::fs::{self, FileSystem};
use crate::recovery;
use lakeio_common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Initialize the config file for a new table.
///
/// Merges `props` over the default property set and writes the primary
/// directly; there is no prior state to stage.
///
/// # Errors
///
/// `AlreadyExists` if the directory already holds a primary file,
/// `InvalidConfig` if `props` lacks the table name.
pub fn create(fs: &dyn FileSystem, dir: &Path, props: &BTreeMap<String, String>) -> Result<()> {
    let primary = config::primary_path(dir);
    if fs.exists(&primary)? {
        return Err(Error::AlreadyExists { path: primary });
    }
    let Some(name) = props.get(config::TABLE_NAME_KEY) else {
        return Err(Error::invalid_config(format!(
            "{} is required at create",
            config::TABLE_NAME_KEY
        )));
    };

    let mut merged = config::default_properties();
    merged.extend(props.clone());
    fs::write_bytes(fs, &primary, &codec::encode(&merged))?;

    info!(table = %name, dir = %dir.display(), "created table config");
    Ok(())
}

/// Merge-assign `delta` into the current config and rewrite it.
pub fn update(fs: &dyn FileSystem, dir: &Path, delta: &BTreeMap<String, String>) -> Result<()> {
    modify(fs, dir, |props| {
        for (key, value) in delta {
            props.insert(key.clone(), value.clone());
        }
    })
}

/// Remove `keys` from the current config and rewrite it.
///
/// Keys that are not present are silently ignored.
pub fn delete_keys(fs: &dyn FileSystem, dir: &Path, keys: &BTreeSet<String>) -> Result<()> {
    modify(fs, dir, |props| {
        for key in keys {
            props.remove(key);
        }
    })
}

/// The swap protocol shared by `update` and `delete_keys`.
fn modify(
    fs: &dyn FileSystem,
    dir: &Path,
    mutate: impl FnOnce(&mut BTreeMap<String, String>),
) -> Result<()> {
    let primary = config::primary_path(dir);
    let backup = config::backup_path(dir);

    // 1. Roll forward or back anything a previous crash left behind
    recovery::recover_if_needed(fs, &primary, &backup)?;

    // 2. Load the current state and apply the mutation
    let current = TableConfig::load(fs, dir, None, None)?;
    let mut props = current.into_props();
    props.remove(codec::CHECKSUM_KEY);
    mutate(&mut props);
    let encoded = codec::encode(&props);

    // 3. Stage the pre-update image; reads go to the backup until the
    //    new primary is in place
    fs.rename(&primary, &backup)?;

    // 4. Write the new primary
    fs::write_bytes(fs, &primary, &encoded)?;

    // 5. Read back and verify before discarding the pre-update image
    let written = fs::read_bytes(fs, &primary)?;
    let reread = codec::decode(&written)?;
    if codec::digest(&reread) != codec::digest(&props) {
        return Err(Error::invalid_config(format!(
            "rewrite of {} did not read back intact",
            primary.display()
        )));
    }

    // 6. Drop the staging copy
    fs.delete(&backup)?;

    debug!(dir = %dir.display(), entries = props.len(), "rewrote table config");
    Ok(())
}
