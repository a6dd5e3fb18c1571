//! Recovery protocol
//!
//! Restores the invariant "primary exists and is valid, backup absent"
//! from any intermediate state a crashed rewrite can leave behind. The
//! backup file is an intent log: its presence means a rewrite was in
//! flight, and a valid backup holds the pre-update image. A valid
//! primary dominates any backup; a valid backup dominates an invalid or
//! absent primary. When neither side validates there is nothing to
//! restore from, and the pair is left untouched for the read path to
//! report.
//!
//! Invoked at the start of every mutation and exposed standalone. Reads
//! never invoke it: the read path is a passive fallback chain, so a
//! corrupt primary stays on disk until the next writer comes along.

use crate::codec;
use crate::fs::{self, FileSystem};
use lakeio_common::Result;
use std::path::Path;
use tracing::{debug, warn};

/// Validation state of one side of the pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileState {
    Absent,
    Valid,
    Invalid,
}

/// Reconcile `{primary, backup}` after a possible crash.
///
/// Idempotent: a second invocation finds a healthy pair and does
/// nothing. Tolerates a concurrent writer racing the standalone form;
/// a repair step whose source vanished underneath is benign because the
/// pair is re-inspected on the next invocation.
pub fn recover_if_needed(fs: &dyn FileSystem, primary: &Path, backup: &Path) -> Result<()> {
    match (inspect(fs, primary)?, inspect(fs, backup)?) {
        // Healthy
        (FileState::Valid, FileState::Absent) => {}

        // Rewrite completed before the crash; the staging copy is stale
        (FileState::Valid, _) => {
            debug!(backup = %backup.display(), "dropping stale backup");
            fs.delete(backup)?;
        }

        // Rewrite died mid-write; the pre-update image wins. The rename
        // replaces the corrupt primary in one step.
        (FileState::Invalid, FileState::Valid) => {
            warn!(
                primary = %primary.display(),
                "primary failed validation, restoring pre-update image from backup"
            );
            promote(fs, backup, primary)?;
        }

        // Rewrite died between staging and the new write
        (FileState::Absent, FileState::Valid) => {
            debug!(
                primary = %primary.display(),
                "primary missing, restoring pre-update image from backup"
            );
            promote(fs, backup, primary)?;
        }

        // Nothing restorable on either side; the read path reports it
        (FileState::Invalid | FileState::Absent, FileState::Invalid | FileState::Absent) => {}
    }
    Ok(())
}

/// Classify one file: absent, decodable, or present but failing decode.
fn inspect(fs: &dyn FileSystem, path: &Path) -> Result<FileState> {
    if !fs.exists(path)? {
        return Ok(FileState::Absent);
    }
    match fs::read_bytes(fs, path) {
        Ok(bytes) => match codec::decode(&bytes) {
            Ok(_) => Ok(FileState::Valid),
            Err(_) => Ok(FileState::Invalid),
        },
        // Vanished between the existence check and the open
        Err(err) if err.is_not_found() => Ok(FileState::Absent),
        Err(err) => Err(err),
    }
}

fn promote(fs: &dyn FileSystem, backup: &Path, primary: &Path) -> Result<()> {
    match fs.rename(backup, primary) {
        Ok(()) => Ok(()),
        // Another recovery invocation won the rename
        Err(err) if err.is_not_found() => {
            debug!(backup = %backup.display(), "backup vanished during promotion");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{read_bytes, write_bytes, LocalFileSystem};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn sample_encoded() -> Vec<u8> {
        codec::encode(&BTreeMap::from([(
            "hoodie.table.name".to_string(),
            "test-table".to_string(),
        )]))
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let primary = dir.path().join("hoodie.properties");
        let backup = dir.path().join("hoodie.properties.backup");
        (dir, primary, backup)
    }

    #[test]
    fn test_healthy_pair_untouched() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;
        let encoded = sample_encoded();
        write_bytes(&fs, &primary, &encoded).unwrap();

        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert_eq!(read_bytes(&fs, &primary).unwrap(), encoded);
        assert!(!fs.exists(&backup).unwrap());
    }

    #[test]
    fn test_stale_backup_deleted() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;
        let encoded = sample_encoded();
        write_bytes(&fs, &primary, &encoded).unwrap();
        write_bytes(&fs, &backup, &encoded).unwrap();

        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert!(fs.exists(&primary).unwrap());
        assert!(!fs.exists(&backup).unwrap());
    }

    #[test]
    fn test_invalid_primary_restored_from_backup() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;
        let encoded = sample_encoded();
        write_bytes(&fs, &primary, b"torn mid-wri").unwrap();
        write_bytes(&fs, &backup, &encoded).unwrap();

        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert_eq!(read_bytes(&fs, &primary).unwrap(), encoded);
        assert!(!fs.exists(&backup).unwrap());
    }

    #[test]
    fn test_missing_primary_restored_from_backup() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;
        let encoded = sample_encoded();
        write_bytes(&fs, &backup, &encoded).unwrap();

        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert_eq!(read_bytes(&fs, &primary).unwrap(), encoded);
        assert!(!fs.exists(&backup).unwrap());
    }

    #[test]
    fn test_both_invalid_left_as_is() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;
        write_bytes(&fs, &primary, b"no checksum here").unwrap();
        write_bytes(&fs, &backup, b"none here either").unwrap();

        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert!(fs.exists(&primary).unwrap());
        assert!(fs.exists(&backup).unwrap());
    }

    #[test]
    fn test_invalid_primary_no_backup_left_as_is() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;
        write_bytes(&fs, &primary, b"no checksum here").unwrap();

        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert!(fs.exists(&primary).unwrap());
    }

    #[test]
    fn test_neither_exists_is_a_no_op() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;

        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert!(!fs.exists(&primary).unwrap());
        assert!(!fs.exists(&backup).unwrap());
    }

    #[test]
    fn test_recovery_is_idempotent() {
        let (_dir, primary, backup) = setup();
        let fs = LocalFileSystem;
        let encoded = sample_encoded();
        write_bytes(&fs, &backup, &encoded).unwrap();

        recover_if_needed(&fs, &primary, &backup).unwrap();
        recover_if_needed(&fs, &primary, &backup).unwrap();
        assert_eq!(read_bytes(&fs, &primary).unwrap(), encoded);
        assert!(!fs.exists(&backup).unwrap());
    }
}
