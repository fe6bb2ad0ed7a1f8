//! Backing-store provisioning and record framing.
//!
//! A store is one plain append-only file of newline-delimited records: each
//! record is the serialized encoding of one value, terminated by `\n`. No
//! header, no index, no checksum. Files are named by construction timestamp
//! so every queue instance gets a fresh, empty store.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::clock::Clock;
use crate::{Error, Result};

/// Record delimiter. The JSON encoding escapes control characters, so this
/// byte never appears inside an encoded record.
pub const DELIMITER: u8 = b'\n';

const PROVISION_ATTEMPTS: u32 = 8;

/// Creates a fresh, empty store file under `root`.
///
/// The directory is created if missing. The file name carries a nanosecond
/// timestamp; on a name collision (two constructions inside the same clock
/// tick) the attempt is retried with a fresh timestamp.
///
/// # Errors
///
/// - `Error::Io`: directory or file creation failed.
pub(crate) fn provision(root: &Path, clock: &dyn Clock) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;

    let mut attempts = 0;
    loop {
        let path = root.join(format!("queue_{}.jsonl", clock.now()));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                attempts += 1;
                if attempts >= PROVISION_ATTEMPTS {
                    return Err(err.into());
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Appends one framed record (payload plus trailing delimiter) to the store.
///
/// The record is written with a single `write_all` on a file opened in append
/// mode; the caller serializes appends, so records land whole and previously
/// written bytes are never disturbed.
pub(crate) fn append_record(path: &Path, record: &[u8]) -> Result<()> {
    debug_assert_eq!(record.last(), Some(&DELIMITER));
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(record)?;
    Ok(())
}

/// Reads the record starting at byte `offset`, delimiter included.
///
/// The returned length is exactly the number of bytes the cursor must advance
/// by after a successful decode.
///
/// # Errors
///
/// - `Error::Io`: the store cannot be opened or read.
/// - `Error::Corrupt`: `offset` lies beyond the end of the store.
/// - `Error::EndOfData`: no bytes at `offset`, or a trailing fragment that
///   has not received its delimiter yet.
pub(crate) fn read_record_at(path: &Path, offset: u64) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    if offset > len {
        return Err(Error::Corrupt("read offset beyond end of store"));
    }

    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset))?;

    let mut record = Vec::new();
    reader.read_until(DELIMITER, &mut record)?;
    if record.last() != Some(&DELIMITER) {
        // Nothing unread, or a partially visible record. Either way there is
        // no complete record to consume yet.
        return Err(Error::EndOfData);
    }
    Ok(record)
}
