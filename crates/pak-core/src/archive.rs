//! Read-only access to baseline PAK archives
//!
//! PAKs are ordinary ZIP files. A run typically reads many small tables out of
//! one large archive, so handles are cached per archive path in an
//! [`ArchiveCache`] owned by the caller and dropped when its phase ends.

use crate::catalog::fix_slashes;
use crate::error::{Error, Result};
use std::collections::hash_map::{self, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

/// An opened baseline archive
pub struct PakArchive {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl PakArchive {
    /// Open an archive and read its central directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| archive_error(path, None, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the archive
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Whether the archive holds a member (same lookup rules as [`read_member`](Self::read_member))
    pub fn contains(&self, member: &str) -> bool {
        self.resolve_name(member).is_some()
    }

    /// Read a member fully into memory
    ///
    /// Back slashes in `member` are treated as separators. An exact name match is
    /// preferred; otherwise the first entry matching ignoring ASCII case is used.
    pub fn read_member(&mut self, member: &str) -> Result<Vec<u8>> {
        let name = self.resolve_name(member).ok_or_else(|| Error::MemberNotFound {
            archive: self.path.clone(),
            member: fix_slashes(member),
        })?;

        let mut entry = self
            .archive
            .by_name(&name)
            .map_err(|e| archive_error(&self.path, Some(&name), e))?;
        // the declared size is untrusted
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::ArchiveCorrupt {
                archive: self.path.clone(),
                reason: format!("failed to read '{}': {}", name, e),
            })?;

        debug!(archive = %self.path.display(), member = %name, bytes = data.len(), "read archive member");
        Ok(data)
    }

    fn resolve_name(&self, member: &str) -> Option<String> {
        let wanted = fix_slashes(member);
        if self.archive.index_for_name(&wanted).is_some() {
            return Some(wanted);
        }
        self.archive
            .file_names()
            .find(|name| name.eq_ignore_ascii_case(&wanted))
            .map(str::to_string)
    }
}

fn archive_error(archive: &Path, member: Option<&str>, err: ZipError) -> Error {
    match (err, member) {
        (ZipError::FileNotFound, Some(member)) => Error::MemberNotFound {
            archive: archive.to_path_buf(),
            member: member.to_string(),
        },
        (ZipError::Io(source), Some(member)) => Error::ArchiveCorrupt {
            archive: archive.to_path_buf(),
            reason: format!("failed to read '{}': {}", member, source),
        },
        (ZipError::Io(source), None) => Error::FileRead {
            path: archive.to_path_buf(),
            source,
        },
        (other, _) => Error::ArchiveCorrupt {
            archive: archive.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Open archive handles keyed by path
///
/// Each archive is opened at most once for as long as the cache lives.
#[derive(Default)]
pub struct ArchiveCache {
    handles: HashMap<PathBuf, PakArchive>,
    opened: usize,
}

impl ArchiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the handle for an archive, opening it on first use
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut PakArchive> {
        let path = path.as_ref();
        match self.handles.entry(path.to_path_buf()) {
            hash_map::Entry::Occupied(slot) => Ok(slot.into_mut()),
            hash_map::Entry::Vacant(slot) => {
                debug!(archive = %path.display(), "opening archive");
                let archive = PakArchive::open(path)?;
                self.opened += 1;
                Ok(slot.insert(archive))
            }
        }
    }

    /// Read a member from an archive, opening the archive if needed
    pub fn read_member<P: AsRef<Path>>(&mut self, archive: P, member: &str) -> Result<Vec<u8>> {
        self.open(archive)?.read_member(member)
    }

    /// Number of archives currently held open
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of times an archive was actually opened during the cache's lifetime
    pub fn opened_total(&self) -> usize {
        self.opened
    }

    /// Close every held archive
    pub fn close_all(&mut self) {
        if !self.handles.is_empty() {
            debug!(count = self.handles.len(), "closing archives");
        }
        self.handles.clear();
    }
}
