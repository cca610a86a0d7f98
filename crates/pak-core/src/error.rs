//! Error types for pak-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pak-core
#[derive(Debug, Error)]
pub enum Error {
    /// No catalog entry covers the table
    #[error("cannot find signature by path: {0}")]
    UnknownSignature(String),

    /// No package prefix covers the table's relative path
    #[error("cannot find PAK file by path: {0}")]
    UnknownArchiveMapping(String),

    /// The baseline archive has no entry with the requested name
    #[error("archive '{archive}' has no member '{member}'")]
    MemberNotFound { archive: PathBuf, member: String },

    /// The baseline archive could not be read
    #[error("archive '{archive}' is corrupt: {reason}")]
    ArchiveCorrupt { archive: PathBuf, reason: String },

    /// More than one baseline row carries the same signature values
    #[error(
        "found {count} baseline rows matching [{key}] in '{table}': \
         duplicate row in the source or signature too broad"
    )]
    AmbiguousSignature {
        table: String,
        key: String,
        count: usize,
    },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a merged document
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Markup could not be parsed
    #[error("failed to parse XML '{source_name}': {message}")]
    Xml { source_name: String, message: String },

    /// The project document has nothing to merge
    #[error("cannot find rows to merge in '{0}'")]
    NoRows(String),

    /// A localization row does not have two or three cells
    #[error("string row '{key}' in '{table}' has {cells} cells, expected 2 or 3")]
    MalformedStringRow {
        table: String,
        key: String,
        cells: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must stop the whole run rather than just the current table
    pub fn halts_run(&self) -> bool {
        matches!(
            self,
            Error::UnknownSignature(_)
                | Error::UnknownArchiveMapping(_)
                | Error::AmbiguousSignature { .. }
        )
    }

    pub(crate) fn xml(source_name: &str, err: impl std::fmt::Display) -> Self {
        Error::Xml {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_halt_run() {
        assert!(Error::UnknownSignature("rpg/buff.xml".into()).halts_run());
        assert!(Error::UnknownArchiveMapping("Libs/UI/x.xml".into()).halts_run());
        assert!(Error::AmbiguousSignature {
            table: "buff.xml".into(),
            key: "buff_id=1".into(),
            count: 2,
        }
        .halts_run());
    }

    #[test]
    fn test_table_errors_do_not_halt_run() {
        let missing = Error::MemberNotFound {
            archive: PathBuf::from("Tables.pak"),
            member: "Libs/Tables/rpg/buff.xml".into(),
        };
        assert!(!missing.halts_run());
        assert!(!Error::NoRows("buff.xml".into()).halts_run());

        let write = Error::FileWrite {
            path: PathBuf::from("out/buff.xml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!write.halts_run());
        assert!(write.to_string().contains("out/buff.xml"));
    }
}
