//! pak-core: Core library for patching game data tables against shipped PAK archives
//!
//! This library provides functionality to:
//! - Resolve which columns identify a row and which PAK ships a table
//! - Read baseline tables out of PAK (ZIP) archives
//! - Merge project rows into baseline data tables by signature
//! - Merge localization string tables by key precedence
//! - Write merged documents and collect per-table diagnostics

pub mod archive;
pub mod catalog;
pub mod error;
pub mod merger;
pub mod parser;
pub mod patcher;
pub mod report;
pub mod strings;
pub mod table;
pub mod writer;

pub use archive::{ArchiveCache, PakArchive};
pub use catalog::{
    BaselineSource, CatalogConfig, ColumnKind, PackageMapping, Signature, SignatureCatalog,
    TableSignature, WorkaroundConfig,
};
pub use error::{Error, Result};
pub use merger::{merge_documents, merge_rows, MergeReport, MergedTable};
pub use parser::{parse_table, parse_table_bytes, parse_table_str};
pub use patcher::{GameLayout, Patcher, TableJob, LOCALIZATION_ROW};
pub use report::{Phase, RunReport, TableOutcome, TableRecord, TableStats};
pub use strings::{merge_string_documents, merge_string_rows, MergedStrings, StringMergeReport};
pub use table::{Attributes, Element, Entry, Node, Row, TabularDocument};
pub use writer::{render, write_document, WriteMode};
