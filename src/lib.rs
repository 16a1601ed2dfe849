//! file-sorter - sort files into folders named after an identifier in their name
//!
//! This library extracts a structured identifier (such as `09-014-1234-56-789`)
//! from file names, moves each matching file into an `output/<identifier>`
//! folder, and keeps a moved-file counter and an error log between runs.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod identifier;
pub mod output;
pub mod sorter;
pub mod store;

pub use config::{ConfigError, SorterConfig};
pub use dispatcher::{
    BatchReport, DirectoryEntry, FileSystem, SortError, StdFileSystem, sort_files_into_folders,
};
pub use identifier::{IdentifierMatcher, IdentifierRule, extract_identifier};
pub use sorter::{BatchState, Sorter};
pub use store::{JsonFileStore, MemoryStore, StateStore};

pub use cli::{CliOptions, SortCommand, run_cli};
