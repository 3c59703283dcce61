//! make-cbz - package the images of a directory into a comic book archive
//!
//! This library classifies files by content, writes the images of a directory
//! into a store-only zip archive in version-aware order, removes the packed
//! originals, cleans up OS sentinel files and emptied directories, and leaves
//! the archive next to whatever non-image files remain.

pub mod archive_builder;
pub mod classify;
pub mod cli;
pub mod config;
pub mod output;
pub mod version_sort;

pub use archive_builder::{
    ArchiveBuilder, PackError, PackOutcome, PackPlan, PackReport, PackResult, TargetDir,
};
pub use classify::{Classification, Classifier, ContentSniffer, InferSniffer};
pub use config::{CompiledConfig, ConfigError, PackConfig};

pub use cli::{Cli, PackCommand, run_cli};
