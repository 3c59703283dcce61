/// Image archive packaging.
///
/// This module turns a directory of scanned pages into a store-only comic
/// book archive. Image files (identified by content) are packed under
/// `<name>/...`, removed from disk, OS sentinel files and emptied directories
/// are cleaned up, and the archive ends up next to whatever non-image files
/// remain.
///
/// Every filesystem call receives an explicit absolute path; the process
/// working directory is never changed.
use crate::classify::{Classification, Classifier};
use crate::config::{CompiledConfig, ConfigError};
use crate::version_sort::{path_version_cmp, slash_path};
use chrono::{Datelike, Local, Timelike};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Errors that can occur while packaging a directory.
#[derive(Debug)]
pub enum PackError {
    /// The argument does not name an existing directory.
    NotADirectory { path: PathBuf },
    /// An archive with the target name already exists in the parent directory.
    DestinationExists { path: PathBuf },
    /// The written archive could not be confirmed.
    VerificationFailed { path: PathBuf, reason: String },
    /// The directory name is not valid UTF-8 and cannot prefix archive entries.
    UnsupportedName { path: PathBuf },
    /// The zip writer reported an error.
    ArchiveWrite { path: PathBuf, reason: String },
    /// A filesystem operation failed.
    Io { path: PathBuf, source: io::Error },
    /// Configuration could not be loaded or compiled.
    Config(ConfigError),
}

impl PackError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotADirectory { .. } => 1,
            Self::DestinationExists { .. } => 2,
            Self::VerificationFailed { .. } => 3,
            Self::UnsupportedName { .. } | Self::ArchiveWrite { .. } | Self::Io { .. } => 4,
            Self::Config(_) => 5,
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for PackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotADirectory { path } => {
                write!(f, "Not a directory: {}", path.display())
            }
            Self::DestinationExists { path } => {
                write!(f, "Archive already exists: {}", path.display())
            }
            Self::VerificationFailed { path, reason } => {
                write!(
                    f,
                    "Could not verify archive {}: {}",
                    path.display(),
                    reason
                )
            }
            Self::UnsupportedName { path } => {
                write!(f, "Directory name is not valid UTF-8: {}", path.display())
            }
            Self::ArchiveWrite { path, reason } => {
                write!(f, "Failed to write archive {}: {}", path.display(), reason)
            }
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PackError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Result type for packaging operations.
pub type PackResult<T> = Result<T, PackError>;

/// A validated target directory, split into parent and base name.
#[derive(Debug, Clone, Serialize)]
pub struct TargetDir {
    /// Canonical absolute path of the directory.
    pub path: PathBuf,
    /// Base name of the directory; also the archive's stem and entry prefix.
    pub name: String,
    /// Directory the archive is first written to.
    pub parent: PathBuf,
}

/// A regular file found under the target directory.
#[derive(Debug, Clone, Serialize)]
pub struct PackEntry {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the target directory.
    pub relative: PathBuf,
    pub classification: Classification,
}

/// Everything decided before the first write.
#[derive(Debug, Clone, Serialize)]
pub struct PackPlan {
    pub target: TargetDir,
    /// Where the archive is written, in the parent directory.
    pub archive_path: PathBuf,
    /// Where the archive goes if non-image files remain.
    pub inner_archive_path: PathBuf,
    /// Where the archive is expected to end up once cleanup has run.
    pub final_archive_path: PathBuf,
    /// Hidden file the archive is written to before verification.
    pub staging_path: PathBuf,
    /// An archive is already inside the target; nothing to do.
    pub already_packaged: bool,
    /// Image files in archive order.
    pub images: Vec<PackEntry>,
    /// Files that stay on disk.
    pub others: Vec<PackEntry>,
    /// Files whose relative path is not valid UTF-8. They cannot be named
    /// faithfully inside a zip archive and are left in place.
    pub unencodable: Vec<PathBuf>,
    /// OS-generated files that cleanup will delete.
    pub sentinels: Vec<PathBuf>,
}

/// Summary of a completed packaging run.
#[derive(Debug, Clone, Serialize)]
pub struct PackReport {
    /// RFC 3339 timestamp of completion.
    pub timestamp: String,
    pub target: PathBuf,
    /// Final location of the archive.
    pub archive: PathBuf,
    /// Entry names written to the archive, in order.
    pub entries: Vec<String>,
    pub files_left: usize,
    pub sentinels_removed: usize,
    pub dirs_pruned: usize,
    /// The archive was moved into the target directory.
    pub relocated: bool,
    /// Files left in place because their names are not valid UTF-8.
    pub unencodable: Vec<PathBuf>,
    /// Originals that were archived but could not be deleted.
    pub failed_removals: Vec<(PathBuf, String)>,
}

/// Outcome of [`ArchiveBuilder::pack`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackOutcome {
    /// The target already holds its archive; nothing was changed.
    AlreadyPackaged { archive: PathBuf },
    /// The directory was packaged.
    Packaged(PackReport),
}

/// Builds store-only image archives from directories.
#[derive(Debug)]
pub struct ArchiveBuilder {
    config: CompiledConfig,
    classifier: Classifier,
}

impl ArchiveBuilder {
    /// Creates a builder classifying with the `infer`-backed sniffer.
    pub fn new(config: CompiledConfig) -> Self {
        let classifier = Classifier::new(config.image_token());
        Self { config, classifier }
    }

    /// Creates a builder with a custom classifier.
    pub fn with_classifier(config: CompiledConfig, classifier: Classifier) -> Self {
        Self { config, classifier }
    }

    /// Validates `path` and splits it into parent and base name.
    ///
    /// # Errors
    ///
    /// Returns `PackError::NotADirectory` if `path` is not an existing directory
    /// or has no base name (the filesystem root), and
    /// `PackError::UnsupportedName` if the base name is not valid UTF-8.
    pub fn resolve_target(&self, path: &Path) -> PackResult<TargetDir> {
        let not_a_dir = || PackError::NotADirectory {
            path: path.to_path_buf(),
        };

        if !fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false) {
            return Err(not_a_dir());
        }

        let canonical = fs::canonicalize(path).map_err(|e| PackError::io(path, e))?;
        let name = canonical
            .file_name()
            .ok_or_else(not_a_dir)?
            .to_str()
            .ok_or_else(|| PackError::UnsupportedName {
                path: canonical.clone(),
            })?
            .to_string();
        let parent = canonical.parent().ok_or_else(not_a_dir)?.to_path_buf();

        Ok(TargetDir {
            path: canonical,
            name,
            parent,
        })
    }

    /// Validates, checks destinations and classifies, without writing anything.
    ///
    /// # Errors
    ///
    /// * `PackError::NotADirectory` if `path` is not a directory
    /// * `PackError::DestinationExists` if the archive (or its staging file)
    ///   already exists in the parent
    /// * `PackError::UnsupportedName` if the directory name is not valid UTF-8
    /// * `PackError::Io` if the tree cannot be walked or a file cannot be sniffed
    pub fn plan(&self, path: &Path) -> PackResult<PackPlan> {
        let target = self.resolve_target(path)?;
        let file_name = self.config.archive_file_name(&target.name);
        let archive_path = target.parent.join(&file_name);
        let inner_archive_path = target.path.join(&file_name);
        let staging_path = target.parent.join(format!(".{}.partial", file_name));

        if archive_path.exists() {
            return Err(PackError::DestinationExists { path: archive_path });
        }
        if staging_path.exists() {
            return Err(PackError::DestinationExists { path: staging_path });
        }

        let mut plan = PackPlan {
            target,
            archive_path,
            final_archive_path: inner_archive_path.clone(),
            inner_archive_path,
            staging_path,
            already_packaged: false,
            images: Vec::new(),
            others: Vec::new(),
            unencodable: Vec::new(),
            sentinels: Vec::new(),
        };

        if plan.inner_archive_path.exists() {
            plan.already_packaged = true;
            return Ok(plan);
        }

        for entry in WalkDir::new(&plan.target.path).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| walk_error(&plan.target.path, e))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path().to_path_buf();
            let relative = path
                .strip_prefix(&plan.target.path)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());

            if self.config.is_sentinel(&entry.file_name().to_string_lossy()) {
                plan.sentinels.push(path);
                continue;
            }
            if relative.to_str().is_none() {
                plan.unencodable.push(path);
                continue;
            }

            let classification = self
                .classifier
                .classify(&path)
                .map_err(|e| PackError::io(&path, e))?;
            let pack_entry = PackEntry {
                path,
                relative,
                classification,
            };
            if classification.is_image() {
                plan.images.push(pack_entry);
            } else {
                plan.others.push(pack_entry);
            }
        }

        plan.images.sort_by(|a, b| path_version_cmp(&a.relative, &b.relative));
        plan.others.sort_by(|a, b| path_version_cmp(&a.relative, &b.relative));

        let target_survives = !plan.others.is_empty()
            || !plan.unencodable.is_empty()
            || !self.config.prune_empty_dirs();
        if !target_survives {
            plan.final_archive_path = plan.archive_path.clone();
        }

        Ok(plan)
    }

    /// Packages the directory at `path`.
    pub fn pack(&self, path: &Path) -> PackResult<PackOutcome> {
        self.pack_with_progress(path, None)
    }

    /// Packages the directory at `path`, advancing `progress` once per image.
    pub fn pack_with_progress(
        &self,
        path: &Path,
        progress: Option<&ProgressBar>,
    ) -> PackResult<PackOutcome> {
        let plan = self.plan(path)?;
        self.execute(&plan, progress)
    }

    /// Carries out a plan produced by [`ArchiveBuilder::plan`].
    ///
    /// The archive is written to a hidden staging file, read back and checked
    /// against the plan, and only then renamed into place. Originals are
    /// deleted after that point, so a verification failure leaves every
    /// source file untouched.
    ///
    /// # Errors
    ///
    /// * `PackError::VerificationFailed` if the written archive does not match
    ///   the plan or is missing after the rename
    /// * `PackError::DestinationExists` if the staging file appeared since planning;
    ///   it is left as found
    /// * `PackError::ArchiveWrite` / `PackError::Io` on write failures
    pub fn execute(
        &self,
        plan: &PackPlan,
        progress: Option<&ProgressBar>,
    ) -> PackResult<PackOutcome> {
        if plan.already_packaged {
            return Ok(PackOutcome::AlreadyPackaged {
                archive: plan.inner_archive_path.clone(),
            });
        }

        let staging = &plan.staging_path;
        let file = File::create_new(staging).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                PackError::DestinationExists {
                    path: staging.clone(),
                }
            } else {
                PackError::io(staging, e)
            }
        })?;

        let entries = match self
            .write_archive(plan, file, staging, progress)
            .and_then(|entries| verify_archive(plan, staging, &entries).map(|()| entries))
        {
            Ok(entries) => entries,
            Err(e) => {
                let _ = fs::remove_file(staging);
                return Err(e);
            }
        };

        fs::rename(staging, &plan.archive_path).map_err(|e| PackError::io(staging, e))?;
        if !plan.archive_path.is_file() {
            return Err(PackError::VerificationFailed {
                path: plan.archive_path.clone(),
                reason: "archive missing after packaging".to_string(),
            });
        }

        let failed_removals = remove_originals(plan);

        let sentinels_removed = self.remove_sentinels(&plan.target.path)?;
        let dirs_pruned = if self.config.prune_empty_dirs() {
            prune_empty_dirs(&plan.target.path)?
        } else {
            0
        };

        let relocated = plan.target.path.exists();
        let archive = if relocated {
            fs::rename(&plan.archive_path, &plan.inner_archive_path)
                .map_err(|e| PackError::io(&plan.archive_path, e))?;
            plan.inner_archive_path.clone()
        } else {
            plan.archive_path.clone()
        };

        Ok(PackOutcome::Packaged(PackReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            target: plan.target.path.clone(),
            archive,
            entries,
            files_left: plan.others.len() + plan.unencodable.len() + failed_removals.len(),
            sentinels_removed,
            dirs_pruned,
            relocated,
            unencodable: plan.unencodable.clone(),
            failed_removals,
        }))
    }

    /// Writes every planned image into `file` and returns the entry names.
    fn write_archive(
        &self,
        plan: &PackPlan,
        file: File,
        staging: &Path,
        progress: Option<&ProgressBar>,
    ) -> PackResult<Vec<String>> {
        let write_err = |e: zip::result::ZipError| PackError::ArchiveWrite {
            path: staging.to_path_buf(),
            reason: e.to_string(),
        };

        let mut writer = ZipWriter::new(file);
        let mut names = Vec::with_capacity(plan.images.len());

        for image in &plan.images {
            let name = entry_name(&plan.target.name, &image.relative);
            if let Some(bar) = progress {
                bar.set_message(name.clone());
            }

            let metadata = fs::metadata(&image.path).map_err(|e| PackError::io(&image.path, e))?;
            writer
                .start_file(name.as_str(), entry_options(&metadata))
                .map_err(write_err)?;
            let mut src = File::open(&image.path).map_err(|e| PackError::io(&image.path, e))?;
            io::copy(&mut src, &mut writer).map_err(|e| PackError::io(&image.path, e))?;

            names.push(name);
            if let Some(bar) = progress {
                bar.inc(1);
            }
        }

        writer.finish().map_err(write_err)?;
        Ok(names)
    }

    /// Deletes OS sentinel files anywhere under `root`.
    fn remove_sentinels(&self, root: &Path) -> PackResult<usize> {
        let mut removed = 0;
        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_file() && self.config.is_sentinel(&name) {
                fs::remove_file(entry.path()).map_err(|e| PackError::io(entry.path(), e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new(CompiledConfig::default())
    }
}

/// Name of an archive entry: `<dir name>/<relative path>` with `/` separators.
pub fn entry_name(dir_name: &str, relative: &Path) -> String {
    format!("{}/{}", dir_name, slash_path(relative))
}

/// Converts a filesystem timestamp to a zip timestamp in local time.
///
/// Times outside the zip range (1980-2107) fall back to 1980-01-01.
pub fn zip_timestamp(time: SystemTime) -> zip::DateTime {
    let local: chrono::DateTime<Local> = time.into();
    let year = u16::try_from(local.year()).unwrap_or(0);
    zip::DateTime::from_date_and_time(
        year,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .unwrap_or_default()
}

fn entry_options(metadata: &fs::Metadata) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(metadata.len() >= u64::from(u32::MAX));

    if let Ok(modified) = metadata.modified() {
        options = options.last_modified_time(zip_timestamp(modified));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(metadata.permissions().mode() & 0o7777);
    }

    options
}

/// Reads the staging archive back and checks it against the plan.
fn verify_archive(plan: &PackPlan, staging: &Path, expected: &[String]) -> PackResult<()> {
    let fail = |reason: String| PackError::VerificationFailed {
        path: staging.to_path_buf(),
        reason,
    };

    let file = File::open(staging).map_err(|e| fail(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;

    if archive.len() != expected.len() {
        return Err(fail(format!(
            "expected {} entries, found {}",
            expected.len(),
            archive.len()
        )));
    }

    for (index, (image, name)) in plan.images.iter().zip(expected).enumerate() {
        let zipped = archive.by_index(index).map_err(|e| fail(e.to_string()))?;
        if zipped.name() != name {
            return Err(fail(format!(
                "entry {} is '{}', expected '{}'",
                index,
                zipped.name(),
                name
            )));
        }
        if zipped.compression() != CompressionMethod::Stored {
            return Err(fail(format!("entry '{}' is compressed", name)));
        }
        let on_disk = fs::metadata(&image.path)
            .map_err(|e| fail(e.to_string()))?
            .len();
        if zipped.size() != on_disk {
            return Err(fail(format!(
                "entry '{}' holds {} bytes, source has {}",
                name,
                zipped.size(),
                on_disk
            )));
        }
    }

    Ok(())
}

fn remove_originals(plan: &PackPlan) -> Vec<(PathBuf, String)> {
    plan.images
        .iter()
        .filter_map(|image| {
            fs::remove_file(&image.path)
                .err()
                .map(|e| (image.path.clone(), e.to_string()))
        })
        .collect()
}

/// Removes empty directories under and including `root`, deepest first.
fn prune_empty_dirs(root: &Path) -> PackResult<usize> {
    let mut pruned = 0;
    for entry in WalkDir::new(root).contents_first(true).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let is_empty = fs::read_dir(entry.path())
            .map_err(|e| PackError::io(entry.path(), e))?
            .next()
            .is_none();
        if is_empty {
            fs::remove_dir(entry.path()).map_err(|e| PackError::io(entry.path(), e))?;
            pruned += 1;
        }
    }
    Ok(pruned)
}

fn walk_error(root: &Path, e: walkdir::Error) -> PackError {
    let path = e.path().unwrap_or(root).to_path_buf();
    PackError::Io {
        path,
        source: e.into(),
    }
}
