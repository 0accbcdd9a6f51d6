//! Snapshot operations: recording API files against release tags and
//! checking the work tree against them.

use crate::backend::{SnapshotBackend, basename};
use crate::error::{Result, StoreError};
use crate::git::{GitBackend, GitLocation};
use chrono::{DateTime, Utc};
use dbus_api::{Node, ParseError, Parser};
use dbus_deviation::{CheckOutcome, CheckPolicy, check as check_pair};
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Settings shared by every snapshot operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperConfig {
    /// Where note refs live, below `refs/`.
    pub namespace: String,
    pub remote: String,
    /// Push note refs after recording. When off, the push command is
    /// reported instead.
    pub push: bool,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            namespace: "notes/dbus/api".to_string(),
            remote: "origin".to_string(),
            push: true,
        }
    }
}

impl HelperConfig {
    /// Note ref holding snapshots of the file called `basename`.
    pub fn notes_ref(&self, basename: &str) -> String {
        format!("refs/{}/{}", self.namespace, basename)
    }

    /// The command that publishes every snapshot by hand.
    pub fn push_command(&self) -> String {
        format!("git push {} refs/{}/*", self.remote, self.namespace)
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A note recorded for one file at one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tag: String,
    pub file: String,
    pub notes_ref: String,
    pub note: String,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Added note ‘{}’ for XML file ‘{}’",
            self.tag, self.note, self.file
        )
    }
}

/// What happened to the note refs after recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { remote: String, refs: Vec<String> },
    /// Pushing was turned off; run `command` to publish.
    Skipped { command: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub added: Vec<Snapshot>,
    /// Tags where every file already had a note or none was present.
    pub unchanged: Vec<String>,
    pub push: Option<PushOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistReport {
    pub tag: String,
    pub added: Vec<Snapshot>,
    /// Files skipped because they already had a note.
    pub ignored: Vec<String>,
    pub push: Option<PushOutcome>,
}

/// Which side of a comparison failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Old => "old",
            Side::New => "new",
        })
    }
}

/// A file whose API could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub side: Side,
    pub error: ParseError,
}

/// Comparison of one file between the two refs.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub file: String,
    /// No snapshot on the old side; compared against an empty API.
    pub old_missing: bool,
    pub new_missing: bool,
    pub result: std::result::Result<CheckOutcome, FileFailure>,
}

impl FileReport {
    pub fn passed(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.passed)
    }
}

/// Which refs a check compares and which files it covers.
#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
    /// Defaults to the latest release tag.
    pub old_ref: Option<String>,
    /// Defaults to the work tree.
    pub new_ref: Option<String>,
    /// Files to check in addition to those with snapshots.
    pub files: Vec<String>,
    pub policy: CheckPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    /// Set when there was no repository to check.
    pub skipped: bool,
    /// The ref snapshots were read from, once resolved.
    pub old_ref: Option<String>,
    /// Why notes could not be fetched, if they could not.
    pub fetch_error: Option<String>,
    pub files: Vec<FileReport>,
}

impl CheckReport {
    fn empty() -> Self {
        Self {
            skipped: false,
            old_ref: None,
            fetch_error: None,
            files: Vec::new(),
        }
    }

    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::empty()
        }
    }

    pub fn passed(&self) -> bool {
        self.files.iter().all(FileReport::passed)
    }
}

/// Snapshot status of one file at one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub tag: String,
    pub date: Option<DateTime<Utc>>,
    pub file: String,
    /// Id of the stored note, if there is one.
    pub note: Option<String>,
}

// ============================================================================
// Operations
// ============================================================================

fn resolve_required<B: SnapshotBackend>(backend: &B, reference: &str) -> Result<String> {
    backend
        .resolve(reference)?
        .ok_or_else(|| StoreError::RefResolution {
            reference: reference.to_string(),
        })
}

fn text(file: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8(file.to_string()))
}

fn publish<B: SnapshotBackend>(backend: &mut B, config: &HelperConfig) -> Result<Option<PushOutcome>> {
    let refs = backend.note_refs(&config.namespace)?;
    if refs.is_empty() {
        return Ok(None);
    }
    if !config.push {
        return Ok(Some(PushOutcome::Skipped {
            command: config.push_command(),
        }));
    }
    backend.push(&config.remote, &refs)?;
    Ok(Some(PushOutcome::Pushed {
        remote: config.remote.clone(),
        refs,
    }))
}

/// Record a snapshot of each of `files` for every release tag that contains
/// it and does not have one yet. Running it again records nothing new.
pub fn install<B: SnapshotBackend>(
    backend: &mut B,
    config: &HelperConfig,
    files: &[String],
) -> Result<InstallReport> {
    let mut report = InstallReport::default();
    for tag in backend.tags()? {
        let target = resolve_required(backend, &tag)?;
        let mut added_here = false;
        for path in files {
            let name = basename(path);
            let notes_ref = config.notes_ref(name);
            if backend.note(&notes_ref, &target)?.is_some() {
                continue;
            }
            let Some(blob) = backend.tag_blob(&tag, path)? else {
                debug!(%tag, file = %path, "not present in tag");
                continue;
            };
            let content = text(path, blob.content)?;
            let note = backend.add_note(&notes_ref, &target, &content)?;
            debug!(%tag, file = %path, %note, "added note");
            report.added.push(Snapshot {
                tag: tag.clone(),
                file: path.clone(),
                notes_ref,
                note,
            });
            added_here = true;
        }
        if !added_here {
            report.unchanged.push(tag);
        }
    }
    report.push = publish(backend, config)?;
    Ok(report)
}

/// Record snapshots of `files` for the latest release tag.
///
/// Content comes from the tag's tree, or from the work tree when the file is
/// not in the tag yet. An existing snapshot is an error unless
/// `ignore_existing` is set.
pub fn dist<B: SnapshotBackend>(
    backend: &mut B,
    config: &HelperConfig,
    files: &[String],
    ignore_existing: bool,
) -> Result<DistReport> {
    let tag = backend.latest_tag()?.ok_or(StoreError::NoTags)?;
    let target = resolve_required(backend, &tag)?;
    let mut added = Vec::new();
    let mut ignored = Vec::new();
    for path in files {
        let notes_ref = config.notes_ref(basename(path));
        if backend.note(&notes_ref, &target)?.is_some() {
            if ignore_existing {
                ignored.push(path.clone());
                continue;
            }
            return Err(StoreError::NoteExists {
                tag: tag.clone(),
                file: path.clone(),
            });
        }
        let bytes = match backend.tag_blob(&tag, path)? {
            Some(blob) => blob.content,
            None => backend
                .working_file(path)?
                .ok_or_else(|| StoreError::MissingFile {
                    tag: tag.clone(),
                    file: path.clone(),
                })?,
        };
        let content = text(path, bytes)?;
        let note = backend.add_note(&notes_ref, &target, &content)?;
        debug!(%tag, file = %path, %note, "added note");
        added.push(Snapshot {
            tag: tag.clone(),
            file: path.clone(),
            notes_ref,
            note,
        });
    }
    let push = publish(backend, config)?;
    Ok(DistReport {
        tag,
        added,
        ignored,
        push,
    })
}

/// Files to check: every file with a snapshot, then the extra `files`.
fn checked_files<B: SnapshotBackend>(
    backend: &B,
    config: &HelperConfig,
    files: &[String],
) -> Result<Vec<String>> {
    let prefix = format!("refs/{}/", config.namespace);
    let mut names: Vec<String> = backend
        .note_refs(&config.namespace)?
        .iter()
        .filter_map(|r| r.strip_prefix(&prefix).map(str::to_string))
        .collect();
    for path in files {
        let name = basename(path).to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

fn load(file: &str, content: Option<Vec<u8>>, side: Side) -> std::result::Result<Node, FileFailure> {
    let Some(bytes) = content else {
        return Ok(Node::default());
    };
    Parser::new()
        .with_filename(file)
        .parse(&bytes)
        .map(|parsed| parsed.root)
        .map_err(|error| FileFailure { side, error })
}

/// Compare every snapshotted (or named) API file between two refs.
///
/// Unresolvable explicit refs abort the check. A failed fetch is logged and
/// the check goes on with the notes available locally.
pub fn check<B: SnapshotBackend>(
    backend: &mut B,
    config: &HelperConfig,
    request: &CheckRequest,
) -> Result<CheckReport> {
    if let Some(old) = &request.old_ref {
        resolve_required(backend, old)?;
    }
    let new_target = match &request.new_ref {
        Some(new) => Some(resolve_required(backend, new)?),
        None => None,
    };

    let mut report = CheckReport::empty();
    if let Err(e) = backend.fetch(&config.remote, &config.namespace) {
        warn!(remote = %config.remote, error = %e, "could not fetch API snapshots");
        report.fetch_error = Some(e.to_string());
    }

    let old_ref = match &request.old_ref {
        Some(old) => old.clone(),
        None => match backend.latest_tag()? {
            Some(tag) => tag,
            None => {
                debug!("no release tags; nothing to compare against");
                return Ok(report);
            }
        },
    };
    let old_target = resolve_required(backend, &old_ref)?;
    report.old_ref = Some(old_ref);

    for file in checked_files(backend, config, &request.files)? {
        let notes_ref = config.notes_ref(&file);
        let old = backend.note(&notes_ref, &old_target)?.map(|b| b.content);
        let new = match &new_target {
            Some(target) => backend.note(&notes_ref, target)?.map(|b| b.content),
            None => backend.working_file(&file)?,
        };
        debug!(%file, old = old.is_some(), new = new.is_some(), "checking");
        let old_missing = old.is_none();
        let new_missing = new.is_none();
        let result = load(&file, old, Side::Old).and_then(|old| {
            let new = load(&file, new, Side::New)?;
            Ok(check_pair(&old, &new, &request.policy))
        });
        report.files.push(FileReport {
            file,
            old_missing,
            new_missing,
            result,
        });
    }
    Ok(report)
}

/// [`check`] against the repository at `location`; no repository means a
/// skipped, passing check.
pub fn check_at(
    location: &GitLocation,
    config: &HelperConfig,
    request: &CheckRequest,
) -> Result<CheckReport> {
    match GitBackend::open(location) {
        Ok(mut backend) => check(&mut backend, config, request),
        Err(StoreError::RepositoryAbsent(path)) => {
            debug!(path = %path.display(), "no repository; skipping API check");
            Ok(CheckReport::skipped())
        }
        Err(e) => Err(e),
    }
}

/// Snapshot status per release tag, newest first, for `files` or every file
/// that has a snapshot.
pub fn list<B: SnapshotBackend>(
    backend: &B,
    config: &HelperConfig,
    files: &[String],
) -> Result<Vec<ListEntry>> {
    let files = checked_files(backend, config, files)?;
    let mut tags = Vec::new();
    for tag in backend.tags()? {
        let date = backend.tag_time(&tag)?;
        tags.push((date, tag));
    }
    tags.sort_by(|a, b| b.cmp(a));

    let mut entries = Vec::new();
    for (date, tag) in tags {
        let target = resolve_required(backend, &tag)?;
        for file in &files {
            let note = backend
                .note(&config.notes_ref(file), &target)?
                .map(|b| b.id);
            entries.push(ListEntry {
                tag: tag.clone(),
                date,
                file: file.clone(),
                note,
            });
        }
    }
    Ok(entries)
}
