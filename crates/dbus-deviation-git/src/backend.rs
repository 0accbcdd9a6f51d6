//! The storage seam between snapshot operations and a repository.

use crate::error::Result;
use chrono::{DateTime, Utc};

/// Stored bytes together with the id the backend knows them by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub id: String,
    pub content: Vec<u8>,
}

/// Everything the snapshot operations need from a repository.
///
/// Object ids are opaque strings produced by [`resolve`](Self::resolve); notes
/// are keyed by the full note ref (`refs/notes/dbus/api/foo.xml`) and the
/// object they annotate.
pub trait SnapshotBackend {
    /// Names of all release tags.
    fn tags(&self) -> Result<Vec<String>>;

    /// The most recent release tag, if any.
    fn latest_tag(&self) -> Result<Option<String>>;

    /// When `tag` was made.
    fn tag_time(&self, tag: &str) -> Result<Option<DateTime<Utc>>>;

    /// Object id a ref or revision expression points at, or `None` if it
    /// does not resolve.
    fn resolve(&self, reference: &str) -> Result<Option<String>>;

    /// Contents of `path` in the tree of `tag`.
    fn tag_blob(&self, tag: &str, path: &str) -> Result<Option<Blob>>;

    /// Note attached to `target` under `notes_ref`.
    fn note(&self, notes_ref: &str, target: &str) -> Result<Option<Blob>>;

    /// Attach a new note. Never overwrites; returns the id of the stored note.
    fn add_note(&mut self, notes_ref: &str, target: &str, content: &str) -> Result<String>;

    /// Full names of the note refs below `refs/<namespace>/`.
    fn note_refs(&self, namespace: &str) -> Result<Vec<String>>;

    /// A tracked file from the work tree. `name` is matched against tracked
    /// paths exactly first, then by basename.
    fn working_file(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Publish `refs` to `remote`.
    fn push(&mut self, remote: &str, refs: &[String]) -> Result<()>;

    /// Bring in note refs below `refs/<namespace>/` from `remote`.
    fn fetch(&mut self, remote: &str, namespace: &str) -> Result<()>;
}

/// Final path component of `path`.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Pick the tracked path that `name` refers to.
pub(crate) fn match_tracked<'a, I>(paths: I, name: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let suffix = format!("/{}", basename(name));
    let mut fallback = None;
    for path in paths {
        if path == name {
            return Some(path);
        }
        if fallback.is_none() && (path == basename(name) || path.ends_with(&suffix)) {
            fallback = Some(path);
        }
    }
    fallback
}
