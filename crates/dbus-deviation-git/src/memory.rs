//! In-memory [`SnapshotBackend`] for tests and tooling that has no repository.

use crate::backend::{Blob, SnapshotBackend, match_tracked};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};

type NoteMap = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

#[derive(Debug, Clone)]
struct MemoryTag {
    time: DateTime<Utc>,
    files: BTreeMap<String, Vec<u8>>,
}

/// A repository held entirely in memory.
///
/// Tags resolve to the object id `tag:<name>`. A single simulated remote
/// receives pushed note refs and serves them back on fetch.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tags: BTreeMap<String, MemoryTag>,
    refs: BTreeMap<String, String>,
    work_tree: BTreeMap<String, Vec<u8>>,
    notes: NoteMap,
    remote: NoteMap,
    pushes: Vec<(String, Vec<String>)>,
    fail_remote: bool,
}

fn content_id(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn blob(content: &[u8]) -> Blob {
    Blob {
        id: content_id(content),
        content: content.to_vec(),
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a release tag whose tree holds `files` as `(path, content)`.
    pub fn with_tag(mut self, name: &str, time: DateTime<Utc>, files: &[(&str, &str)]) -> Self {
        let files = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
            .collect();
        self.tags.insert(name.to_string(), MemoryTag { time, files });
        self
    }

    /// Add a non-tag ref, such as a branch, pointing at `object`.
    pub fn with_ref(mut self, name: &str, object: &str) -> Self {
        self.refs.insert(name.to_string(), object.to_string());
        self
    }

    /// Add a tracked file to the work tree.
    pub fn with_work_file(mut self, path: &str, content: &str) -> Self {
        self.set_work_file(path, content);
        self
    }

    pub fn set_work_file(&mut self, path: &str, content: &str) {
        self.work_tree
            .insert(path.to_string(), content.as_bytes().to_vec());
    }

    /// Make every push and fetch fail.
    pub fn set_remote_failure(&mut self, fail: bool) {
        self.fail_remote = fail;
    }

    /// Store a note on the simulated remote only, as another clone would.
    pub fn add_remote_note(&mut self, notes_ref: &str, target: &str, content: &str) {
        self.remote
            .entry(notes_ref.to_string())
            .or_default()
            .insert(target.to_string(), content.as_bytes().to_vec());
    }

    /// Every push so far, as `(remote, refs)`.
    pub fn pushes(&self) -> &[(String, Vec<String>)] {
        &self.pushes
    }

    /// Number of notes stored locally across all note refs.
    pub fn note_count(&self) -> usize {
        self.notes.values().map(BTreeMap::len).sum()
    }

    fn remote_error(&self, remote: &str) -> StoreError {
        StoreError::RemoteSync {
            remote: remote.to_string(),
            message: "remote unavailable".to_string(),
        }
    }
}

impl SnapshotBackend for MemoryBackend {
    fn tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.keys().cloned().collect())
    }

    fn latest_tag(&self) -> Result<Option<String>> {
        Ok(self
            .tags
            .iter()
            .max_by(|(a_name, a), (b_name, b)| a.time.cmp(&b.time).then(a_name.cmp(b_name)))
            .map(|(name, _)| name.clone()))
    }

    fn tag_time(&self, tag: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.tags.get(tag).map(|t| t.time))
    }

    fn resolve(&self, reference: &str) -> Result<Option<String>> {
        let name = reference.strip_prefix("refs/tags/").unwrap_or(reference);
        if self.tags.contains_key(name) {
            return Ok(Some(format!("tag:{}", name)));
        }
        Ok(self.refs.get(reference).cloned())
    }

    fn tag_blob(&self, tag: &str, path: &str) -> Result<Option<Blob>> {
        Ok(self
            .tags
            .get(tag)
            .and_then(|t| t.files.get(path))
            .map(|content| blob(content)))
    }

    fn note(&self, notes_ref: &str, target: &str) -> Result<Option<Blob>> {
        Ok(self
            .notes
            .get(notes_ref)
            .and_then(|notes| notes.get(target))
            .map(|content| blob(content)))
    }

    fn add_note(&mut self, notes_ref: &str, target: &str, content: &str) -> Result<String> {
        let notes = self.notes.entry(notes_ref.to_string()).or_default();
        if notes.contains_key(target) {
            return Err(StoreError::NoteExists {
                tag: target.to_string(),
                file: notes_ref.to_string(),
            });
        }
        notes.insert(target.to_string(), content.as_bytes().to_vec());
        Ok(content_id(content.as_bytes()))
    }

    fn note_refs(&self, namespace: &str) -> Result<Vec<String>> {
        let prefix = format!("refs/{}/", namespace);
        Ok(self
            .notes
            .iter()
            .filter(|(name, notes)| name.starts_with(&prefix) && !notes.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn working_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(match_tracked(self.work_tree.keys().map(String::as_str), name)
            .and_then(|path| self.work_tree.get(path))
            .cloned())
    }

    fn push(&mut self, remote: &str, refs: &[String]) -> Result<()> {
        if self.fail_remote {
            return Err(self.remote_error(remote));
        }
        for name in refs {
            if let Some(notes) = self.notes.get(name) {
                let theirs = self.remote.entry(name.clone()).or_default();
                for (target, content) in notes {
                    theirs.entry(target.clone()).or_insert_with(|| content.clone());
                }
            }
        }
        self.pushes.push((remote.to_string(), refs.to_vec()));
        Ok(())
    }

    fn fetch(&mut self, remote: &str, namespace: &str) -> Result<()> {
        if self.fail_remote {
            return Err(self.remote_error(remote));
        }
        let prefix = format!("refs/{}/", namespace);
        for (name, notes) in &self.remote {
            if !name.starts_with(&prefix) {
                continue;
            }
            let ours = self.notes.entry(name.clone()).or_default();
            for (target, content) in notes {
                ours.entry(target.clone()).or_insert_with(|| content.clone());
            }
        }
        Ok(())
    }
}
