//! [`SnapshotBackend`] over a real repository via git2.

use crate::backend::{Blob, SnapshotBackend, match_tracked};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use git2::{
    Cred, CredentialType, ErrorCode, FetchOptions, ObjectType, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature, Tag,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where to find the repository.
///
/// A work tree alone is opened as a normal checkout. Both fields unset means:
/// honour `GIT_DIR`/`GIT_WORK_TREE`, else search upwards from the current
/// directory.
#[derive(Debug, Clone, Default)]
pub struct GitLocation {
    pub git_dir: Option<PathBuf>,
    pub work_tree: Option<PathBuf>,
}

pub struct GitBackend {
    repo: Repository,
}

fn from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn credentials(
    repo_config: Option<git2::Config>,
) -> impl FnMut(&str, Option<&str>, CredentialType) -> std::result::Result<Cred, git2::Error> {
    move |url, username, allowed| {
        if allowed.contains(CredentialType::SSH_KEY)
            && let Some(user) = username
        {
            return Cred::ssh_key_from_agent(user);
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
            && let Some(config) = &repo_config
        {
            return Cred::credential_helper(config, url, username);
        }
        Cred::default()
    }
}

impl GitBackend {
    pub fn open(location: &GitLocation) -> Result<Self> {
        let repo = match (&location.git_dir, &location.work_tree) {
            (Some(dir), _) => {
                if !dir.exists() {
                    return Err(StoreError::RepositoryAbsent(dir.clone()));
                }
                Repository::open(dir).map_err(|e| absent_or(e, dir))?
            }
            (None, Some(tree)) => Repository::open(tree).map_err(|e| absent_or(e, tree))?,
            (None, None) => {
                let cwd = std::env::current_dir()?;
                Repository::open_from_env().map_err(|e| absent_or(e, &cwd))?
            }
        };
        if let Some(work_tree) = &location.work_tree {
            repo.set_workdir(work_tree, false)?;
        }
        debug!(path = %repo.path().display(), "opened repository");
        Ok(Self { repo })
    }

    pub fn from_repository(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// The annotated tag object behind `refs/tags/<name>`. Lightweight tags
    /// are not releases.
    fn annotated(&self, name: &str) -> Result<Option<Tag<'_>>> {
        let reference = match self.repo.find_reference(&format!("refs/tags/{}", name)) {
            Ok(r) => r,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(reference
            .peel(ObjectType::Tag)
            .ok()
            .and_then(|obj| obj.into_tag().ok()))
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now("dbus-deviation", "dbus-deviation@localhost")?),
        }
    }

    fn callbacks<'a>(&self) -> RemoteCallbacks<'a> {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(credentials(self.repo.config().ok()));
        callbacks
    }
}

fn absent_or(e: git2::Error, path: &Path) -> StoreError {
    if e.code() == ErrorCode::NotFound {
        StoreError::RepositoryAbsent(path.to_path_buf())
    } else {
        e.into()
    }
}

fn remote_sync(remote: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::RemoteSync {
        remote: remote.to_string(),
        message: e.to_string(),
    }
}

impl SnapshotBackend for GitBackend {
    fn tags(&self) -> Result<Vec<String>> {
        let names = self.repo.tag_names(None)?;
        let mut tags = Vec::new();
        for name in names.iter().flatten() {
            if self.annotated(name)?.is_some() {
                tags.push(name.to_string());
            }
        }
        Ok(tags)
    }

    fn latest_tag(&self) -> Result<Option<String>> {
        let mut best: Option<(i64, i64, String)> = None;
        for name in self.tags()? {
            let Some(tag) = self.annotated(&name)? else {
                continue;
            };
            let commit_time = match tag.target().and_then(|t| t.peel_to_commit()) {
                Ok(commit) => commit.time().seconds(),
                Err(_) => continue,
            };
            let tag_time = tag.tagger().map(|s| s.when().seconds()).unwrap_or(0);
            let key = (commit_time, tag_time, name);
            if best.as_ref().is_none_or(|b| key > *b) {
                best = Some(key);
            }
        }
        Ok(best.map(|(_, _, name)| name))
    }

    fn tag_time(&self, tag: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(tag) = self.annotated(tag)? else {
            return Ok(None);
        };
        if let Some(tagger) = tag.tagger() {
            return Ok(from_timestamp(tagger.when().seconds()));
        }
        let commit = tag.target()?.peel_to_commit()?;
        Ok(from_timestamp(commit.time().seconds()))
    }

    fn resolve(&self, reference: &str) -> Result<Option<String>> {
        Ok(self
            .repo
            .revparse_single(reference)
            .ok()
            .map(|obj| obj.id().to_string()))
    }

    fn tag_blob(&self, tag: &str, path: &str) -> Result<Option<Blob>> {
        let Some(tag) = self.annotated(tag)? else {
            return Ok(None);
        };
        let tree = tag.target()?.peel_to_tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Ok(blob) = entry.to_object(&self.repo)?.into_blob() else {
            return Ok(None);
        };
        Ok(Some(Blob {
            id: blob.id().to_string(),
            content: blob.content().to_vec(),
        }))
    }

    fn note(&self, notes_ref: &str, target: &str) -> Result<Option<Blob>> {
        let oid = Oid::from_str(target)?;
        match self.repo.find_note(Some(notes_ref), oid) {
            Ok(note) => Ok(Some(Blob {
                id: note.id().to_string(),
                content: note.message_bytes().to_vec(),
            })),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn add_note(&mut self, notes_ref: &str, target: &str, content: &str) -> Result<String> {
        let oid = Oid::from_str(target)?;
        let sig = self.signature()?;
        let note = self
            .repo
            .note(&sig, &sig, Some(notes_ref), oid, content, false)
            .map_err(|e| {
                if e.code() == ErrorCode::Exists {
                    StoreError::NoteExists {
                        tag: target.to_string(),
                        file: notes_ref.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;
        Ok(note.to_string())
    }

    fn note_refs(&self, namespace: &str) -> Result<Vec<String>> {
        let mut refs = Vec::new();
        for reference in self.repo.references_glob(&format!("refs/{}/*", namespace))? {
            if let Some(name) = reference?.name() {
                refs.push(name.to_string());
            }
        }
        refs.sort();
        Ok(refs)
    }

    fn working_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(workdir) = self.repo.workdir() else {
            return Ok(None);
        };
        let index = self.repo.index()?;
        let paths: Vec<String> = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();
        let Some(path) = match_tracked(paths.iter().map(String::as_str), name) else {
            return Ok(None);
        };
        match std::fs::read(workdir.join(path)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn push(&mut self, remote: &str, refs: &[String]) -> Result<()> {
        let mut handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| remote_sync(remote, e))?;
        let mut rejected = Vec::new();
        let mut callbacks = self.callbacks();
        callbacks.push_update_reference(|name, status| {
            if let Some(status) = status {
                rejected.push(format!("{} ({})", name, status));
            }
            Ok(())
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        let specs: Vec<String> = refs.iter().map(|r| format!("{}:{}", r, r)).collect();
        debug!(remote, refs = specs.len(), "pushing note refs");
        handle
            .push(&specs, Some(&mut options))
            .map_err(|e| remote_sync(remote, e))?;
        drop(options);
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(remote_sync(remote, format!("rejected {}", rejected.join(", "))))
        }
    }

    fn fetch(&mut self, remote: &str, namespace: &str) -> Result<()> {
        let mut handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| remote_sync(remote, e))?;
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.callbacks());
        let refspec = format!("refs/{ns}/*:refs/{ns}/*", ns = namespace);
        debug!(remote, %refspec, "fetching note refs");
        handle
            .fetch(&[refspec.as_str()], Some(&mut options), None)
            .map_err(|e| remote_sync(remote, e))
    }
}
