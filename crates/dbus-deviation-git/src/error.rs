use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Git repository not found at path: {0}")]
    RepositoryAbsent(PathBuf),

    #[error("Invalid ref ‘{reference}’")]
    RefResolution { reference: String },

    #[error("Failed to sync notes with remote ‘{remote}’: {message}")]
    RemoteSync { remote: String, message: String },

    #[error("{tag}: XML file ‘{file}’ already has a note")]
    NoteExists { tag: String, file: String },

    #[error("Failed to find latest git tag")]
    NoTags,

    #[error("XML file ‘{file}’ not found in tag ‘{tag}’ or in the work tree")]
    MissingFile { tag: String, file: String },

    #[error("XML file ‘{0}’ is not valid UTF-8")]
    NotUtf8(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
