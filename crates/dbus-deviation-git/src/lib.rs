#![doc = include_str!("../README.md")]

pub mod backend;
pub mod error;
pub mod git;
pub mod helper;
pub mod memory;

pub use backend::{Blob, SnapshotBackend, basename};
pub use error::{Result, StoreError};
pub use git::{GitBackend, GitLocation};
pub use helper::{
    CheckReport, CheckRequest, DistReport, FileFailure, FileReport, HelperConfig, InstallReport,
    ListEntry, PushOutcome, Side, Snapshot, check, check_at, dist, install, list,
};
pub use memory::MemoryBackend;
