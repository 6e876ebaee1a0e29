//! Application layer for dstask.
//!
//! Configuration, the persisted context, the versioned-log seam and the
//! mutation pipeline shared by every command.

pub mod config;
pub mod context;
pub mod edit_session;
pub mod memory_log;
pub mod task_patch;
pub mod task_store;
pub mod task_writer;

// Re-exports for convenience
pub use config::{Config, RepoConfig, SyncConfig};
pub use context::ContextFile;
pub use edit_session::{DEFAULT_EDIT_ATTEMPTS, EditSession, EditedTask, Editor, ExternalEditor};
pub use memory_log::MemoryLog;
pub use task_patch::{SetDiff, TaskPatch};
pub use task_store::{GitTaskLog, TASKS_DIR, TaskStore, VersionedLog};
pub use task_writer::{BatchReport, NewTask, TargetOutcome, TaskWriteError, TaskWriter};
