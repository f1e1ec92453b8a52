//! Configuration, context assembly, and the ingest/query orchestration for sage.

pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod sysinfo;

pub use config::Config;
pub use context::{BuiltContext, ContextBudget, build_context};
pub use error::QueueError;
pub use orchestrator::{
    FileOutcome, FileReport, IngestReport, Orchestrator, QueryResult, QueryState,
};
pub use queue::{PendingQuery, TaskQueue};
pub use sysinfo::{SystemInfo, SystemInfoSource};
