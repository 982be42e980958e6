//! # Findora Engine
//!
//! Match orchestration: runs a newly reported item against its candidates,
//! commits the resulting matches and notifies on high-confidence ones.
//!
//! - [`MatchOrchestrator`]: one synchronous match run per item
//! - [`MatchEngine`]: deferred intake on a worker pool, with retry on a
//!   temporarily unavailable index
//! - [`MatchNotifier`]: hook for committed high-confidence matches

pub mod background;
pub mod config;
pub mod engine;
pub mod notify;
pub mod orchestrator;

pub use background::{BackgroundJob, WorkerPool};
pub use config::{EngineConfig, RetryPolicy, WorkerConfig};
pub use engine::MatchEngine;
pub use notify::{LogNotifier, MatchNotifier};
pub use orchestrator::{EngineStats, MatchOrchestrator, RunSummary};
