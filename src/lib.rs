pub mod config;
pub mod extension;
pub mod heuristics;
pub mod message;
pub mod server;

pub use config::Config;
pub use extension::{MessageRouter, Preferences};
pub use heuristics::{evaluate, AnalysisOutcome, EmailRecord, HeuristicEngine, Severity};
