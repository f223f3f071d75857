pub mod agent;
pub mod alert;
mod error;
pub mod fetcher;
pub mod monitor;
pub mod settings;
pub mod snapshot;
pub mod thresholds;

pub use error::{AgentError, DispatchError, FetchError, SnapshotError};
