pub mod log;
pub mod snapshot;
pub mod state;

pub use log::{LogEntry, LogOp, ReplicatedLog};
pub use state::{NodeState, ReplicationState};
