//! Domain model (IDs, tasks, results, batches, workers, config, decisions).

pub mod batch;
pub mod config;
pub mod decision;
pub mod errors;
pub mod events;
pub mod ids;
pub mod result;
pub mod task;
pub mod worker;

pub use batch::{BatchRecord, BatchStatus, BatchStatusView};
pub use config::{FleetConfig, FleetConfigPatch};
pub use decision::{Decider, Decision, DecisionRecord, RetryPolicy};
pub use errors::{FleetError, FleetResult};
pub use events::DomainEvent;
pub use ids::{BatchId, TaskId, WorkerId};
pub use result::{Outcome, OutcomeKind, TaskResult};
pub use task::{Task, TaskType};
pub use worker::{WorkerHandle, WorkerStatus};
