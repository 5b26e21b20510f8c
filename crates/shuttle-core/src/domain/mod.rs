//! Domain model (IDs, tasks, tabs, messages, outcomes, records, ...).

pub mod attempt;
pub mod decision;
pub mod errors;
pub mod events;
pub mod ids;
pub mod message;
pub mod outcome;
pub mod report;
pub mod retry;
pub mod state;
pub mod tab;
pub mod task;

pub use attempt::{AttemptRecord, DecisionRecord};
pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{FailureKind, PageError, ProbeError, ShuttleError, TabError};
pub use events::DomainEvent;
pub use ids::{AttemptId, BatchId, TaskId};
pub use message::{ControlMessage, RunnerSignal, SignalEnvelope};
pub use outcome::{SequenceOutcome, TaskResolution};
pub use report::TaskReport;
pub use retry::RetryPolicy;
pub use state::{CoordinatorState, CoordinatorStatus, RunnerState};
pub use tab::{LoadState, TabHandle, TabId, TabPolicy, TabStatusEvent, WindowId};
pub use task::PromptTask;
