//! Job execution: registry, triggers, workers and the engine

pub mod engine;
pub mod registry;
pub mod scheduler;
pub mod trigger;
pub mod worker;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, JobRun};
pub use registry::{BuilderEntry, BuilderRegistry, RegistryBuilder};
pub use scheduler::{FireDecision, JobScheduler};
pub use trigger::{TriggerEvent, TriggerGraph};
pub use worker::{WorkerLease, WorkerPool};
