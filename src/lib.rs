//! debpipe - Debian package build pipelines for ROS release repositories

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::{BuildError, BuildParams, Pipeline, PipelineAssembler, PipelineResult, PropertyStore, Step};
pub use core::config::BuildConfig;
pub use execution::{BuilderRegistry, ExecutionEngine, ExecutionEvent, JobRun, RegistryBuilder, TriggerGraph};
pub use runner::{LocalRunner, LocalRunnerConfig, RunnerError, StepRequest, StepRunner};
