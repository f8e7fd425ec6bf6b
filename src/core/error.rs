//! Error types for pipeline construction and execution

use thiserror::Error;

/// Errors raised while assembling, registering or running build pipelines
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// A template references a property that is not (yet) defined
    #[error("Undefined property '{key}'")]
    UndefinedProperty { key: String },

    /// A package name cannot be mapped to a Debian package name
    #[error("Invalid package name '{0}'")]
    InvalidPackageName(String),

    /// A job, distro or arch name that cannot be part of a builder id
    #[error("Invalid job name '{0}'")]
    InvalidJobName(String),

    #[error("Builder '{0}' is already registered")]
    DuplicateJobName(String),

    #[error("Trigger '{0}' is already registered")]
    DuplicateTriggerName(String),

    #[error("Step name '{step}' is used twice in pipeline '{job}'")]
    DuplicateStepName { job: String, step: String },

    /// A trigger or trigger step points at something that is never registered
    #[error("'{source_name}' references unknown {what} '{target}'")]
    DanglingTrigger {
        source_name: String,
        what: &'static str,
        target: String,
    },

    #[error("Builder '{0}' has no workers assigned")]
    NoWorkers(String),

    /// A step's runner reported failure
    #[error("Step '{step}' failed: {reason}")]
    StepFailure { step: String, reason: String },
}

impl BuildError {
    pub fn undefined(key: impl Into<String>) -> Self {
        BuildError::UndefinedProperty { key: key.into() }
    }
}
