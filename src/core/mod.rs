//! Core domain models for debpipe
//!
//! This module defines properties, steps and pipelines, and how pipelines
//! are assembled from a build configuration.

pub mod assembler;
pub mod config;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod property;
pub mod state;
pub mod step;

pub use assembler::{BuildParams, PipelineAssembler};
pub use error::BuildError;
pub use pipeline::*;
pub use property::{PropertyKey, PropertyStore, Template};
pub use state::*;
pub use step::*;
