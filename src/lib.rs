//! # Burn NER
//!
//! Fine-tune BERT models for named entity recognition and run inference with the result.
#![forbid(unsafe_code)]

/// Models
pub mod models;

/// Pipelines
pub mod pipelines;

/// Datasets
pub mod datasets;

/// The training loop and its optimizer and schedule
pub mod training;

/// Experiment tracking
pub mod tracking;

/// Utilities
pub mod utils;

/// CLI indexes and utilities
pub mod cli;

#[cfg(test)]
mod testing;

/// Error macros
#[macro_use]
extern crate anyhow;

/// Logging macros
#[macro_use]
extern crate log;
