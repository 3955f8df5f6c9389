//! # Burn Classifiers
//!
//! A registry of text classification architectures built on Burn, sharing one argument
//! surface and one batch format.
#![forbid(unsafe_code)]

/// Models
pub mod models;

/// Batches and batching
pub mod data;

/// Utilities
pub mod utils;

/// Command line arguments
pub mod cli;

/// Error macros
#[macro_use]
extern crate anyhow;
