//! # strata-common
//!
//! Shared types, the error taxonomy, project settings, and constants
//! used across the entire Strata workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the primitives that the resolver, the
//! deployment compiler, and the CLI build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
