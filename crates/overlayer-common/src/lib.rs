//! # overlayer-common
//!
//! Shared types, error definitions, settings, and constants used across
//! the overlayer workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and holds the primitives the mount engine and the CLI
//! both build upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
