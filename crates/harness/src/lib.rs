//! Test harness for the virtualization environment test suite.
//!
//! This crate provides the run-time machinery the suite binary is built on:
//! the command-line option registry, layered run configuration, the matrix
//! parameter model, the test selection pipeline, the session lifecycle
//! (logging, temp-dir isolation, run-in-progress guard), the failure
//! diagnostics collector, and the sequential runner with colorized and HTML
//! reporting.
//!
//! Test execution is single-threaded by design; the only background work is
//! the log listener thread started at session begin and stopped exactly once
//! at session end.

pub mod cluster;
pub mod config;
pub mod diagnostics;
pub mod guard;
pub mod item;
pub mod logging;
pub mod matrix;
pub mod options;
pub mod report;
pub mod runner;
pub mod selection;
pub mod session;
pub mod wait;
