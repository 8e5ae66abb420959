//! kubelite: a single-process container orchestrator
//!
//! Pods are scheduled round-robin onto a fixed set of capacity-bounded nodes
//! and run as containers through a pluggable runtime. Node capacity is never
//! oversold, and a failed create leaves no trace behind.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod runtime;
pub mod server;
