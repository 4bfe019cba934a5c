//! Test Helper Utilities
//!
//! Shared utilities for testing shelf-ingest

#![allow(dead_code)]

pub mod fake_sources;
pub mod fixture_server;

pub use fake_sources::{FailingSource, RecordingSource, ScriptedSource, SlowSource};
pub use fixture_server::spawn_fixture_server;
