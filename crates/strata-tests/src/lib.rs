//! # strata-tests
//!
//! Integration tests for the Strata block assembler and miner.
//!
//! This crate provides:
//! - An in-memory regtest chain and node fixture
//! - Generators for pool transactions, chains and fan-outs
//! - Assembly tests against an independent block validator
//! - Coordinator tests for generation, continuous mining and external work
//! - Property-based tests for package selection

pub mod generators;
pub mod harness;




pub use generators::*;
pub use harness::*;
