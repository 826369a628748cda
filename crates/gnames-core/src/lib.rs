//! # gnames-core
//!
//! Locates the global name table (GNames) of an Unreal Engine game in the
//! memory of its main module.
//!
//! This crate provides:
//! - Process attachment and memory reading (Windows, Linux `/proc`)
//! - Raw module image loading for offline searches
//! - Signature scanning with RIP-relative target decoding
//! - The name-pool and name-array search strategies with structural validation
//!
//! The search only ever produces a [`SearchResult`]; it performs no output.

pub mod config;
pub mod error;
pub mod memory;
pub mod offset;

pub use config::{SearchConfig, SearchLimits, load_config, save_config};
pub use error::{Error, Result};
pub use memory::{
    AddressSpace, BytePattern, ImageReader, MemoryReader, ProcessHandle, ProcessInfo, ReadMemory,
};
pub use offset::{
    Candidate, Encoding, GNamesSearcher, SearchFailure, SearchReport, SearchResult,
    StrategyOutcome, StructureKind, preview_names,
};
