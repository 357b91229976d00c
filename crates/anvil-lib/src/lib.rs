//! Installation and launch pipeline for mod-loader based game clients.
//!
//! The installer side turns a mod-loader installer archive into a persisted
//! version profile plus a populated library store. The launcher side turns a
//! persisted version profile into a concrete process invocation.

pub mod error;
pub mod game;
pub mod utils;

pub use error::{Error, Result};
