//! Treedigest CLI Library
//!
//! Layered configuration, directory walking and output formatting for the
//! `treedigest` binary.

pub mod config;
pub mod output;
pub mod walker;
