//! qsnn CLI crate
//!
//! Purpose:
//! - Drive the `qsnn-core` engine from a host: load weight tables and data,
//!   rate-encode samples, run batch inference and report accuracy.
//! - Convert float weight tables to the Q0.7 integers the engine consumes.
//!
//! Major commands (see [commands]):
//! - run: run file (TOML) -> tables -> network -> per-sample classification file,
//!        with timing and accuracy logged and an optional JSON summary.
//! - quantize: float table -> Q0.7 integers, one per line.
//!
//! Notes:
//! - The binary (src/main.rs) wires up logging and argument parsing, calling QsnnCli::execute().
//! - The library surface exposes the loaders and the encoder for tests and tooling.

pub mod commands;
pub mod config;
pub mod encode;
pub mod error;
pub mod loader;

pub use commands::QsnnCli;
