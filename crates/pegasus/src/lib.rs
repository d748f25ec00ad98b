//! Pegasus - command-line tools for planning abstract workflows.
//!
//! Every binary under `src/bin` is a thin `main` around [`cli::run`], which
//! parses arguments, sets up logging, runs one handler from [`commands`] and
//! maps the outcome to an exit code ([`exit`]).

pub mod cli;
pub mod commands;
pub mod exit;
pub mod logging;
