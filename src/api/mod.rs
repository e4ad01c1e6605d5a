//! API Module
//!
//! The operator command surface over the logic layer. `main.rs` maps CLI
//! subcommands and shell lines onto `Console` methods.

pub mod commands;

pub use commands::*;

#[cfg(test)]
mod tests;
