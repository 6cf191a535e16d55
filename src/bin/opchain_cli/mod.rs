//! CLI subcommand implementations for opchain

pub mod catalog;
pub mod check;
pub mod output;
pub mod run;
pub mod signature;
