//! Side-effecting adapters: files, processes, environment and tool probing.

pub mod catalog;
pub mod config;
pub mod env;
pub mod init;
pub mod manifest_store;
pub mod process;
pub mod prompts;
pub mod step_runner;
pub mod tools;
