//! I/O adapters: processes, search path, advisor, prompts, files, terminal.

pub mod advisor;
pub mod config;
pub mod confirm;
pub mod console;
pub mod init;
pub mod locate;
pub mod mode;
pub mod process;
pub mod readiness;
pub mod steps;
