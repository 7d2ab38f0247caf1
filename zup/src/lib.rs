//! Self-healing local setup runner.
//!
//! zup runs the shell steps declared in `zup.yaml`. When a step fails it asks
//! a language model for a corrective command, confirms it with the user,
//! applies it, and retries. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure logic (step types, command wrapping, answer parsing).
//! - **[`io`]**: Side effects (shell processes, search path, advisor HTTP,
//!   stdin prompts, files, terminal output), each behind a trait where the
//!   healing loop needs to swap it in tests.
//!
//! [`heal`] implements the fix-apply-retry loop for one step and [`setup`]
//! runs every step through it.

pub mod core;
pub mod exit_codes;
pub mod heal;
pub mod io;
pub mod logging;
pub mod setup;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
