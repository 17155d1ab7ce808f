//! Task resolution engine: hands tracked tasks to an external code agent, one
//! at a time, and records each outcome in the tracker file and in git.
//!
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (document format, selection,
//!   output contract, commit messages). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, process execution).
//!   Isolated behind traits to enable fakes in tests.
//!
//! [`resolve`] coordinates core logic with I/O to implement the attempt state
//! machine behind `task-runner resolve`.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
