//! Common utilities shared by the library and the experiment binaries.
//!
//! - **`perf`**: peak memory measurement for the experiment runners.
//!   It reads the peak resident set size (RSS) from procfs
//!   on Linux and reports zero elsewhere.
//!

pub mod perf;
