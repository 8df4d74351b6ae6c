//! Logging utilities.
//!
//! Every crate in the workspace logs through the `log` facade; this module
//! only owns the one-time `env_logger` setup used by binaries and tests.

mod init;

pub use init::{init_logging, LoggingConfig};
