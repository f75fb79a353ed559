//! Global log stream instance.
//!
//! Written by the foreground context (configurator, NVS, main loop),
//! drained by the UART logger. The tick callback never logs.

use crate::logging::LogStream;

pub static LOG_STREAM: LogStream = LogStream::new();
