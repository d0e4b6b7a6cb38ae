//! # Middleware
//!
//! ```text
//! TraceLayer → request log → CatchPanicLayer → TimeoutLayer → handler
//! ```

pub mod request_log;
pub mod tracing_layer;
