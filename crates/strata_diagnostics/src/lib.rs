//! Diagnostic creation, severity management, and terminal rendering.
//!
//! This crate provides structured [`Diagnostic`] messages with severity levels,
//! codes, and optional file locations. The thread-safe [`DiagnosticSink`]
//! accumulates diagnostics during layer resolution and builds, and can forward
//! each one to a pluggable [`MessageHandler`] as it is emitted.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, StderrHandler, TerminalRenderer};
pub use severity::Severity;
pub use sink::{DiagnosticSink, MessageHandler};
