//! Engines, the peer coordinator, and the lock that guards them.
//!
//! An [`Engine`] owns one layer stack, its resolution cache, and its build
//! scheduler. The [`Coordinator`] keeps one engine per runtime and builds
//! them in dependency order. Everything is reached through one
//! [`EngineLock`]: lookups that are already covered take the read side,
//! anything that parses or builds takes the write side.

#![warn(missing_docs)]

pub mod context;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod lock;

pub use context::SharedContext;
pub use coordinator::Coordinator;
pub use engine::Engine;
pub use error::EngineError;
pub use lock::EngineLock;
