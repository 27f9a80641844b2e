//! Engine seam for csense.
//!
//! The native analysis engine is an external collaborator: synchronous,
//! potentially expensive, and capable of crashing on malformed input. This
//! crate pins it behind the narrow [`Engine`] trait so the rest of the
//! system (cache, session, protocol) never touches engine memory or engine
//! error codes directly. [`clang::ClangEngine`] is the production
//! implementation over libclang.

pub mod api;
pub mod clang;

pub use api::{CompileCommand, Engine, EngineError, TypeInfo, UnitHandle};
pub use clang::ClangEngine;
