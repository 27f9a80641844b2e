//! The analysis-engine interface consumed by the cache and session.

use csense_types::{CompletionRecord, Diagnostic, Overlay};

/// Opaque id of one parsed translation unit.
///
/// Only meaningful to the engine that issued it; the cache treats it as a
/// token to be handed back for reparse, query, and disposal calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitHandle(u64);

impl UnitHandle {
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Error classes reported by the engine.
///
/// [`EngineError::Crashed`] is the one class the cache retries; everything
/// else surfaces immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine crashed internally while performing the operation.
    #[error("engine crashed during the operation")]
    Crashed,
    /// The arguments violated the operation contract.
    #[error("engine rejected the operation arguments")]
    InvalidArguments,
    /// A stored AST could not be deserialized.
    #[error("engine failed to read a stored AST")]
    AstRead,
    /// Any other failure, with the engine's raw code.
    #[error("engine operation failed (code {0})")]
    Failed(i32),
}

impl EngineError {
    #[must_use]
    pub fn is_crash(self) -> bool {
        self == Self::Crashed
    }
}

/// Declared and canonical type spellings for one cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Type spelling as written (typedefs intact).
    pub spelling: String,
    /// Fully resolved spelling; may equal `spelling`.
    pub canonical: String,
}

/// One entry from the engine's compilation database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    pub args: Vec<String>,
    pub directory: String,
}

/// Narrow synchronous interface over the native analysis engine.
///
/// All calls block; `parse` and `reparse` can take arbitrarily long on cold
/// preambles. Handles returned by `parse` stay valid until `dispose`.
pub trait Engine {
    /// Parse `file` with the given argument vector and overlay contents.
    fn parse(
        &mut self,
        file: &str,
        args: &[String],
        overlays: &[Overlay],
    ) -> Result<UnitHandle, EngineError>;

    /// Re-run the parse for an existing unit against fresh overlay contents.
    ///
    /// On failure the unit is no longer usable and must be disposed.
    fn reparse(&mut self, unit: UnitHandle, overlays: &[Overlay]) -> Result<(), EngineError>;

    /// Release the engine-side resources of a unit. The handle is dead after
    /// this call.
    fn dispose(&mut self, unit: UnitHandle);

    /// All diagnostics of a unit, in engine-assigned order.
    fn diagnostics(&mut self, unit: UnitHandle) -> Vec<Diagnostic>;

    /// Code completion at a position. `None` means the engine produced no
    /// result set at all (distinct from an empty one).
    fn complete_at(
        &mut self,
        unit: UnitHandle,
        file: &str,
        line: u32,
        col: u32,
        overlays: &[Overlay],
    ) -> Option<Vec<CompletionRecord>>;

    /// Type of the symbol under a position. `None` when no cursor resolves
    /// there.
    fn type_at(&mut self, unit: UnitHandle, file: &str, line: u32, col: u32) -> Option<TypeInfo>;

    /// Compile commands for `file` from the JSON database in `build_dir`.
    /// `None` when the database cannot be loaded.
    fn compile_commands(&mut self, build_dir: &str, file: &str) -> Option<Vec<CompileCommand>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_crash_class_is_retryable() {
        assert!(EngineError::Crashed.is_crash());
        assert!(!EngineError::InvalidArguments.is_crash());
        assert!(!EngineError::AstRead.is_crash());
        assert!(!EngineError::Failed(1).is_crash());
    }

    #[test]
    fn test_unit_handle_roundtrip() {
        let handle = UnitHandle::new(7);
        assert_eq!(handle.raw(), 7);
        assert_eq!(handle, UnitHandle::new(7));
    }
}
