//! Diagnostic values reported by the engine for one parsed unit.

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ignored = 0,
    Note = 1,
    Warning = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    /// Convert from the engine's numeric severity
    /// (0=Ignored, 1=Note, 2=Warning, 3=Error, 4=Fatal).
    ///
    /// Returns `None` for values outside the defined range.
    /// Callers (boundary code) decide the fallback policy.
    #[must_use]
    pub fn from_engine(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ignored),
            1 => Some(Self::Note),
            2 => Some(Self::Warning),
            3 => Some(Self::Error),
            4 => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Protocol tag for this severity.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

/// A single diagnostic from the engine, in engine-assigned order.
///
/// Fields are private; construction goes through [`Diagnostic::new`] and
/// consumers read via accessors.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Resolved file name; empty when the diagnostic has no location.
    file: String,
    /// 1-indexed line, as resolved by the engine. Zero when unlocated.
    line: u32,
    /// 1-indexed column. Zero when unlocated.
    col: u32,
    /// Byte offset into the file. Zero when unlocated.
    offset: u32,
    severity: Severity,
    message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        file: String,
        line: u32,
        col: u32,
        offset: u32,
        severity: Severity,
        message: String,
    ) -> Self {
        Self {
            file,
            line,
            col,
            offset,
            severity,
            message,
        }
    }

    /// A diagnostic the engine could not attach to any source location.
    #[must_use]
    pub fn unlocated(severity: Severity, message: String) -> Self {
        Self::new(String::new(), 0, 0, 0, severity, message)
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn col(&self) -> u32 {
        self.col
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
