//! Raw completion results as materialized from the engine.
//!
//! One [`CompletionRecord`] is the engine's structured form of a single
//! completion suggestion: a priority, an availability, and an ordered
//! sequence of typed [`Chunk`]s. Decoding these into flat, filterable
//! candidates is core's job, not the engine's.

/// Availability of a completion candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Deprecated,
    NotAccessible,
    NotAvailable,
}

impl Availability {
    /// Convert from the engine's numeric availability kind
    /// (0=Available, 1=Deprecated, 2=NotAvailable, 3=NotAccessible).
    #[must_use]
    pub fn from_engine(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Available),
            1 => Some(Self::Deprecated),
            2 => Some(Self::NotAvailable),
            3 => Some(Self::NotAccessible),
            _ => None,
        }
    }

    /// Protocol tag for this availability.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Deprecated => "deprecated",
            Self::NotAccessible => "not-accessible",
            Self::NotAvailable => "not-available",
        }
    }
}

/// Kind tag of one completion chunk.
///
/// Numeric values track the engine's chunk-kind enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Optional = 0,
    TypedText = 1,
    Text = 2,
    Placeholder = 3,
    Informative = 4,
    CurrentParameter = 5,
    LeftParen = 6,
    RightParen = 7,
    LeftBracket = 8,
    RightBracket = 9,
    LeftBrace = 10,
    RightBrace = 11,
    LeftAngle = 12,
    RightAngle = 13,
    Comma = 14,
    ResultType = 15,
    Colon = 16,
    SemiColon = 17,
    Equal = 18,
    HorizontalSpace = 19,
    VerticalSpace = 20,
}

impl ChunkKind {
    #[must_use]
    pub fn from_engine(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Optional),
            1 => Some(Self::TypedText),
            2 => Some(Self::Text),
            3 => Some(Self::Placeholder),
            4 => Some(Self::Informative),
            5 => Some(Self::CurrentParameter),
            6 => Some(Self::LeftParen),
            7 => Some(Self::RightParen),
            8 => Some(Self::LeftBracket),
            9 => Some(Self::RightBracket),
            10 => Some(Self::LeftBrace),
            11 => Some(Self::RightBrace),
            12 => Some(Self::LeftAngle),
            13 => Some(Self::RightAngle),
            14 => Some(Self::Comma),
            15 => Some(Self::ResultType),
            16 => Some(Self::Colon),
            17 => Some(Self::SemiColon),
            18 => Some(Self::Equal),
            19 => Some(Self::HorizontalSpace),
            20 => Some(Self::VerticalSpace),
            _ => None,
        }
    }
}

/// One typed chunk of a completion string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    kind: ChunkKind,
    text: String,
}

impl Chunk {
    #[must_use]
    pub fn new(kind: ChunkKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// A chunk kind that carries no text of its own (punctuation, spacing).
    #[must_use]
    pub fn bare(kind: ChunkKind) -> Self {
        Self::new(kind, "")
    }

    #[must_use]
    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// One completion suggestion as returned by the engine, prior to decoding.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    priority: u32,
    availability: Availability,
    brief_comment: String,
    chunks: Vec<Chunk>,
}

impl CompletionRecord {
    #[must_use]
    pub fn new(
        priority: u32,
        availability: Availability,
        brief_comment: String,
        chunks: Vec<Chunk>,
    ) -> Self {
        Self {
            priority,
            availability,
            brief_comment,
            chunks,
        }
    }

    /// Engine rank; lower is better.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    #[must_use]
    pub fn availability(&self) -> Availability {
        self.availability
    }

    #[must_use]
    pub fn brief_comment(&self) -> &str {
        &self.brief_comment
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_from_engine() {
        assert_eq!(Availability::from_engine(0), Some(Availability::Available));
        assert_eq!(Availability::from_engine(1), Some(Availability::Deprecated));
        assert_eq!(
            Availability::from_engine(2),
            Some(Availability::NotAvailable)
        );
        assert_eq!(
            Availability::from_engine(3),
            Some(Availability::NotAccessible)
        );
        assert_eq!(Availability::from_engine(4), None);
    }

    #[test]
    fn test_availability_label() {
        assert_eq!(Availability::Available.label(), "available");
        assert_eq!(Availability::Deprecated.label(), "deprecated");
        assert_eq!(Availability::NotAccessible.label(), "not-accessible");
        assert_eq!(Availability::NotAvailable.label(), "not-available");
    }

    #[test]
    fn test_chunk_kind_from_engine_roundtrip() {
        for value in 0..=20 {
            let kind = ChunkKind::from_engine(value).unwrap();
            assert_eq!(kind as u32, value);
        }
        assert_eq!(ChunkKind::from_engine(21), None);
    }

    #[test]
    fn test_bare_chunk_has_no_text() {
        let chunk = Chunk::bare(ChunkKind::LeftParen);
        assert_eq!(chunk.kind(), ChunkKind::LeftParen);
        assert_eq!(chunk.text(), "");
    }
}
