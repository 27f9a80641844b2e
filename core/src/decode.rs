//! Completion decoding — from the engine's chunked completion strings to
//! flat, filterable candidates.
//!
//! Decoding is a single in-order walk over the chunks. The first TypedText
//! chunk is a one-shot latch: it names the candidate and marks where the
//! typed portion ends inside the prototype; everything after it also feeds
//! the post-completion text, with placeholder spans recorded so the editor
//! can drive tab-stops through the parameter slots.

use csense_types::{Availability, ChunkKind, CompletionRecord};

/// How a candidate prefix filter compares against typed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStyle {
    /// Case-sensitive prefix match.
    Exact,
    /// Case-insensitive prefix match.
    CaseInsensitive,
    /// Case-insensitive unless the prefix contains an uppercase letter.
    SmartCase,
}

impl MatchStyle {
    /// Parse a protocol style token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "exact" => Some(Self::Exact),
            "case-insensitive" => Some(Self::CaseInsensitive),
            "smart-case" => Some(Self::SmartCase),
            _ => None,
        }
    }

    /// Whether `candidate` starts with `prefix` under this style.
    #[must_use]
    pub fn matches(self, prefix: &str, candidate: &str) -> bool {
        match self {
            Self::Exact => candidate.starts_with(prefix),
            Self::CaseInsensitive => starts_with_ignore_case(candidate, prefix),
            Self::SmartCase => {
                if prefix.chars().any(char::is_uppercase) {
                    candidate.starts_with(prefix)
                } else {
                    starts_with_ignore_case(candidate, prefix)
                }
            }
        }
    }
}

fn starts_with_ignore_case(candidate: &str, prefix: &str) -> bool {
    let mut chars = candidate.chars();
    prefix.chars().all(|p| match chars.next() {
        Some(c) => c.eq_ignore_ascii_case(&p),
        None => false,
    })
}

/// One decoded, filterable completion suggestion.
#[derive(Debug, Clone)]
pub struct Candidate {
    typed_text: String,
    priority: u32,
    result_type: String,
    brief_comment: String,
    prototype: String,
    annotation_start: usize,
    post_completion_text: String,
    placeholder_spans: Vec<usize>,
    availability: Availability,
}

impl Candidate {
    #[must_use]
    pub fn typed_text(&self) -> &str {
        &self.typed_text
    }

    /// Engine rank; lower is better.
    #[must_use]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    #[must_use]
    pub fn result_type(&self) -> &str {
        &self.result_type
    }

    #[must_use]
    pub fn brief_comment(&self) -> &str {
        &self.brief_comment
    }

    /// Flattened display string for the whole completion.
    #[must_use]
    pub fn prototype(&self) -> &str {
        &self.prototype
    }

    /// Byte offset into the prototype where the typed-text portion ends and
    /// annotations begin.
    #[must_use]
    pub fn annotation_start(&self) -> usize {
        self.annotation_start
    }

    /// Literal suffix to insert after the typed text.
    #[must_use]
    pub fn post_completion_text(&self) -> &str {
        &self.post_completion_text
    }

    /// Flat [start, end) byte-offset pairs into the post-completion text
    /// marking parameter placeholder slots.
    #[must_use]
    pub fn placeholder_spans(&self) -> &[usize] {
        &self.placeholder_spans
    }

    #[must_use]
    pub fn availability(&self) -> Availability {
        self.availability
    }
}

/// Literal rendering of punctuation-kind chunks. Comma carries its display
/// space; nothing else gets padding.
fn punctuation(kind: ChunkKind) -> Option<&'static str> {
    match kind {
        ChunkKind::LeftParen => Some("("),
        ChunkKind::RightParen => Some(")"),
        ChunkKind::LeftBracket => Some("["),
        ChunkKind::RightBracket => Some("]"),
        ChunkKind::LeftBrace => Some("{"),
        ChunkKind::RightBrace => Some("}"),
        ChunkKind::LeftAngle => Some("<"),
        ChunkKind::RightAngle => Some(">"),
        ChunkKind::Comma => Some(", "),
        ChunkKind::Colon => Some(":"),
        ChunkKind::SemiColon => Some(";"),
        ChunkKind::Equal => Some("="),
        ChunkKind::HorizontalSpace => Some(" "),
        ChunkKind::VerticalSpace => Some("\n"),
        _ => None,
    }
}

/// Decode one engine completion record into a [`Candidate`].
///
/// Returns `None` for candidates that are unusable: availability is
/// not-available, or no TypedText chunk ever occurs.
#[must_use]
pub fn decode(record: &CompletionRecord) -> Option<Candidate> {
    if record.availability() == Availability::NotAvailable {
        return None;
    }

    let mut typed_text: Option<String> = None;
    let mut annotation_start = 0;
    let mut result_type = String::new();
    let mut prototype = String::new();
    let mut post = String::new();
    let mut spans = Vec::new();

    for chunk in record.chunks() {
        let kind = chunk.kind();
        let latched = typed_text.is_some();
        match kind {
            // Dropped entirely; their sub-structure is not expanded.
            ChunkKind::Optional => {}
            ChunkKind::ResultType => result_type = chunk.text().to_string(),
            ChunkKind::TypedText
            | ChunkKind::Text
            | ChunkKind::Placeholder
            | ChunkKind::Informative
            | ChunkKind::CurrentParameter => {
                prototype.push_str(chunk.text());
                if latched {
                    match kind {
                        ChunkKind::TypedText | ChunkKind::Text => post.push_str(chunk.text()),
                        ChunkKind::Placeholder | ChunkKind::CurrentParameter => {
                            spans.push(post.len());
                            post.push_str(chunk.text());
                            spans.push(post.len());
                        }
                        _ => {}
                    }
                } else if kind == ChunkKind::TypedText {
                    typed_text = Some(chunk.text().to_string());
                    annotation_start = prototype.len();
                }
            }
            _ => {
                if let Some(literal) = punctuation(kind) {
                    prototype.push_str(literal);
                    if latched {
                        post.push_str(literal);
                    }
                }
            }
        }
    }

    typed_text.map(|typed_text| Candidate {
        typed_text,
        priority: record.priority(),
        result_type,
        brief_comment: record.brief_comment().to_string(),
        prototype,
        annotation_start,
        post_completion_text: post,
        placeholder_spans: spans,
        availability: record.availability(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use csense_types::Chunk;

    fn record(availability: Availability, chunks: Vec<Chunk>) -> CompletionRecord {
        CompletionRecord::new(50, availability, String::new(), chunks)
    }

    fn call_chunks() -> Vec<Chunk> {
        vec![
            Chunk::new(ChunkKind::TypedText, "add"),
            Chunk::bare(ChunkKind::LeftParen),
            Chunk::new(ChunkKind::Placeholder, "int x"),
            Chunk::bare(ChunkKind::Comma),
            Chunk::new(ChunkKind::Placeholder, "int y"),
            Chunk::bare(ChunkKind::RightParen),
        ]
    }

    #[test]
    fn test_decode_function_call() {
        let candidate = decode(&record(Availability::Available, call_chunks())).unwrap();
        assert_eq!(candidate.typed_text(), "add");
        assert_eq!(candidate.prototype(), "add(int x, int y)");
        assert_eq!(candidate.annotation_start(), 3);
        assert_eq!(candidate.post_completion_text(), "(int x, int y)");
        assert_eq!(candidate.placeholder_spans(), &[1, 6, 8, 13]);
    }

    #[test]
    fn test_result_type_does_not_touch_prototype() {
        let candidate = decode(&record(
            Availability::Available,
            vec![
                Chunk::new(ChunkKind::ResultType, "int"),
                Chunk::new(ChunkKind::TypedText, "value"),
            ],
        ))
        .unwrap();
        assert_eq!(candidate.result_type(), "int");
        assert_eq!(candidate.prototype(), "value");
        assert_eq!(candidate.annotation_start(), 5);
        assert_eq!(candidate.post_completion_text(), "");
    }

    #[test]
    fn test_informative_counts_toward_prototype_only() {
        let candidate = decode(&record(
            Availability::Available,
            vec![
                Chunk::new(ChunkKind::TypedText, "size"),
                Chunk::bare(ChunkKind::LeftParen),
                Chunk::bare(ChunkKind::RightParen),
                Chunk::new(ChunkKind::Informative, " const"),
            ],
        ))
        .unwrap();
        assert_eq!(candidate.prototype(), "size() const");
        assert_eq!(candidate.post_completion_text(), "()");
    }

    #[test]
    fn test_typed_text_latch_is_one_shot() {
        let candidate = decode(&record(
            Availability::Available,
            vec![
                Chunk::new(ChunkKind::TypedText, "first"),
                Chunk::new(ChunkKind::TypedText, "second"),
            ],
        ))
        .unwrap();
        assert_eq!(candidate.typed_text(), "first");
        assert_eq!(candidate.annotation_start(), 5);
        // The second TypedText still flows into both buffers.
        assert_eq!(candidate.prototype(), "firstsecond");
        assert_eq!(candidate.post_completion_text(), "second");
    }

    #[test]
    fn test_optional_chunks_are_dropped() {
        let candidate = decode(&record(
            Availability::Available,
            vec![
                Chunk::new(ChunkKind::TypedText, "substr"),
                Chunk::bare(ChunkKind::LeftParen),
                Chunk::new(ChunkKind::Placeholder, "size_t pos"),
                Chunk::new(ChunkKind::Optional, "size_t len"),
                Chunk::bare(ChunkKind::RightParen),
            ],
        ))
        .unwrap();
        assert_eq!(candidate.prototype(), "substr(size_t pos)");
        assert_eq!(candidate.placeholder_spans(), &[1, 11]);
    }

    #[test]
    fn test_not_available_is_rejected() {
        assert!(decode(&record(Availability::NotAvailable, call_chunks())).is_none());
    }

    #[test]
    fn test_deprecated_is_kept() {
        let candidate = decode(&record(Availability::Deprecated, call_chunks())).unwrap();
        assert_eq!(candidate.availability(), Availability::Deprecated);
    }

    #[test]
    fn test_no_typed_text_is_rejected() {
        assert!(
            decode(&record(
                Availability::Available,
                vec![Chunk::new(ChunkKind::Text, "operator")],
            ))
            .is_none()
        );
    }

    // ── MatchStyle ─────────────────────────────────────────────────────

    #[test]
    fn test_case_insensitive_matches_across_case() {
        assert!(MatchStyle::CaseInsensitive.matches("foo", "FooBar"));
        assert!(MatchStyle::CaseInsensitive.matches("FOO", "foobar"));
        assert!(!MatchStyle::CaseInsensitive.matches("foo", "barfoo"));
    }

    #[test]
    fn test_exact_is_case_sensitive() {
        assert!(!MatchStyle::Exact.matches("foo", "FooBar"));
        assert!(MatchStyle::Exact.matches("Foo", "FooBar"));
    }

    #[test]
    fn test_smart_case_with_uppercase_prefix_is_exact() {
        assert!(!MatchStyle::SmartCase.matches("Foo", "fooBar"));
        assert!(MatchStyle::SmartCase.matches("Foo", "FooBar"));
    }

    #[test]
    fn test_smart_case_with_lowercase_prefix_is_insensitive() {
        assert!(MatchStyle::SmartCase.matches("foo", "FooBar"));
        assert!(MatchStyle::SmartCase.matches("foo", "foobar"));
    }

    #[test]
    fn test_empty_prefix_matches_everything() {
        for style in [
            MatchStyle::Exact,
            MatchStyle::CaseInsensitive,
            MatchStyle::SmartCase,
        ] {
            assert!(style.matches("", "anything"));
            assert!(style.matches("", ""));
        }
    }

    #[test]
    fn test_prefix_longer_than_candidate_never_matches() {
        assert!(!MatchStyle::CaseInsensitive.matches("foobar", "foo"));
        assert!(!MatchStyle::Exact.matches("foobar", "foo"));
    }

    #[test]
    fn test_style_tokens() {
        assert_eq!(MatchStyle::from_token("exact"), Some(MatchStyle::Exact));
        assert_eq!(
            MatchStyle::from_token("case-insensitive"),
            Some(MatchStyle::CaseInsensitive)
        );
        assert_eq!(
            MatchStyle::from_token("smart-case"),
            Some(MatchStyle::SmartCase)
        );
        assert_eq!(MatchStyle::from_token("fuzzy"), None);
    }
}
