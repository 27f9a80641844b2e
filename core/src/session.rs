//! Session — the editor-facing state machine.
//!
//! One session tracks at most one active parse result and one outstanding
//! completion result set, plus the unsaved-buffer overlays that accompany
//! every engine call. The session exclusively owns disposal of both active
//! slots; each operation that installs new state releases the old state
//! first.

use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use csense_engine::{CompileCommand, Engine};
use csense_types::{CompletionRecord, Diagnostic, Overlay};

use crate::cache::{TuCache, TuRecord};
use crate::decode::{self, Candidate, MatchStyle};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read unsaved buffer for {file} from {source_path}")]
    FileRead { file: String, source_path: String },
    #[error("failed to parse {file}")]
    Parse { file: String },
    #[error("failed to perform code completion at {file}:{line}:{col}")]
    Complete { file: String, line: u32, col: u32 },
}

pub struct Session {
    cache: TuCache,
    /// Unsaved buffer contents, keyed by the file they stand in for.
    contents: HashMap<String, String>,
    /// Derived list handed to the engine; rebuilt in full on every
    /// mutation of `contents`.
    overlays: Vec<Overlay>,
    active_parse: Option<Rc<TuRecord>>,
    active_completion: Option<Vec<CompletionRecord>>,
}

impl Session {
    #[must_use]
    pub fn new(engine: Box<dyn Engine>, builtin_headers: Option<String>) -> Self {
        Self {
            cache: TuCache::new(engine, builtin_headers),
            contents: HashMap::new(),
            overlays: Vec::new(),
            active_parse: None,
            active_completion: None,
        }
    }

    /// Register `source_path`'s content as the effective content of `file`.
    ///
    /// On read failure any existing overlay for `file` is dropped and the
    /// operation reports the failure; the session stays usable either way.
    pub fn set_unsaved(&mut self, file: &str, source_path: &str) -> Result<(), SessionError> {
        let outcome = match fs::read(source_path) {
            Ok(bytes) => {
                self.contents
                    .insert(file.to_string(), String::from_utf8_lossy(&bytes).into_owned());
                Ok(())
            }
            Err(err) => {
                tracing::info!(file, source_path, %err, "Failed to read unsaved buffer");
                self.contents.remove(file);
                Err(SessionError::FileRead {
                    file: file.to_string(),
                    source_path: source_path.to_string(),
                })
            }
        };
        self.rebuild_overlays();
        outcome
    }

    /// Drop the overlay for `file`; its on-disk content is up to date again.
    /// Always succeeds, whether or not an overlay existed.
    pub fn reset_unsaved(&mut self, file: &str) {
        self.release_active();
        if self.contents.remove(file).is_some() {
            self.rebuild_overlays();
        }
    }

    /// Parse `file` and install the result as the active parse.
    pub fn parse(&mut self, file: &str, flags: &[String]) -> Result<(), SessionError> {
        self.release_active();
        match self.cache.parse(file, flags, &self.overlays) {
            Ok(record) => {
                tracing::debug!(file, "Parse done");
                self.active_parse = Some(record);
                Ok(())
            }
            Err(_) => Err(SessionError::Parse {
                file: file.to_string(),
            }),
        }
    }

    /// Diagnostics of the active parse, in engine-assigned order. Empty
    /// when nothing has been parsed.
    pub fn diagnostics(&mut self) -> Vec<Diagnostic> {
        match &self.active_parse {
            Some(record) => {
                let unit = record.unit();
                self.cache.engine_mut().diagnostics(unit)
            }
            None => {
                tracing::info!("Diagnostics requested with no active parse");
                Vec::new()
            }
        }
    }

    /// Run code completion at a position and install the result set.
    ///
    /// The unit reference used for the query is short-lived: it is released
    /// as soon as the engine call returns, successful or not.
    pub fn complete(
        &mut self,
        file: &str,
        line: u32,
        col: u32,
        flags: &[String],
    ) -> Result<(), SessionError> {
        self.release_active();
        let error = SessionError::Complete {
            file: file.to_string(),
            line,
            col,
        };
        let Ok(record) = self.cache.gen_tu(file, flags, &self.overlays) else {
            return Err(error);
        };
        let results =
            self.cache
                .engine_mut()
                .complete_at(record.unit(), file, line, col, &self.overlays);
        self.cache.release(&record);

        match results {
            Some(mut records) => {
                // The engine's numeric priority is lower-is-better; show the
                // best candidates first.
                records.sort_by_key(CompletionRecord::priority);
                self.active_completion = Some(records);
                Ok(())
            }
            None => Err(error),
        }
    }

    /// Decode and filter the outstanding completion set. `None` when no
    /// completion is outstanding.
    #[must_use]
    pub fn candidates(&self, prefix: &str, style: MatchStyle) -> Option<Vec<Candidate>> {
        let records = self.active_completion.as_ref()?;
        Some(
            records
                .iter()
                .filter_map(decode::decode)
                .filter(|candidate| style.matches(prefix, candidate.typed_text()))
                .collect(),
        )
    }

    /// Type spellings of the symbol at a position in the active parse:
    /// the declared spelling, plus the canonical one when it differs.
    /// `None` when nothing is parsed or no cursor resolves there.
    pub fn get_type(&mut self, line: u32, col: u32) -> Option<Vec<String>> {
        let Some(record) = &self.active_parse else {
            tracing::warn!("get-type requested before any parse");
            return None;
        };
        let record = Rc::clone(record);
        let info = self
            .cache
            .engine_mut()
            .type_at(record.unit(), record.file(), line, col)?;

        let mut spellings = Vec::new();
        if !info.spelling.is_empty() {
            spellings.push(info.spelling.clone());
            if !info.canonical.is_empty() && info.canonical != info.spelling {
                spellings.push(info.canonical);
            }
        }
        Some(spellings)
    }

    /// Compile commands for `file` from the database in `build_dir`.
    /// Straight forwarding; no caching, no retry.
    pub fn get_compile_options(
        &mut self,
        build_dir: &str,
        file: &str,
    ) -> Option<Vec<CompileCommand>> {
        self.cache.engine_mut().compile_commands(build_dir, file)
    }

    /// Release the active completion, then the active parse. The completion
    /// results may reference the parse they came from, so this order is
    /// fixed.
    fn release_active(&mut self) {
        self.active_completion = None;
        if let Some(record) = self.active_parse.take() {
            self.cache.release(&record);
        }
    }

    fn rebuild_overlays(&mut self) {
        let mut entries: Vec<(&String, &String)> = self.contents.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        self.overlays = entries
            .into_iter()
            .map(|(path, contents)| Overlay::new(path.clone(), contents.clone()))
            .collect();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use csense_engine::{EngineError, TypeInfo};
    use csense_types::{Availability, Chunk, ChunkKind};
    use std::io::Write;

    fn session_with_fake() -> (Session, std::rc::Rc<std::cell::RefCell<crate::testing::FakeState>>)
    {
        let (engine, state) = FakeEngine::new();
        (Session::new(Box::new(engine), None), state)
    }

    fn simple_record(typed: &str, priority: u32) -> CompletionRecord {
        CompletionRecord::new(
            priority,
            Availability::Available,
            String::new(),
            vec![Chunk::new(ChunkKind::TypedText, typed)],
        )
    }

    #[test]
    fn test_set_unsaved_stores_overlay() {
        let (mut session, _state) = session_with_fake();
        let mut source = tempfile::NamedTempFile::new().unwrap();
        write!(source, "int x;").unwrap();

        session
            .set_unsaved("a.c", source.path().to_str().unwrap())
            .unwrap();
        assert_eq!(session.overlays.len(), 1);
        assert_eq!(session.overlays[0].path(), "a.c");
        assert_eq!(session.overlays[0].contents(), "int x;");
    }

    #[test]
    fn test_set_unsaved_read_failure_drops_overlay() {
        let (mut session, _state) = session_with_fake();
        let mut source = tempfile::NamedTempFile::new().unwrap();
        write!(source, "int x;").unwrap();
        session
            .set_unsaved("a.c", source.path().to_str().unwrap())
            .unwrap();

        let err = session
            .set_unsaved("a.c", "/nonexistent/overlay")
            .unwrap_err();
        assert!(matches!(err, SessionError::FileRead { .. }));
        assert!(session.overlays.is_empty(), "stale overlay must not survive");
    }

    #[test]
    fn test_overlays_reach_the_engine() {
        let (mut session, state) = session_with_fake();
        let mut source = tempfile::NamedTempFile::new().unwrap();
        write!(source, "int x;").unwrap();
        session
            .set_unsaved("a.c", source.path().to_str().unwrap())
            .unwrap();

        session.parse("a.c", &[]).unwrap();
        let overlays = state.borrow().last_overlays.clone();
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].path(), "a.c");
    }

    #[test]
    fn test_reset_unsaved_without_overlay_still_releases_actives() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().completions = Some(vec![simple_record("foo", 10)]);

        session.parse("a.c", &[]).unwrap();
        session.complete("a.c", 1, 1, &[]).unwrap();
        assert!(session.active_completion.is_some());

        session.reset_unsaved("other.c");
        assert!(session.active_parse.is_none());
        assert!(session.active_completion.is_none());
    }

    #[test]
    fn test_parse_installs_active_record() {
        let (mut session, _state) = session_with_fake();
        session.parse("a.c", &[]).unwrap();
        let record = session.active_parse.as_ref().unwrap();
        assert_eq!(record.file(), "a.c");
        assert_eq!(record.ref_count(), 2);
    }

    #[test]
    fn test_parse_failure_reports_and_clears_active() {
        let (mut session, state) = session_with_fake();
        state
            .borrow_mut()
            .parse_outcomes
            .push_back(Err(EngineError::Failed(1)));

        let err = session.parse("a.c", &[]).unwrap_err();
        assert!(matches!(err, SessionError::Parse { .. }));
        assert!(session.active_parse.is_none());
    }

    #[test]
    fn test_reparse_releases_previous_active() {
        let (mut session, state) = session_with_fake();
        session.parse("a.c", &[]).unwrap();
        let first = Rc::clone(session.active_parse.as_ref().unwrap());

        session.parse("b.c", &[]).unwrap();
        assert_eq!(first.ref_count(), 1, "only the cache map holds a.c now");
        drop(session);
        assert_eq!(state.borrow().disposed_units.len(), 2);
    }

    #[test]
    fn test_diagnostics_empty_without_active_parse() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().diagnostics = vec![Diagnostic::unlocated(
            csense_types::Severity::Error,
            "boom".to_string(),
        )];
        // Diagnostics exist engine-side, but with no active parse the
        // session reports an empty list, not an error.
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn test_diagnostics_flow_through_for_active_parse() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().diagnostics = vec![Diagnostic::new(
            "a.c".to_string(),
            3,
            1,
            17,
            csense_types::Severity::Warning,
            "unused variable".to_string(),
        )];
        session.parse("a.c", &[]).unwrap();

        let diags = session.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message(), "unused variable");
    }

    #[test]
    fn test_complete_sorts_by_priority_and_releases_short_lived_ref() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().completions = Some(vec![
            simple_record("worst", 80),
            simple_record("best", 10),
            simple_record("middle", 40),
        ]);

        session.complete("a.c", 5, 9, &[]).unwrap();
        let stored = session.active_completion.as_ref().unwrap();
        let order: Vec<&str> = stored.iter().map(|r| r.chunks()[0].text()).collect();
        assert_eq!(order, ["best", "middle", "worst"]);

        // Only the cache map still references the unit.
        assert_eq!(state.borrow().complete_calls, 1);
        drop(session);
        assert_eq!(state.borrow().disposed_units.len(), 1);
    }

    #[test]
    fn test_complete_null_result_reports_error() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().completions = None;

        let err = session.complete("a.c", 2, 2, &[]).unwrap_err();
        assert!(matches!(err, SessionError::Complete { .. }));
        assert!(session.active_completion.is_none());
        // The short-lived unit reference was still returned.
        drop(session);
        assert_eq!(state.borrow().disposed_units.len(), 1);
    }

    #[test]
    fn test_complete_gen_tu_failure_reports_error() {
        let (mut session, state) = session_with_fake();
        state
            .borrow_mut()
            .parse_outcomes
            .push_back(Err(EngineError::Failed(1)));

        assert!(session.complete("a.c", 2, 2, &[]).is_err());
        assert_eq!(state.borrow().complete_calls, 0);
    }

    #[test]
    fn test_candidates_without_completion_is_none() {
        let (session, _state) = session_with_fake();
        assert!(session.candidates("", MatchStyle::Exact).is_none());
    }

    #[test]
    fn test_candidates_filters_by_prefix_and_availability() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().completions = Some(vec![
            simple_record("fooBar", 10),
            simple_record("FooBaz", 20),
            simple_record("other", 30),
            CompletionRecord::new(
                5,
                Availability::NotAvailable,
                String::new(),
                vec![Chunk::new(ChunkKind::TypedText, "fooGone")],
            ),
        ]);
        session.complete("a.c", 1, 1, &[]).unwrap();

        let hits = session.candidates("foo", MatchStyle::CaseInsensitive).unwrap();
        let names: Vec<&str> = hits.iter().map(Candidate::typed_text).collect();
        // Priority order, prefix-filtered, not-available dropped.
        assert_eq!(names, ["fooBar", "FooBaz"]);

        let hits = session.candidates("foo", MatchStyle::Exact).unwrap();
        let names: Vec<&str> = hits.iter().map(Candidate::typed_text).collect();
        assert_eq!(names, ["fooBar"]);
    }

    #[test]
    fn test_get_type_without_parse_is_none() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().type_result = Some(TypeInfo {
            spelling: "int".to_string(),
            canonical: "int".to_string(),
        });
        assert!(session.get_type(1, 1).is_none());
    }

    #[test]
    fn test_get_type_omits_identical_canonical() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().type_result = Some(TypeInfo {
            spelling: "int".to_string(),
            canonical: "int".to_string(),
        });
        session.parse("a.c", &[]).unwrap();
        assert_eq!(session.get_type(1, 1).unwrap(), ["int"]);
    }

    #[test]
    fn test_get_type_includes_differing_canonical() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().type_result = Some(TypeInfo {
            spelling: "my_int".to_string(),
            canonical: "int".to_string(),
        });
        session.parse("a.c", &[]).unwrap();
        assert_eq!(session.get_type(1, 1).unwrap(), ["my_int", "int"]);
    }

    #[test]
    fn test_get_type_null_cursor_is_none() {
        let (mut session, state) = session_with_fake();
        state.borrow_mut().type_result = None;
        session.parse("a.c", &[]).unwrap();
        assert!(session.get_type(1, 1).is_none());
    }
}
