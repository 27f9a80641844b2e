//! Translation-unit cache — refcounted store of parsed units.
//!
//! The cache amortizes the engine's reparse cost across repeated requests
//! for the same file. Each cached record carries an explicit reference
//! count: the map itself holds one reference, and every successful
//! [`TuCache::parse`] / [`TuCache::gen_tu`] hands out one more, which the
//! caller must return through exactly one [`TuCache::release`]. The count
//! discipline is load-bearing: engine-side unit memory is freed on the
//! transition to zero, and dropping below zero is a programming error, not
//! a recoverable condition.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use csense_engine::{Engine, UnitHandle};
use csense_types::Overlay;

/// Synthetic argv[0] handed to the engine's full-argv parse entry point.
const PROGRAM_TOKEN: &str = "csense";

/// Engine parse attempts before giving up on a crashing engine.
const PARSE_ATTEMPTS: u32 = 3;

/// Fixed delay between crash retries (not exponential).
const CRASH_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to parse {file}")]
    ParseFailed { file: String },
}

/// One parsed file's live engine handle plus the flags it was parsed with.
///
/// Shared between the cache map and any active holders; the reference count
/// tracks how many of those shares are live.
pub struct TuRecord {
    file: String,
    flags: Vec<String>,
    unit: UnitHandle,
    refs: Cell<i32>,
}

impl TuRecord {
    fn new(file: String, flags: Vec<String>, unit: UnitHandle) -> Self {
        Self {
            file,
            flags,
            unit,
            refs: Cell::new(1),
        }
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    #[must_use]
    pub fn unit(&self) -> UnitHandle {
        self.unit
    }

    /// Current reference count. Zero means the engine resource is gone.
    #[must_use]
    pub fn ref_count(&self) -> i32 {
        self.refs.get()
    }

    fn ref_bump(&self) {
        self.refs.set(self.refs.get() + 1);
    }

    /// Drop one reference and return the remaining count.
    ///
    /// Panics on underflow: a count below zero means a caller released a
    /// record it did not own, which is never valid.
    fn ref_drop(&self) -> i32 {
        let refs = self.refs.get() - 1;
        assert!(
            refs >= 0,
            "translation unit for {} over-released (refs {refs})",
            self.file
        );
        self.refs.set(refs);
        refs
    }
}

/// File-keyed store of at most one [`TuRecord`] per path.
///
/// Owns the engine. Dropping the cache disposes every record
/// unconditionally, regardless of outstanding references.
pub struct TuCache {
    engine: Box<dyn Engine>,
    builtin_headers: Option<String>,
    units: HashMap<String, Rc<TuRecord>>,
}

impl TuCache {
    #[must_use]
    pub fn new(engine: Box<dyn Engine>, builtin_headers: Option<String>) -> Self {
        Self {
            engine,
            builtin_headers,
            units: HashMap::new(),
        }
    }

    /// Direct engine access for queries against an already-held record
    /// (diagnostics, completion, type lookup).
    pub fn engine_mut(&mut self) -> &mut dyn Engine {
        &mut *self.engine
    }

    /// Parse `file`, reusing the cached unit when the flags match, and
    /// always reparsing against the current overlays before returning.
    ///
    /// The returned record has had its count bumped; pair with exactly one
    /// [`TuCache::release`].
    pub fn parse(
        &mut self,
        file: &str,
        flags: &[String],
        overlays: &[Overlay],
    ) -> Result<Rc<TuRecord>, CacheError> {
        let flags = self.effective_flags(flags);
        let record = match self.find(file, &flags) {
            Some(record) => record,
            None => {
                let unit = self.parse_with_retry(file, &flags, overlays)?;
                let record = Rc::new(TuRecord::new(file.to_string(), flags, unit));
                let previous = self.units.insert(file.to_string(), Rc::clone(&record));
                assert!(
                    previous.is_none(),
                    "translation unit for {file} already cached"
                );
                record
            }
        };

        // Even on a cache hit the unit is reparsed so the result reflects
        // the current overlay contents.
        if let Err(err) = self.engine.reparse(record.unit(), overlays) {
            tracing::info!(file, %err, "Reparse failed, evicting cached unit");
            self.evict(file);
            return Err(CacheError::ParseFailed {
                file: file.to_string(),
            });
        }

        record.ref_bump();
        Ok(record)
    }

    /// Like [`TuCache::parse`] but skips the always-reparse when a valid
    /// cached entry with matching flags exists. Used on the completion path
    /// where latency matters more than a fully fresh parse.
    pub fn gen_tu(
        &mut self,
        file: &str,
        flags: &[String],
        overlays: &[Overlay],
    ) -> Result<Rc<TuRecord>, CacheError> {
        let effective = self.effective_flags(flags);
        if let Some(record) = self.find(file, &effective) {
            record.ref_bump();
            return Ok(record);
        }
        self.parse(file, flags, overlays)
    }

    /// Return one reference. Releases the engine resource on the transition
    /// to zero.
    pub fn release(&mut self, record: &Rc<TuRecord>) {
        if record.ref_drop() == 0 {
            self.engine.dispose(record.unit());
        }
    }

    /// Flags as actually handed to the engine: synthetic program token
    /// first, then the caller's flags, then the built-in header search
    /// path. Applied identically on every call so flag comparison against
    /// cached records stays stable.
    fn effective_flags(&self, flags: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(flags.len() + 3);
        out.push(PROGRAM_TOKEN.to_string());
        out.extend(flags.iter().cloned());
        if let Some(dir) = &self.builtin_headers {
            out.push("-isystem".to_string());
            out.push(dir.clone());
        }
        out
    }

    /// Look up a cached record by file key. A record whose flags differ
    /// from the requested ones (elementwise, including length) is evicted
    /// on the spot: a flag change invalidates all caching.
    fn find(&mut self, file: &str, flags: &[String]) -> Option<Rc<TuRecord>> {
        let record = self.units.get(file)?;
        if record.flags() == flags {
            return Some(Rc::clone(record));
        }
        tracing::debug!(file, "Compile flags changed, evicting cached unit");
        self.evict(file);
        None
    }

    fn evict(&mut self, file: &str) {
        if let Some(record) = self.units.remove(file) {
            self.release(&record);
        }
    }

    fn parse_with_retry(
        &mut self,
        file: &str,
        flags: &[String],
        overlays: &[Overlay],
    ) -> Result<UnitHandle, CacheError> {
        let mut attempt = 1;
        loop {
            match self.engine.parse(file, flags, overlays) {
                Ok(unit) => break Ok(unit),
                Err(err) if err.is_crash() && attempt < PARSE_ATTEMPTS => {
                    tracing::warn!(file, attempt, "Engine crashed during parse, retrying");
                    attempt += 1;
                    thread::sleep(CRASH_RETRY_DELAY);
                }
                Err(err) => {
                    tracing::info!(file, %err, "Parse failed");
                    break Err(CacheError::ParseFailed {
                        file: file.to_string(),
                    });
                }
            }
        }
    }
}

impl Drop for TuCache {
    fn drop(&mut self) {
        for (_, record) in self.units.drain() {
            self.engine.dispose(record.unit());
        }
    }
}
