//! libclang shim — the raw binding layer implementing [`Engine`].
//!
//! Everything unsafe lives here. Units are kept in an id-keyed table so the
//! rest of the system only ever sees [`UnitHandle`] tokens, and every string
//! or record that crosses the boundary is copied out of engine memory before
//! the engine-side buffer is released.

#![allow(clippy::wildcard_imports)]

use std::collections::HashMap;
use std::ffi::CString;
use std::ptr;

use clang_sys::*;
use libc::{c_char, c_int, c_uint, c_ulong};

use csense_types::{
    Availability, Chunk, ChunkKind, CompletionRecord, Diagnostic, Overlay, Severity,
};

use crate::api::{CompileCommand, Engine, EngineError, TypeInfo, UnitHandle};

/// Copy a CXString into owned memory and dispose the engine-side buffer.
fn into_string(s: CXString) -> String {
    unsafe {
        let cstr = clang_getCString(s);
        let owned = if cstr.is_null() {
            String::new()
        } else {
            std::ffi::CStr::from_ptr(cstr).to_string_lossy().into_owned()
        };
        clang_disposeString(s);
        owned
    }
}

/// NUL-safe conversion for strings handed to the engine. Interior NUL bytes
/// cannot cross the C boundary; they are stripped rather than refused.
fn to_cstring(s: &str) -> CString {
    CString::new(s).unwrap_or_else(|_| {
        let cleaned: Vec<u8> = s.bytes().filter(|b| *b != 0).collect();
        CString::new(cleaned).unwrap_or_default()
    })
}

fn error_from_code(code: c_int) -> EngineError {
    match code {
        CXError_Crashed => EngineError::Crashed,
        CXError_InvalidArguments => EngineError::InvalidArguments,
        CXError_ASTReadError => EngineError::AstRead,
        other => EngineError::Failed(other),
    }
}

/// Marshalled overlay set. Keeps the backing CStrings alive for as long as
/// the raw `CXUnsavedFile` array is in use.
struct UnsavedBuffers {
    _names: Vec<CString>,
    _contents: Vec<CString>,
    raw: Vec<CXUnsavedFile>,
}

impl UnsavedBuffers {
    fn new(overlays: &[Overlay]) -> Self {
        let names: Vec<CString> = overlays.iter().map(|o| to_cstring(o.path())).collect();
        let contents: Vec<CString> = overlays.iter().map(|o| to_cstring(o.contents())).collect();
        let raw = names
            .iter()
            .zip(&contents)
            .map(|(name, text)| CXUnsavedFile {
                Filename: name.as_ptr(),
                Contents: text.as_ptr(),
                Length: text.as_bytes().len() as c_ulong,
            })
            .collect();
        Self {
            _names: names,
            _contents: contents,
            raw,
        }
    }

    fn as_mut_ptr(&mut self) -> *mut CXUnsavedFile {
        if self.raw.is_empty() {
            ptr::null_mut()
        } else {
            self.raw.as_mut_ptr()
        }
    }

    fn len(&self) -> c_uint {
        self.raw.len() as c_uint
    }
}

/// Production [`Engine`] over libclang.
///
/// Owns one engine index for the process lifetime plus the table of live
/// translation units.
pub struct ClangEngine {
    index: CXIndex,
    parse_options: CXTranslationUnit_Flags,
    units: HashMap<u64, CXTranslationUnit>,
    next_unit: u64,
}

impl ClangEngine {
    #[must_use]
    pub fn new() -> Self {
        let index = unsafe { clang_createIndex(0, 0) };
        let parse_options = unsafe { clang_defaultEditingTranslationUnitOptions() }
            | CXTranslationUnit_DetailedPreprocessingRecord
            | CXTranslationUnit_KeepGoing;
        Self {
            index,
            parse_options,
            units: HashMap::new(),
            next_unit: 1,
        }
    }

    fn unit(&self, handle: UnitHandle) -> Option<CXTranslationUnit> {
        let tu = self.units.get(&handle.raw()).copied();
        if tu.is_none() {
            tracing::error!(unit = handle.raw(), "Query against unknown translation unit");
        }
        tu
    }
}

impl Default for ClangEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClangEngine {
    fn drop(&mut self) {
        unsafe {
            for (_, tu) in self.units.drain() {
                clang_disposeTranslationUnit(tu);
            }
            clang_disposeIndex(self.index);
        }
    }
}

impl Engine for ClangEngine {
    fn parse(
        &mut self,
        file: &str,
        args: &[String],
        overlays: &[Overlay],
    ) -> Result<UnitHandle, EngineError> {
        let c_file = to_cstring(file);
        let c_args: Vec<CString> = args.iter().map(|a| to_cstring(a)).collect();
        let arg_ptrs: Vec<*const c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
        let mut unsaved = UnsavedBuffers::new(overlays);

        let mut tu: CXTranslationUnit = ptr::null_mut();
        let code = unsafe {
            clang_parseTranslationUnit2FullArgv(
                self.index,
                c_file.as_ptr(),
                arg_ptrs.as_ptr(),
                arg_ptrs.len() as c_int,
                unsaved.as_mut_ptr(),
                unsaved.len(),
                self.parse_options,
                &mut tu,
            )
        };

        if tu.is_null() {
            tracing::info!(file, code, "Parse produced no translation unit");
            return Err(error_from_code(code));
        }

        let id = self.next_unit;
        self.next_unit += 1;
        self.units.insert(id, tu);
        Ok(UnitHandle::new(id))
    }

    fn reparse(&mut self, unit: UnitHandle, overlays: &[Overlay]) -> Result<(), EngineError> {
        let Some(tu) = self.unit(unit) else {
            return Err(EngineError::InvalidArguments);
        };
        let mut unsaved = UnsavedBuffers::new(overlays);
        let code = unsafe {
            clang_reparseTranslationUnit(
                tu,
                unsaved.len(),
                unsaved.as_mut_ptr(),
                clang_defaultReparseOptions(tu),
            )
        };
        if code == 0 {
            Ok(())
        } else {
            tracing::info!(unit = unit.raw(), code, "Reparse failed");
            Err(error_from_code(code))
        }
    }

    fn dispose(&mut self, unit: UnitHandle) {
        if let Some(tu) = self.units.remove(&unit.raw()) {
            unsafe { clang_disposeTranslationUnit(tu) };
        }
    }

    fn diagnostics(&mut self, unit: UnitHandle) -> Vec<Diagnostic> {
        let Some(tu) = self.unit(unit) else {
            return Vec::new();
        };
        let count = unsafe { clang_getNumDiagnostics(tu) };
        let mut out = Vec::with_capacity(count as usize);
        for i in 0..count {
            unsafe {
                let diag = clang_getDiagnostic(tu, i);
                let severity = Severity::from_engine(clang_getDiagnosticSeverity(diag) as u32)
                    .unwrap_or(Severity::Ignored);
                let message = into_string(clang_getDiagnosticSpelling(diag));

                let location = clang_getDiagnosticLocation(diag);
                if clang_equalLocations(location, clang_getNullLocation()) != 0 {
                    out.push(Diagnostic::unlocated(severity, message));
                } else {
                    let mut file: CXFile = ptr::null_mut();
                    let mut line: c_uint = 0;
                    let mut col: c_uint = 0;
                    let mut offset: c_uint = 0;
                    clang_getExpansionLocation(location, &mut file, &mut line, &mut col, &mut offset);
                    let name = if file.is_null() {
                        String::new()
                    } else {
                        into_string(clang_getFileName(file))
                    };
                    out.push(Diagnostic::new(name, line, col, offset, severity, message));
                }
                clang_disposeDiagnostic(diag);
            }
        }
        out
    }

    fn complete_at(
        &mut self,
        unit: UnitHandle,
        file: &str,
        line: u32,
        col: u32,
        overlays: &[Overlay],
    ) -> Option<Vec<CompletionRecord>> {
        let tu = self.unit(unit)?;
        let c_file = to_cstring(file);
        let mut unsaved = UnsavedBuffers::new(overlays);
        let options =
            unsafe { clang_defaultCodeCompleteOptions() } & !CXCodeComplete_IncludeCodePatterns;

        let results = unsafe {
            clang_codeCompleteAt(
                tu,
                c_file.as_ptr(),
                line,
                col,
                unsaved.as_mut_ptr(),
                unsaved.len(),
                options,
            )
        };
        if results.is_null() {
            tracing::info!(file, line, col, "Code completion produced no result set");
            return None;
        }

        let mut records = Vec::new();
        unsafe {
            let count = (*results).NumResults as usize;
            for i in 0..count {
                let result = *(*results).Results.add(i);
                let cs = result.CompletionString;
                let availability =
                    Availability::from_engine(clang_getCompletionAvailability(cs) as u32)
                        .unwrap_or(Availability::NotAvailable);
                let priority = clang_getCompletionPriority(cs);
                let brief = into_string(clang_getCompletionBriefComment(cs));

                let chunk_count = clang_getNumCompletionChunks(cs);
                let mut chunks = Vec::with_capacity(chunk_count as usize);
                for j in 0..chunk_count {
                    let Some(kind) =
                        ChunkKind::from_engine(clang_getCompletionChunkKind(cs, j) as u32)
                    else {
                        continue;
                    };
                    let text = into_string(clang_getCompletionChunkText(cs, j));
                    chunks.push(Chunk::new(kind, text));
                }
                records.push(CompletionRecord::new(priority, availability, brief, chunks));
            }
            clang_disposeCodeCompleteResults(results);
        }
        Some(records)
    }

    fn type_at(&mut self, unit: UnitHandle, file: &str, line: u32, col: u32) -> Option<TypeInfo> {
        let tu = self.unit(unit)?;
        let c_file = to_cstring(file);
        unsafe {
            let cx_file = clang_getFile(tu, c_file.as_ptr());
            let location = clang_getLocation(tu, cx_file, line, col);
            let cursor = clang_getCursor(tu, location);
            if clang_Cursor_isNull(cursor) != 0 {
                return None;
            }
            let ty = clang_getCursorType(cursor);
            let spelling = into_string(clang_getTypeSpelling(ty));
            let canonical = into_string(clang_getTypeSpelling(clang_getCanonicalType(ty)));
            Some(TypeInfo {
                spelling,
                canonical,
            })
        }
    }

    fn compile_commands(&mut self, build_dir: &str, file: &str) -> Option<Vec<CompileCommand>> {
        let c_dir = to_cstring(build_dir);
        let c_file = to_cstring(file);
        unsafe {
            let mut error: CXCompilationDatabase_Error = CXCompilationDatabase_NoError;
            let database = clang_CompilationDatabase_fromDirectory(c_dir.as_ptr(), &mut error);
            if error != CXCompilationDatabase_NoError {
                tracing::info!(build_dir, "Cannot load compilation database");
                return None;
            }

            let commands = clang_CompilationDatabase_getCompileCommands(database, c_file.as_ptr());
            let count = clang_CompileCommands_getSize(commands);
            let mut out = Vec::with_capacity(count as usize);
            for i in 0..count {
                let command = clang_CompileCommands_getCommand(commands, i);
                let arg_count = clang_CompileCommand_getNumArgs(command);
                let mut args = Vec::with_capacity(arg_count as usize);
                for j in 0..arg_count {
                    args.push(into_string(clang_CompileCommand_getArg(command, j)));
                }
                let directory = into_string(clang_CompileCommand_getDirectory(command));
                out.push(CompileCommand { args, directory });
            }
            clang_CompileCommands_dispose(commands);
            clang_CompilationDatabase_dispose(database);
            Some(out)
        }
    }
}

/// The engine's own version banner.
#[must_use]
pub fn version_string() -> String {
    into_string(unsafe { clang_getClangVersion() })
}
