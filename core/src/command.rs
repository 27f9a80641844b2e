//! Command protocol — tokenizer, verb table, and the dispatch loop.
//!
//! A command is one whitespace-separated word list, first word = verb.
//! Quoting follows shell conventions (single/double quotes, backslash
//! escapes); an unterminated quote or trailing escape invalidates the whole
//! line. Each command's output is framed with `\n;;EOT\n` so the editor can
//! detect end-of-response. Responses use the s-expression encoding from
//! [`crate::sexp`].

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use crate::decode::{Candidate, MatchStyle};
use crate::scratch::ScratchFile;
use crate::session::{Session, SessionError};
use crate::sexp::quote;

use csense_types::Diagnostic;

/// End-of-transmission frame printed after every command response.
const EOT_FRAME: &str = "\n;;EOT\n";

/// Runtime switch for verbose logging, handed in by the binary so the
/// `set-debug` verb can flip the active log filter.
pub trait LogSwitch {
    fn set_debug(&mut self, on: bool);
}

/// Whether the loop keeps reading commands after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid command line string")]
pub struct TokenizeError;

/// Split one command line into words.
///
/// Single and double quotes group words; a backslash escapes the next
/// character anywhere, including inside quotes. Unterminated quoting is an
/// error for the whole line.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenizeError> {
    let mut args = Vec::new();
    let mut buf = String::new();
    let mut got = false;
    let mut escaped = false;
    let mut single_quoted = false;
    let mut double_quoted = false;

    for c in line.chars() {
        if escaped {
            buf.push(c);
            got = true;
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if matches!(c, ' ' | '\t' | '\r' | '\n') {
            if single_quoted || double_quoted {
                buf.push(c);
            } else if got {
                args.push(std::mem::take(&mut buf));
                got = false;
            }
            continue;
        }
        match c {
            '"' if !single_quoted => {
                double_quoted = !double_quoted;
                if !double_quoted {
                    args.push(std::mem::take(&mut buf));
                    got = false;
                }
                continue;
            }
            '\'' if !double_quoted => {
                single_quoted = !single_quoted;
                if !single_quoted {
                    args.push(std::mem::take(&mut buf));
                    got = false;
                }
                continue;
            }
            _ => {}
        }
        got = true;
        buf.push(c);
    }

    if got {
        args.push(buf);
    }
    if escaped || single_quoted || double_quoted {
        return Err(TokenizeError);
    }
    Ok(args)
}

/// The closed set of protocol verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Candidates,
    Complete,
    Diagnostics,
    Exit,
    GetCompileOptions,
    GetType,
    Help,
    Parse,
    ResetUnsaved,
    SetDebug,
    SetUnsaved,
}

impl Verb {
    const ALL: [Verb; 11] = [
        Verb::Candidates,
        Verb::Complete,
        Verb::Diagnostics,
        Verb::Exit,
        Verb::GetCompileOptions,
        Verb::GetType,
        Verb::Help,
        Verb::Parse,
        Verb::ResetUnsaved,
        Verb::SetDebug,
        Verb::SetUnsaved,
    ];

    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|verb| verb.name() == word)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Candidates => "candidates",
            Self::Complete => "complete",
            Self::Diagnostics => "diagnostics",
            Self::Exit => "exit",
            Self::GetCompileOptions => "get-compile-options",
            Self::GetType => "get-type",
            Self::Help => "help",
            Self::Parse => "parse",
            Self::ResetUnsaved => "reset-unsaved",
            Self::SetDebug => "set-debug",
            Self::SetUnsaved => "set-unsaved",
        }
    }

    #[must_use]
    fn describe(self) -> &'static str {
        match self {
            Self::Candidates => {
                "[PREFIX [STYLE]] - print completion candidates (requires a previous complete)"
            }
            Self::Complete => {
                "FILE LINE COL [-- [COMPILE_OPTIONS...]] - perform code completion at a given location"
            }
            Self::Diagnostics => "print the diagnostics of the last parse",
            Self::Exit => "exit interactive mode, print nothing",
            Self::GetCompileOptions => {
                "BUILD_DIR FILE - get compile options for FILE from the JSON database in BUILD_DIR"
            }
            Self::GetType => "LINE COL - get type of symbol at a given location",
            Self::Help => "show this message",
            Self::Parse => "FILE [-- [COMPILE_OPTIONS...]] - parse the given file",
            Self::ResetUnsaved => "FILE - reset FILE, its content is up to date",
            Self::SetDebug => "on|off - enable or disable verbose logging",
            Self::SetUnsaved => {
                "FILE UNSAVED - use the content of UNSAVED as the effective content of FILE"
            }
        }
    }
}

/// Usage text printed by the `help` verb and the bare invocation.
#[must_use]
pub fn help_text() -> String {
    let mut out = String::from(
        "usage: csense [OPTIONS...] [COMMAND] [ARGS...]\n\
         \n\
         Options:\n\
         \x20 -i, --interactive\n\
         \x20 -d, --debug\n\
         \x20 -V, --version\n\
         \x20 -h, --help\n\
         \x20 --log-file PATH\n\
         \x20 --builtin-headers DIR\n\
         \n\
         Commands:\n",
    );
    for verb in Verb::ALL {
        let _ = writeln!(out, "{:<25}{}", verb.name(), verb.describe());
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownVerb(String),
    #[error("invalid argument count for '{0}'")]
    BadArgCount(&'static str),
    #[error("{0} isn't an integer")]
    BadNumber(&'static str),
    #[error("unknown match style '{0}'")]
    BadStyle(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything after a literal `--` token, passed through verbatim as
/// compile flags. No `--` means no flags.
fn compile_flags(args: &[String]) -> Vec<String> {
    match args.iter().position(|arg| arg == "--") {
        Some(index) => args[index + 1..].to_vec(),
        None => Vec::new(),
    }
}

fn parse_u32(word: &str, what: &'static str) -> Result<u32, CommandError> {
    word.parse().map_err(|_| CommandError::BadNumber(what))
}

/// Maps verbs onto session operations and owns the response text protocol.
pub struct Dispatcher {
    session: Session,
    scratch: ScratchFile,
    log: Box<dyn LogSwitch>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(session: Session, log: Box<dyn LogSwitch>) -> Self {
        Self {
            session,
            scratch: ScratchFile::new(),
            log,
        }
    }

    /// Read commands from `input` until EOF, `exit`, or an error.
    ///
    /// Malformed lines, unknown verbs, and argument errors end the loop;
    /// empty lines are skipped.
    pub fn run_interactive(&mut self, input: impl BufRead, mut out: impl Write) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let words = match tokenize(&line) {
                Ok(words) => words,
                Err(err) => {
                    tracing::info!(%line, %err, "Invalid input");
                    break;
                }
            };
            if words.is_empty() {
                continue;
            }
            match self.dispatch(&words, &mut out) {
                Ok(Flow::Continue) => {
                    out.write_all(EOT_FRAME.as_bytes())?;
                    out.flush()?;
                }
                Ok(Flow::Quit) => break,
                Err(CommandError::Io(err)) => return Err(err),
                Err(err) => {
                    tracing::info!(command = %words[0], %err, "Command failed");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Dispatch exactly one command (single-shot mode).
    pub fn run_once(&mut self, words: &[String], mut out: impl Write) -> io::Result<()> {
        if words.is_empty() {
            return Ok(());
        }
        match self.dispatch(words, &mut out) {
            Ok(Flow::Continue) => {
                out.write_all(EOT_FRAME.as_bytes())?;
                out.flush()
            }
            Ok(Flow::Quit) => Ok(()),
            Err(CommandError::Io(err)) => Err(err),
            Err(err) => {
                tracing::info!(command = %words[0], %err, "Command failed");
                Ok(())
            }
        }
    }

    /// Run one command against the session, writing its response to `out`.
    fn dispatch(&mut self, words: &[String], out: &mut dyn Write) -> Result<Flow, CommandError> {
        let verb = Verb::from_word(&words[0])
            .ok_or_else(|| CommandError::UnknownVerb(words[0].clone()))?;
        match verb {
            Verb::Help => out.write_all(help_text().as_bytes())?,
            Verb::Exit => return Ok(Flow::Quit),
            Verb::SetDebug => {
                if words.len() < 2 {
                    return Err(CommandError::BadArgCount("set-debug"));
                }
                self.log.set_debug(words[1].eq_ignore_ascii_case("on"));
            }
            Verb::Parse => {
                if words.len() < 2 {
                    return Err(CommandError::BadArgCount("parse"));
                }
                let file = self.fixup_file(&words[1])?;
                let flags = compile_flags(&words[2..]);
                match self.session.parse(&file, &flags) {
                    Ok(()) => write_success(out)?,
                    Err(err) => write_error(out, &err)?,
                }
            }
            Verb::Complete => {
                if words.len() < 4 {
                    return Err(CommandError::BadArgCount("complete"));
                }
                let file = self.fixup_file(&words[1])?;
                let line = parse_u32(&words[2], "line")?;
                let col = parse_u32(&words[3], "column")?;
                let flags = compile_flags(&words[4..]);
                match self.session.complete(&file, line, col, &flags) {
                    Ok(()) => write_success(out)?,
                    Err(err) => write_error(out, &err)?,
                }
            }
            Verb::Candidates => {
                let prefix = words.get(1).map_or("", String::as_str);
                let style = match words.get(2) {
                    Some(token) => MatchStyle::from_token(token)
                        .ok_or_else(|| CommandError::BadStyle(token.clone()))?,
                    None => MatchStyle::Exact,
                };
                match self.session.candidates(prefix, style) {
                    Some(candidates) => write_candidates(out, &candidates)?,
                    None => writeln!(out, "nil")?,
                }
            }
            Verb::Diagnostics => {
                let diagnostics = self.session.diagnostics();
                write_diagnostics(out, &diagnostics)?;
            }
            Verb::GetType => {
                if words.len() < 3 {
                    return Err(CommandError::BadArgCount("get-type"));
                }
                let line = parse_u32(&words[1], "line")?;
                let col = parse_u32(&words[2], "column")?;
                match self.session.get_type(line, col) {
                    Some(spellings) => write_type(out, &spellings)?,
                    None => write!(out, "nil")?,
                }
            }
            Verb::SetUnsaved => {
                if words.len() != 3 {
                    return Err(CommandError::BadArgCount("set-unsaved"));
                }
                let file = self.fixup_file(&words[1])?;
                match self.session.set_unsaved(&file, &words[2]) {
                    Ok(()) => write_success(out)?,
                    Err(err) => write_error(out, &err)?,
                }
            }
            Verb::ResetUnsaved => {
                if words.len() != 2 {
                    return Err(CommandError::BadArgCount("reset-unsaved"));
                }
                let file = self.fixup_file(&words[1])?;
                self.session.reset_unsaved(&file);
                write_success(out)?;
            }
            Verb::GetCompileOptions => {
                if words.len() != 3 {
                    return Err(CommandError::BadArgCount("get-compile-options"));
                }
                let file = self.fixup_file(&words[2])?;
                match self.session.get_compile_options(&words[1], &file) {
                    Some(commands) => {
                        for command in commands {
                            for arg in &command.args {
                                write!(out, "{} ", quote(arg))?;
                            }
                            writeln!(out)?;
                            writeln!(out, "{}", quote(&command.directory))?;
                        }
                    }
                    None => write!(out, "nil")?,
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// `-` stands for the process-wide scratch file.
    fn fixup_file(&mut self, word: &str) -> Result<String, CommandError> {
        if word == "-" {
            let path = self.scratch.path()?;
            let path = path.to_string_lossy().into_owned();
            tracing::debug!(%path, "Substituting - with scratch file");
            Ok(path)
        } else {
            Ok(word.to_string())
        }
    }
}

fn write_success(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "(success . t)")
}

fn write_error(out: &mut dyn Write, err: &SessionError) -> io::Result<()> {
    match err {
        SessionError::FileRead { file, source_path } => writeln!(
            out,
            "(error . (file-read-error \"failed to read unsaved buffer\" {} {}))",
            quote(file),
            quote(source_path)
        ),
        SessionError::Parse { file } => writeln!(
            out,
            "(error . (parse-error \"failed to parse file\" {}))",
            quote(file)
        ),
        SessionError::Complete { file, line, col } => writeln!(
            out,
            "(error . (complete-error \"failed to perform code completion\" {} {line} {col}))",
            quote(file)
        ),
    }
}

fn write_diagnostics(out: &mut dyn Write, diagnostics: &[Diagnostic]) -> io::Result<()> {
    writeln!(out, "(")?;
    for diag in diagnostics {
        writeln!(
            out,
            "({} {} {} {} {} {})",
            quote(diag.file()),
            diag.line(),
            diag.col(),
            diag.offset(),
            diag.severity().label(),
            quote(diag.message())
        )?;
    }
    writeln!(out, ")")
}

fn write_candidates(out: &mut dyn Write, candidates: &[Candidate]) -> io::Result<()> {
    write!(out, "(")?;
    for candidate in candidates {
        write!(
            out,
            "  ({} {} {} {} {} {} ({}",
            quote(candidate.typed_text()),
            candidate.priority(),
            quote(candidate.result_type()),
            quote(candidate.brief_comment()),
            quote(candidate.prototype()),
            candidate.annotation_start(),
            quote(candidate.post_completion_text())
        )?;
        for span in candidate.placeholder_spans() {
            write!(out, " {span}")?;
        }
        writeln!(out, ") {})", candidate.availability().label())?;
    }
    write!(out, ")")
}

fn write_type(out: &mut dyn Write, spellings: &[String]) -> io::Result<()> {
    write!(out, "(")?;
    for spelling in spellings {
        write!(out, "{} ", quote(spelling))?;
    }
    write!(out, ")")
}
