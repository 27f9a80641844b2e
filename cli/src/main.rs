//! csense binary — startup flags, logging, and command-loop wiring.
//!
//! Interactive mode (`-i`) reads one command per line from stdin until EOF
//! or `exit`; otherwise the remaining argv words form exactly one command.
//! Startup options are parsed with clap, but the command tail is split off
//! beforehand so its words (including a literal `--` before compile flags)
//! reach the dispatcher verbatim.

mod logging;

use std::env;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use csense_core::{Dispatcher, Session, command};
use csense_engine::ClangEngine;

#[derive(Parser)]
#[command(
    name = "csense",
    about = "C/C++ code intelligence daemon for editors",
    disable_version_flag = true
)]
struct Cli {
    /// Read commands from stdin until EOF or `exit`.
    #[arg(short, long)]
    interactive: bool,

    /// Start with debug-level logging enabled.
    #[arg(short, long)]
    debug: bool,

    /// Append logs to PATH instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Built-in header search path, appended as `-isystem DIR` to every
    /// parse.
    #[arg(long, value_name = "DIR", env = "CSENSE_BUILTIN_HEADERS")]
    builtin_headers: Option<String>,

    /// Print version information, including the engine's, and exit.
    #[arg(short = 'V', long)]
    version: bool,
}

/// Options that consume the following argv word.
const VALUE_OPTIONS: [&str; 2] = ["--log-file", "--builtin-headers"];

/// Split argv into the option head (for clap) and the command tail (for the
/// dispatcher). The tail starts at the first word that is neither an option
/// nor an option value; a bare `-` counts as command data, not an option.
fn split_argv(args: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut iter = args.into_iter();
    let mut head = vec![iter.next().unwrap_or_default()];
    let mut tail = Vec::new();

    while let Some(arg) = iter.next() {
        if arg.starts_with('-') && arg != "-" {
            let takes_value = VALUE_OPTIONS.contains(&arg.as_str());
            head.push(arg);
            if takes_value && let Some(value) = iter.next() {
                head.push(value);
            }
        } else {
            tail.push(arg);
            tail.extend(iter);
            break;
        }
    }
    (head, tail)
}

fn main() -> Result<()> {
    let (options, command_words) = split_argv(env::args().collect());
    let cli = Cli::parse_from(options);

    let log = logging::init(cli.debug, cli.log_file.as_deref())?;

    if cli.version {
        println!("csense version {}", env!("CARGO_PKG_VERSION"));
        println!("{}", csense_engine::clang::version_string());
        return Ok(());
    }

    if !cli.interactive && command_words.is_empty() {
        print!("{}", command::help_text());
        return Ok(());
    }

    if let Some(dir) = &cli.builtin_headers {
        tracing::info!(%dir, "Built-in header search path configured");
    }

    let session = Session::new(Box::new(ClangEngine::new()), cli.builtin_headers);
    let mut dispatcher = Dispatcher::new(session, Box::new(log));

    let stdout = io::stdout();
    if cli.interactive {
        let stdin = io::stdin();
        dispatcher
            .run_interactive(stdin.lock(), stdout.lock())
            .context("command loop failed")?;
    } else {
        dispatcher
            .run_once(&command_words, stdout.lock())
            .context("command failed")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_split_keeps_options_in_head() {
        let (head, tail) = split_argv(words(&["csense", "-i", "--debug"]));
        assert_eq!(head, words(&["csense", "-i", "--debug"]));
        assert!(tail.is_empty());
    }

    #[test]
    fn test_split_value_option_consumes_value() {
        let (head, tail) = split_argv(words(&["csense", "--log-file", "/tmp/x.log", "parse", "a.c"]));
        assert_eq!(head, words(&["csense", "--log-file", "/tmp/x.log"]));
        assert_eq!(tail, words(&["parse", "a.c"]));
    }

    #[test]
    fn test_split_command_tail_is_verbatim() {
        let (head, tail) = split_argv(words(&["csense", "-d", "complete", "a.c", "3", "7", "--", "-Wall"]));
        assert_eq!(head, words(&["csense", "-d"]));
        assert_eq!(tail, words(&["complete", "a.c", "3", "7", "--", "-Wall"]));
    }

    #[test]
    fn test_split_dash_is_command_data() {
        let (head, tail) = split_argv(words(&["csense", "parse", "-"]));
        assert_eq!(head, words(&["csense"]));
        assert_eq!(tail, words(&["parse", "-"]));
    }

    #[test]
    fn test_cli_parses_split_head() {
        let (head, _) = split_argv(words(&["csense", "-i", "--builtin-headers", "/opt/h", "parse", "a.c"]));
        let cli = Cli::parse_from(head);
        assert!(cli.interactive);
        assert_eq!(cli.builtin_headers.as_deref(), Some("/opt/h"));
    }
}
