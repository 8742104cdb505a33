use std::io::{IsTerminal, Read};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use uscheme::error::Result;
use uscheme::eval::Interp;
use uscheme::printer::print;
use uscheme::reader;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut interp = Interp::new();

    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("usage: uscheme [file ...]");
        eprintln!("With no files, reads expressions from stdin.");
        return Ok(());
    }

    if !files.is_empty() {
        for path in &files {
            info!(path, "loading file");
            let source = std::fs::read_to_string(path)?;
            run_source(&mut interp, &source)?;
        }
        return Ok(());
    }

    if std::io::stdin().is_terminal() {
        repl(&mut interp)
    } else {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        run_source(&mut interp, &source)
    }
}

/// Evaluate and print every expression in `source`, collecting after each
/// so the arena only ever holds what the global scope can reach.
fn run_source(interp: &mut Interp, source: &str) -> Result<()> {
    let mut pos = 0;
    while let Some((expr, next)) = reader::read_one_at(source, pos, interp)? {
        pos = next;
        let result = interp.eval(expr, interp.global());
        println!("{}", print(interp, result));
        interp.collect();
    }
    Ok(())
}

fn repl(interp: &mut Interp) -> Result<()> {
    let mut editor = DefaultEditor::new().map_err(readline_io)?;
    let history = history_path();
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { "> " } else { ".. " };
        match editor.readline(prompt) {
            Ok(line) => {
                pending.push_str(&line);
                pending.push('\n');
                // Keep reading lines until the parens balance out.
                if paren_depth(&pending) > 0 {
                    continue;
                }
                let _ = editor.add_history_entry(pending.trim_end());
                match run_source(interp, &pending) {
                    Ok(()) => {}
                    Err(err) => eprintln!("error: {err}"),
                }
                pending.clear();
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("error: {err}");
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }
    Ok(())
}

fn history_path() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(|home| std::path::PathBuf::from(home).join(".uscheme_history"))
}

fn readline_io(err: ReadlineError) -> uscheme::error::Error {
    uscheme::error::Error::Io(std::io::Error::other(err))
}

/// Net paren depth of the buffered input, ignoring parens inside strings
/// and comments. Negative depth means the next parse will fail anyway, so
/// anything non-positive is handed to the reader.
fn paren_depth(source: &str) -> i32 {
    let mut depth = 0;
    let mut in_string = false;
    let mut in_comment = false;
    for b in source.bytes() {
        if in_comment {
            if b == b'\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b';' => in_comment = true,
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
    }
    depth
}
