use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use finch_compiler::diagnostics::Diagnostic;
use finch_compiler::lexer::tokenize;
use finch_compiler::parser::Parser;
use finch_compiler::session::{Session, UnitOutcome};
use inkwell::context::Context;

fn main() {
    let arg = env::args().nth(1);

    let context = Context::create();
    let mut session = match Session::new(&context) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: failed to start JIT session: {}", e);
            return;
        }
    };

    match arg {
        Some(path) => run_file(&mut session, Path::new(&path)),
        None => run_repl(&mut session),
    }
}

fn run_file(session: &mut Session, path: &Path) {
    let filename = path.to_string_lossy().to_string();
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: failed to read {}: {}", filename, e);
            return;
        }
    };

    run_source(session, &filename, &source);
}

fn run_repl(session: &mut Session) {
    println!("finch 0.1.0");
    println!("Type exit to quit");
    println!();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" {
            break;
        }

        run_source(session, "<repl>", input);
    }

    println!("Goodbye!");
}

// Feeds units to the session one at a time; a failed unit is reported and
// skipped, later units still run.
fn run_source(session: &mut Session, filename: &str, source: &str) {
    let mut parser = Parser::new(tokenize(source));
    loop {
        match parser.next_unit() {
            Ok(None) => break,
            Ok(Some(unit)) => match session.handle_unit(unit) {
                Ok(UnitOutcome::Value(value)) => println!("= {}", value),
                Ok(UnitOutcome::Defined(name)) => println!("defined {}", name),
                Ok(UnitOutcome::Declared(name)) => println!("declared {}", name),
                Err(e) => eprintln!("error: {}", e),
            },
            Err(diag) => {
                print_diagnostic(filename, source, &diag);
                parser.synchronize();
            }
        }
    }
}

fn print_diagnostic(filename: &str, source: &str, d: &Diagnostic) {
    let (line, col) = byte_to_line_col(source, d.span.start);

    let start = d.span.start.min(source.len());
    let end = d.span.end.min(source.len());

    let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[end..]
        .find('\n')
        .map(|off| end + off)
        .unwrap_or_else(|| source.len());
    let line_text = &source[line_start..line_end];

    let rel_start = start.saturating_sub(line_start);
    let rel_end = {
        let r = end.saturating_sub(line_start);
        r.max(rel_start + 1)
    };

    let mut underline = String::new();
    for (byte_idx, ch) in line_text.char_indices() {
        if byte_idx < rel_start {
            if ch == '\t' {
                underline.push('\t');
            } else {
                underline.push(' ');
            }
        } else if byte_idx < rel_end {
            underline.push('^');
        }
    }
    if underline.len() <= rel_start {
        // span points past the end of the line (e.g. at end of input)
        while underline.len() < rel_start {
            underline.push(' ');
        }
        underline.push('^');
    }

    eprintln!("\x1b[31merror\x1b[0m: {}", d.message);
    eprintln!(" --> {}:{}:{}", filename, line, col);
    eprintln!("  |");
    eprintln!("{:>3} | {}", line, line_text);
    eprintln!("    | {}", underline);
}

fn byte_to_line_col(source: &str, byte_idx: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (idx, ch) in source.char_indices() {
        if idx >= byte_idx {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}
