//! Edit-script parsing for the headless runner.
//!
//! One command per line. Blank lines and `#` comments are skipped.
//!
//! ```text
//! set A1 2
//! set A2 =A1+3
//! set B1 'escaped text
//! clear A1
//! ```

use gridcalc_engine::position::Position;

/// A single script command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set the cell's content. The text is everything after the position,
    /// with surrounding whitespace trimmed (use the `'` escape to keep a
    /// value literal).
    Set(Position, String),
    Clear(Position),
}

/// Parse one script line. `Ok(None)` for blanks and comments.
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb {
        "set" => {
            let (pos_str, text) = match rest.split_once(char::is_whitespace) {
                Some((pos_str, text)) => (pos_str, text.trim()),
                None => (rest, ""),
            };
            let pos = parse_position(pos_str)?;
            Ok(Some(Command::Set(pos, text.to_string())))
        }
        "clear" => {
            let pos = parse_position(rest)?;
            Ok(Some(Command::Clear(pos)))
        }
        other => Err(format!("unknown command: {}", other)),
    }
}

fn parse_position(s: &str) -> Result<Position, String> {
    if s.is_empty() {
        return Err("missing cell position".to_string());
    }
    s.parse().map_err(|_| format!("not a cell position: {}", s))
}
