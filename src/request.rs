//! Line protocol: `latitude longitude magnitude event_id output_path`, split
//! with POSIX shell quoting so paths may contain spaces.

use crate::error::{ParseError, QuakeMapResult};
use crate::event::EarthquakeEvent;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    pub event: EarthquakeEvent,
    pub output: PathBuf,
}

/// Parse one request line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> QuakeMapResult<Option<RenderRequest>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let tokens = split(line)?;
    let [latitude, longitude, magnitude, event_id, output]: [String; 5] = tokens
        .try_into()
        .map_err(|tokens: Vec<String>| ParseError::WrongTokenCount(tokens.len()))?;

    let latitude = parse_number("latitude", &latitude)?;
    let longitude = parse_number("longitude", &longitude)?;
    let magnitude = parse_number("magnitude", &magnitude)?;
    let event = EarthquakeEvent::new(latitude, longitude, magnitude, Some(event_id))?;

    Ok(Some(RenderRequest {
        event,
        output: PathBuf::from(output),
    }))
}

fn parse_number(field: &'static str, token: &str) -> Result<f64, ParseError> {
    token.trim().parse().map_err(|_| ParseError::BadNumber {
        field,
        token: token.to_string(),
    })
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    /// Between tokens
    Space,
    Word,
    Single,
    Double,
}

/// POSIX shell word splitting without expansion.
pub fn split(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = vec![];
    let mut current = String::new();
    let mut state = State::Space;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Space | State::Word => match c {
                c if c.is_whitespace() => {
                    if state == State::Word {
                        tokens.push(std::mem::take(&mut current));
                        state = State::Space;
                    }
                }
                '\'' => state = State::Single,
                '"' => state = State::Double,
                '\\' => {
                    match chars.next() {
                        // Escaped newline is a line continuation
                        Some('\n') => {}
                        Some(escaped) => current.push(escaped),
                        None => return Err(ParseError::TrailingEscape),
                    }
                    state = State::Word;
                }
                c => {
                    current.push(c);
                    state = State::Word;
                }
            },
            State::Single => match c {
                '\'' => state = State::Word,
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Word,
                '\\' => match chars.next() {
                    Some(escaped @ ('\\' | '"' | '$' | '`')) => current.push(escaped),
                    Some('\n') => {}
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => return Err(ParseError::UnclosedQuote('"')),
                },
                c => current.push(c),
            },
        }
    }

    match state {
        State::Single => Err(ParseError::UnclosedQuote('\'')),
        State::Double => Err(ParseError::UnclosedQuote('"')),
        State::Word => {
            tokens.push(current);
            Ok(tokens)
        }
        State::Space => Ok(tokens),
    }
}
