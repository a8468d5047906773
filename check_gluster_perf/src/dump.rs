//! GlusterFS io-stats dump reader
//!
//! Depending on its version GlusterFS either wraps the dump in a single JSON
//! array or writes one bare JSON object after another with nothing in between.
//! The latter is not a valid JSON document, so the reader walks the text
//! looking for balanced top-level objects and hands each one to `serde_json`
//! on its own.

use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Errors produced while reading a dump.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A `}` appeared with no object open.
    #[error("Unmatched '}}' at line {line}, column {column}")]
    UnmatchedClose {
        /// 1-based line of the brace
        line: usize,
        /// 1-based column of the brace
        column: usize,
    },
    /// The input ended before the object opened at `line`/`column` closed.
    #[error("Unterminated object starting at line {line}, column {column}")]
    Unterminated {
        /// 1-based line of the opening brace
        line: usize,
        /// 1-based column of the opening brace
        column: usize,
    },
    /// A fragment bounded by braces was not valid JSON.
    #[error("Malformed JSON at line {line}, column {column}: {source}; fragment: {fragment}")]
    Json {
        /// 1-based line where the fragment starts
        line: usize,
        /// 1-based column where the fragment starts
        column: usize,
        /// The offending text
        fragment: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
    /// A root of the dump was something other than an object.
    #[error("Expected a JSON object as root {index}, found {found}")]
    NotAnObject {
        /// Position of the root in the dump
        index: usize,
        /// Kind of JSON value found instead
        found: &'static str,
    },
    /// A metric's value was neither a string nor a number.
    #[error("Metric '{key}' holds a {found}, expected a string-encoded number")]
    NotFlat {
        /// The metric name
        key: String,
        /// Kind of JSON value found instead
        found: &'static str,
    },
}

/// One top-level object of a dump: metric name and raw value pairs in the
/// order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawObject {
    entries: Vec<(String, String)>,
}

impl RawObject {
    /// Iterate over `(name, raw value)` pairs in dump order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Look up the raw value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of entries in this object.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this object has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn from_map(map: Map<String, Value>) -> Result<Self, Error> {
        let entries = map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => Ok((key, s)),
                Value::Number(n) => Ok((key, n.to_string())),
                other => Err(Error::NotFlat {
                    key,
                    found: kind(&other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// What the scanner sees next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    OpenArray,
    Other,
}

/// Scanner state between characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No object open.
    Idle,
    /// Inside a top-level object that began at byte `start`.
    Object {
        start: usize,
        depth: usize,
        in_string: bool,
        escaped: bool,
    },
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    /// A top-level object spans `start..=end`.
    Complete { start: usize },
    /// The remaining input is one array document.
    Array,
    /// A `}` with nothing open.
    Unmatched,
}

impl State {
    /// Advance on character `ch` found at byte `offset`. `fresh` is true while
    /// no object has been found yet.
    fn step(self, ch: char, offset: usize, fresh: bool) -> (State, Action) {
        match self {
            State::Idle => match classify(ch) {
                Token::Open => (
                    State::Object {
                        start: offset,
                        depth: 1,
                        in_string: false,
                        escaped: false,
                    },
                    Action::None,
                ),
                Token::Close => (State::Idle, Action::Unmatched),
                Token::OpenArray if fresh => (State::Idle, Action::Array),
                Token::OpenArray | Token::Other => (State::Idle, Action::None),
            },
            State::Object {
                start,
                depth,
                in_string: true,
                escaped,
            } => {
                let (in_string, escaped) = match (escaped, ch) {
                    (true, _) => (true, false),
                    (false, '\\') => (true, true),
                    (false, '"') => (false, false),
                    (false, _) => (true, false),
                };
                (
                    State::Object {
                        start,
                        depth,
                        in_string,
                        escaped,
                    },
                    Action::None,
                )
            }
            State::Object {
                start,
                depth,
                in_string: false,
                ..
            } => {
                let depth = match (ch, classify(ch)) {
                    ('"', _) => {
                        return (
                            State::Object {
                                start,
                                depth,
                                in_string: true,
                                escaped: false,
                            },
                            Action::None,
                        );
                    }
                    (_, Token::Open) => depth + 1,
                    (_, Token::Close) => depth - 1,
                    _ => depth,
                };
                if depth == 0 {
                    (State::Idle, Action::Complete { start })
                } else {
                    (
                        State::Object {
                            start,
                            depth,
                            in_string: false,
                            escaped: false,
                        },
                        Action::None,
                    )
                }
            }
        }
    }
}

fn classify(ch: char) -> Token {
    match ch {
        '{' => Token::Open,
        '}' => Token::Close,
        '[' => Token::OpenArray,
        _ => Token::Other,
    }
}

/// Translate a byte offset into a 1-based line and column.
fn position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}

fn parse_fragment(text: &str, start: usize, fragment: &str) -> Result<Value, Error> {
    serde_json::from_str(fragment).map_err(|source| {
        let (line, column) = position(text, start);
        Error::Json {
            line,
            column,
            fragment: fragment.to_string(),
            source,
        }
    })
}

/// Read every top-level object from a dump.
///
/// # Errors
///
/// Function will return an error if a `}` closes nothing, if the text ends
/// inside an object, if a fragment is not valid JSON or if a value is not a
/// flat string or number.
pub fn read(text: &str) -> Result<Vec<RawObject>, Error> {
    let mut objects = Vec::new();
    let mut state = State::Idle;

    for (offset, ch) in text.char_indices() {
        let (next, action) = state.step(ch, offset, objects.is_empty());
        state = next;
        match action {
            Action::None => {}
            Action::Complete { start } => {
                let fragment = &text[start..=offset];
                let map = match parse_fragment(text, start, fragment)? {
                    Value::Object(map) => map,
                    other => {
                        return Err(Error::NotAnObject {
                            index: objects.len(),
                            found: kind(&other),
                        });
                    }
                };
                trace!(start, end = offset, "top-level object closed");
                objects.push(RawObject::from_map(map)?);
            }
            Action::Array => {
                debug!(offset, "dump is a single array, parsing the remainder whole");
                return read_array(text, offset);
            }
            Action::Unmatched => {
                let (line, column) = position(text, offset);
                return Err(Error::UnmatchedClose { line, column });
            }
        }
    }

    if let State::Object { start, .. } = state {
        let (line, column) = position(text, start);
        return Err(Error::Unterminated { line, column });
    }

    debug!(objects = objects.len(), "dump read");
    Ok(objects)
}

fn read_array(text: &str, start: usize) -> Result<Vec<RawObject>, Error> {
    match parse_fragment(text, start, &text[start..])? {
        Value::Array(elements) => elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| match element {
                Value::Object(map) => RawObject::from_map(map),
                other => Err(Error::NotAnObject {
                    index,
                    found: kind(&other),
                }),
            })
            .collect(),
        Value::Object(map) => Ok(vec![RawObject::from_map(map)?]),
        other => Err(Error::NotAnObject {
            index: 0,
            found: kind(&other),
        }),
    }
}
