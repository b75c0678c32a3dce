use super::attributes;
use super::unescape::unescape_mi_string;
use crate::{DbgError, DbgResult};

/// Class token of a result record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResultClass {
    /// `^done` - the request succeeded.
    Done,
    /// `^running` - an exec request was accepted, the target is running.
    Running,
    /// `^error` - the request failed; the record carries a `msg` attribute.
    Error,
    /// `^exit` - the backend is quitting.
    Exit,
}

impl ResultClass {
    fn from_token(token: &str) -> DbgResult<Self> {
        match token {
            "done" => Ok(Self::Done),
            "running" => Ok(Self::Running),
            "error" => Ok(Self::Error),
            "exit" => Ok(Self::Exit),
            _ => Err(DbgError::Decode {
                reason: format!("unknown result class {token:?}"),
            }),
        }
    }
}

impl std::fmt::Display for ResultClass {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::Running => "running",
            Self::Error => "error",
            Self::Exit => "exit",
        })
    }
}

/// Kind of a stream record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamKind {
    /// `~` - console output (echoed CLI results, monitor replies).
    Console,
    /// `@` - output of the remote target itself.
    Target,
    /// `&` - log of commands the backend runs internally.
    Log,
}

/// The terminating record of an exchange.
#[derive(Clone, Debug)]
pub struct ResultRecord {
    /// The result class.
    pub class: ResultClass,
    /// Raw attribute remainder (everything after `^class,`), possibly empty.
    pub attributes: String,
}

impl ResultRecord {
    /// The decoded `msg` attribute of an error result, if present.
    pub fn error_message(&self) -> Option<String> {
        attributes::quoted_value(&self.attributes, "msg")
            .ok()
            .flatten()
    }
}

/// One decoded line of backend output.
#[derive(Clone, Debug)]
pub enum Record {
    /// `^…` - terminates the current exchange.
    Result(ResultRecord),
    /// `~…`, `@…`, `&…` - a decoded text fragment.
    Stream {
        /// Which stream the fragment belongs to.
        kind: StreamKind,
        /// The unescaped payload.
        text: String,
    },
    /// `*…`, `=…`, `+…` and anything unrecognized; consumed but not
    /// interpreted.
    Async(String),
    /// The `(gdb)` end-of-response sentinel.
    Prompt,
}

/// Classifies one non-empty output line.
///
/// Unknown leading characters are deliberately kept as [`Record::Async`]
/// rather than rejected, so newer backends cannot break the read loop.
pub fn decode_line(line: &str) -> DbgResult<Record> {
    if line.trim_end() == "(gdb)" {
        return Ok(Record::Prompt);
    }
    let mut chars = line.chars();
    match chars.next() {
        Some('^') => {
            let rest = chars.as_str();
            let (token, attrs) = match rest.find(',') {
                Some(comma) => (&rest[..comma], &rest[comma + 1..]),
                None => (rest, ""),
            };
            Ok(Record::Result(ResultRecord {
                class: ResultClass::from_token(token.trim_end())?,
                attributes: attrs.to_string(),
            }))
        }
        Some(c @ ('~' | '@' | '&')) => {
            let kind = match c {
                '~' => StreamKind::Console,
                '@' => StreamKind::Target,
                _ => StreamKind::Log,
            };
            let payload = chars.as_str().trim_end();
            let inner = payload
                .strip_prefix('"')
                .and_then(|p| p.strip_suffix('"'))
                .ok_or_else(|| DbgError::Decode {
                    reason: format!("stream record without quoted payload: {line:?}"),
                })?;
            Ok(Record::Stream {
                kind,
                text: unescape_mi_string(inner)?,
            })
        }
        _ => Ok(Record::Async(line.to_string())),
    }
}
