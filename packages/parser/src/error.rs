use stagehand_common::{Classify, ErrorKind};
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {pos}: expected {expected}, found {found}")]
    UnexpectedToken {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of file at {pos}: expected {expected}")]
    UnexpectedEof { pos: usize, expected: String },

    #[error("Unbalanced braces at {pos}: {message}")]
    UnbalancedBraces { pos: usize, message: String },

    #[error("Duplicate prim '{path}' at {pos}")]
    DuplicatePrim { pos: usize, path: String },

    #[error("Invalid syntax at {pos}: {message}")]
    InvalidSyntax { pos: usize, message: String },
}

impl ParseError {
    pub fn unexpected_token(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(pos: usize, expected: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            pos,
            expected: expected.into(),
        }
    }

    pub fn unbalanced(pos: usize, message: impl Into<String>) -> Self {
        Self::UnbalancedBraces {
            pos,
            message: message.into(),
        }
    }

    pub fn invalid_syntax(pos: usize, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            pos,
            message: message.into(),
        }
    }

    /// Byte offset the error points at
    pub fn pos(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { pos, .. }
            | ParseError::UnexpectedEof { pos, .. }
            | ParseError::UnbalancedBraces { pos, .. }
            | ParseError::DuplicatePrim { pos, .. }
            | ParseError::InvalidSyntax { pos, .. } => *pos,
        }
    }
}

impl Classify for ParseError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }
}

/// Pretty-print an error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let start = error.pos().min(source.len());
    let end = (start + 1).min(source.len()).max(start);

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, start..end))
                .with_color(Color::Red)
                .with_message(match error {
                    ParseError::UnexpectedToken { expected, .. }
                    | ParseError::UnexpectedEof { expected, .. } => format!("expected {}", expected),
                    ParseError::UnbalancedBraces { message, .. }
                    | ParseError::InvalidSyntax { message, .. } => message.clone(),
                    ParseError::DuplicatePrim { path, .. } => format!("'{}' is already defined", path),
                }),
        )
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}
