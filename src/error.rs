use crate::value::ValueKind;

pub type StacheResult<T> = std::result::Result<T, StacheError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("Unexpected EOF{expected_what}")]
    UnexpectedEOF {
        /// Describes what was expected, e.g., "(expected '}}')"
        expected_what: String,
    },
    #[error("Expected {description}")]
    Expected { description: String },
    #[error("Invalid delimiters '{content}'")]
    InvalidDelimiters { content: String },
    #[error("Parser error: {0}")]
    Message(String),
}

impl ParseErrorKind {
    pub fn unexpected_eof(expected: Option<String>) -> Self {
        Self::UnexpectedEOF {
            expected_what: expected.map_or_else(String::new, |e| format!(" (expected '{e}')")),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("Parse error at line {line}, column {column}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    #[source]
    pub kind: ParseErrorKind,
}

/// Every way a compile, validation or render can fail.
///
/// A render either returns its complete output or exactly one of these.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum StacheError {
    #[error("Template already exists: {template_name}")]
    TemplateExists { template_name: String },
    #[error("Template not found: {template_name}")]
    MissingTemplate { template_name: String },
    #[error("Variable not found: {variable_name}")]
    MissingVariable { variable_name: String },
    #[error("Partial not found: {name}")]
    PartialNotFound { name: String },
    #[error("Partial inclusion cycle at '{name}': {}", path.join(" -> "))]
    InclusionCycle { name: String, path: Vec<String> },
    #[error("Lambda '{name}' failed: {message}")]
    Lambda { name: String, message: String },
    #[error("Cannot render '{name}' as text: found {found:?}")]
    Conversion { name: String, found: ValueKind },
    #[error("Inverted section '{name}' over a lambda is not supported")]
    UnsupportedInvertedLambda { name: String },
    #[error("Maximum nesting depth of {limit} exceeded")]
    DepthExceeded { limit: usize },
    #[error("Override block '{name}' is declared more than once")]
    DuplicateBlock { name: String },
    #[error("Rendering cancelled")]
    Cancelled,
    #[error(transparent)]
    Parse(#[from] ParseError),
}
