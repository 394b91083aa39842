// ABOUTME: Error types for manifest parsing and loading.
// ABOUTME: Every parse error names its kind, field path, and document index.

use std::fmt;
use std::path::PathBuf;

/// Category of a manifest parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A required field is absent (or explicitly null).
    MissingField,
    /// A field is present but its value is out of range or malformed.
    InvalidValue,
    /// A service selector does not match the workload defined in the set.
    DanglingSelector,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::MissingField => write!(f, "missing field"),
            ParseErrorKind::InvalidValue => write!(f, "invalid value"),
            ParseErrorKind::DanglingSelector => write!(f, "dangling selector"),
        }
    }
}

/// A manifest that failed validation.
///
/// `field` is a path relative to its document, for example `replicas`,
/// `env[1].secret.key`, or `selector`. It is empty when the whole document
/// is at fault (syntax errors, non-mapping documents).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub field: String,
    pub document: Option<usize>,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(
        kind: ParseErrorKind,
        field: impl Into<String>,
        document: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            document,
            message: message.into(),
        }
    }

    pub(crate) fn missing(field: impl Into<String>, document: Option<usize>) -> Self {
        let field = field.into();
        let message = format!("`{}` is required", field);
        Self::new(ParseErrorKind::MissingField, field, document, message)
    }

    pub(crate) fn invalid(
        field: impl Into<String>,
        document: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ParseErrorKind::InvalidValue, field, document, message)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.field.is_empty() {
            write!(f, " `{}`", self.field)?;
        }
        if let Some(doc) = self.document {
            write!(f, " in document {}", doc + 1)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Errors from reading a manifest file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

impl LoadError {
    /// The underlying parse error, if the file was readable.
    pub fn parse_error(&self) -> Option<&ParseError> {
        match self {
            LoadError::Parse { source, .. } => Some(source),
            LoadError::Io { .. } => None,
        }
    }
}
