//! Error types for every pipeline stage.
//!
//! Each stage owns one error enum; messages carry `line`/`column` whenever
//! they derive from a token. Evaluation failures are fatal for the current
//! evaluation and propagate unchanged; nothing is retried and nothing is
//! rolled back.

use std::{fmt, io};

use thiserror::Error;

use crate::{analysis::StitchType, value::TypeTag};

/// A lexing failure. Any lex error terminates the token stream.
#[derive(Debug, Error)]
pub enum LexError {
    #[error("line {line} column {column}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, line: usize, column: usize },
    #[error("line {line} column {column}: unterminated string")]
    UnterminatedString { line: usize, column: usize },
    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

/// One recorded parse failure.
///
/// Parse errors accumulate; if any were recorded the whole parse is
/// discarded and the caller receives the full [`ParseErrorList`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line} column {column}: expected {expected}; have {have}")]
    Expected {
        line: usize,
        column: usize,
        expected: String,
        have: String,
    },
    #[error(transparent)]
    Lex(#[from] LexError),
}

/// Every parse error recorded for one input, in source order.
#[derive(Debug, Default)]
pub struct ParseErrorList(pub Vec<ParseError>);

impl ParseErrorList {
    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParseErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrorList {}

impl<'a> IntoIterator for &'a ParseErrorList {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An advisory finding from the analysis pre-pass. Never blocks evaluation.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("symbol already exists: {name}")]
    DuplicateSymbol { name: String },
    #[error("type mismatch: operator '{operator}' not defined for {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: StitchType,
        right: StitchType,
    },
}

/// An evaluation failure, tagged with the source line where one is known.
#[derive(Debug)]
pub struct EvalError {
    pub line: Option<usize>,
    pub kind: EvalErrorKind,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.kind),
            None => self.kind.fmt(f),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        Self { line: None, kind }
    }
}

/// The closed set of evaluation failures.
#[derive(Debug, Error)]
pub enum EvalErrorKind {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unknown identifier '{name}' in package '{package}'")]
    UnknownPackageIdentifier { name: String, package: String },
    #[error("unknown internal \"{0}\"")]
    UnknownInternal(String),
    #[error("expected {expected} arguments but found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("'{0}' is not a function")]
    NotCallable(TypeTag),
    #[error("operator '{operator}' not defined for type {tag}")]
    OperatorUndefined { operator: String, tag: TypeTag },
    #[error("'!' operator not defined for '{0}'")]
    NotOperatorUndefined(TypeTag),
    #[error("type mismatch: {left} and {right}")]
    TypeMismatch { left: TypeTag, right: TypeTag },
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} is not comparable")]
    NotComparable(TypeTag),
    #[error("{left} is not comparable to {right}")]
    IncomparableTypes { left: TypeTag, right: TypeTag },
    #[error("cannot compare bool relatively")]
    BoolOrdering,
    #[error("expected boolean expression, found {0}")]
    ExpectedBool(TypeTag),
    #[error("mixed types for list")]
    MixedList,
    #[error("cannot concat list of {right} to list of {left}")]
    ListConcatMismatch { left: TypeTag, right: TypeTag },
    #[error("can only concatenate list to list (not {0})")]
    ListConcatNonList(TypeTag),
    #[error("invalid type, expected a LIST, got a {0}")]
    ForeachNotList(TypeTag),
    #[error("expected identifier but found '{0}'")]
    ExpectedIdentifier(String),
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("'{name}' not defined for type {tag}")]
    MemberUndefined { name: String, tag: TypeTag },
    #[error("cannot assign tag or field to type {0}")]
    NotANode(TypeTag),
    #[error("invalid named expression")]
    InvalidNamedExpression,
    #[error("'@{0}' is not a value")]
    StrayTag(String),
    #[error("connections can not be with type {0}")]
    NotConnectable(TypeTag),
    #[error("cannot connect to type '{0}'")]
    ConnectPeer(TypeTag),
    #[error("connections can not be made with type {0}")]
    ConnectListElem(TypeTag),
    #[error("no channel '{0}' on node")]
    MissingSlot(String),
    #[error("expression has no value")]
    NoValue,
    #[error("invalid package name: '{0}'")]
    InvalidPackageName(String),
    #[error("cannot import \"{path}\": {reason}")]
    ImportFailed { path: String, reason: String },
    #[error("error(s) parsing \"{path}\": {errors}")]
    ImportParse { path: String, errors: ParseErrorList },
}

impl EvalErrorKind {
    /// Tags this failure with the source line it was raised from.
    pub fn at(self, line: usize) -> EvalError {
        EvalError {
            line: Some(line),
            kind: self,
        }
    }
}

/// A graph-emission failure.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("{0} not supported as node argument")]
    UnsupportedArgument(TypeTag),
}
