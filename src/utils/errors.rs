/*! The error taxonomy and the diagnostics contract.

Errors split into two classes: *fatal* ones, after which parsing cannot
safely continue, and *recoverable* ones, where the engine substitutes a
placeholder and keeps going. Every error is surfaced to the active
[`Diagnostics`] implementation before it propagates; for recoverable kinds
the implementation decides whether to continue or escalate.
*/

use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type TeXResult<T> = Result<T, TeXError>;

/// A position in the input, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}
impl Display for SourcePos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "l.{}:{}", self.line, self.column)
    }
}

/// Everything that can go wrong while tokenizing or expanding.
///
/// Variants carry the source form of the offending token where one exists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TeXError {
    /// An end-group token with no open group it may close.
    #[error("unexpected end of group `{0}`")]
    UnexpectedEndGroup(String),
    /// Input ended with at least one group still open.
    #[error("input ended inside a group opened with `{0}`")]
    UnterminatedGroup(String),
    /// Input ended inside `$...$` or `$$...$$`.
    #[error("input ended inside math mode")]
    MissingEndMath,
    /// `$$ ... $`: display math closed by a single math shift character.
    #[error("display math ended by a single math shift character")]
    DisplayMathEndedInline,
    /// Two superscript tokens in a row.
    #[error("double superscript")]
    DoubleSuperscript,
    /// Two subscript tokens in a row.
    #[error("double subscript")]
    DoubleSubscript,
    /// A number was required and textual coercion of the token failed.
    #[error("number expected, found `{0}`")]
    NumberExpected(String),
    /// A dimension was required.
    #[error("dimension expected, found `{0}`")]
    DimensionExpected(String),
    /// A parameter character was not followed by a digit `1`-`9`.
    #[error("parameter digit expected, found `{0}`")]
    BadParameter(String),
    /// A control sequence with no binding in any scope.
    #[error("undefined control sequence \\{0}")]
    UndefinedControlSequence(String),
    /// An active character with no binding in any scope.
    #[error("undefined active character {0}")]
    UndefinedActiveCharacter(char),
    /// A paragraph break inside a short macro argument.
    #[error("paragraph ended before argument of \\{0} was complete")]
    RunawayArgument(String),
    /// A stretch strength outside `1..=3`, rejected at construction time.
    #[error("invalid fill strength {0}")]
    InvalidFillStrength(u8),
    /// A macro arity outside `0..=9`, rejected at construction time.
    #[error("invalid macro arity {0}")]
    InvalidArity(u8),
    /// A register addressed with the wrong value kind.
    #[error("`{1}` is not a {0} register")]
    RegisterKindMismatch(&'static str, String),
    /// Dividing a register by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// The configured expansion budget ran out.
    #[error("expansion budget of {0} exhausted")]
    ExpansionBudgetExhausted(usize),
    /// Input ended where a token was required.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// An error annotated with the input position it was raised at.
    #[error("{inner} ({pos})")]
    At { pos: SourcePos, inner: Box<TeXError> },
}

impl TeXError {
    /// Annotate this error with a source position (idempotent).
    pub fn at(self, pos: SourcePos) -> Self {
        match self {
            e @ TeXError::At { .. } => e,
            e => TeXError::At { pos, inner: Box::new(e) },
        }
    }

    /// Whether parsing may continue after substituting a placeholder.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TeXError::DoubleSuperscript | TeXError::DoubleSubscript => true,
            TeXError::At { inner, .. } => inner.is_recoverable(),
            _ => false,
        }
    }
}

/** The diagnostics contract: structured error notifications, and the decision
whether to continue or abort.

[`fatal`](Diagnostics::fatal) is called with every fatal error immediately
before it propagates; it cannot suppress the error. [`recoverable`](Diagnostics::recoverable)
is a decision point: returning `Ok(())` lets the engine continue with a
substituted value, returning the error aborts the run.
*/
pub trait Diagnostics {
    /// Called with every fatal error before it unwinds.
    fn fatal(&mut self, _err: &TeXError) {}
    /// Called with a recoverable error; `Ok` continues with a substituted value.
    fn recoverable(&mut self, err: TeXError) -> TeXResult<()> {
        log::warn!("recovered: {}", err);
        Ok(())
    }
}

/// [`Diagnostics`] that aborts on every error, recoverable or not.
pub struct ErrorThrower;
impl Diagnostics for ErrorThrower {
    fn recoverable(&mut self, err: TeXError) -> TeXResult<()> {
        Err(err)
    }
}

/// [`Diagnostics`] that records every error and always continues,
/// preserving maximal output.
#[derive(Default)]
pub struct ErrorCollector {
    pub errors: Vec<TeXError>,
}
impl Diagnostics for ErrorCollector {
    fn fatal(&mut self, err: &TeXError) {
        self.errors.push(err.clone());
    }
    fn recoverable(&mut self, err: TeXError) -> TeXResult<()> {
        log::warn!("recovered: {}", err);
        self.errors.push(err);
        Ok(())
    }
}
