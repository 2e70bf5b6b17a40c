use std::fmt::Debug;

use serde::Serialize;

/// A topkq error. Used internally, exposed as [crate::ErrorMessage].
#[derive(Debug, Clone)]
pub struct Error {
    /// Message kind. Currently only Error is implemented.
    pub kind: MessageKind,
    pub reason: Reason,
    pub hints: Vec<String>,
    /// Machine readable identifier error code eg, "E0001"
    pub code: Option<&'static str>,
}

/// Message kind. Currently only Error is implemented.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Simple(String),
    /// A caller-supplied argument violates a request invariant.
    InvalidArgument {
        argument: String,
        details: String,
    },
    /// The combination of engine capabilities and request cannot be rendered.
    ///
    /// Every combination of the current capability flags maps to a strategy,
    /// so this is not produced today.
    UnsupportedCombination {
        details: String,
    },
    NotFound {
        name: String,
        namespace: String,
    },
    Bug {
        details: Option<String>,
    },
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            kind: MessageKind::Error,
            reason,
            hints: Vec::new(),
            code: None,
        }
    }

    pub fn new_simple<S: ToString>(reason: S) -> Self {
        Error::new(Reason::Simple(reason.to_string()))
    }

    pub fn invalid_argument<A: ToString, D: ToString>(argument: A, details: D) -> Self {
        Error::new(Reason::InvalidArgument {
            argument: argument.to_string(),
            details: details.to_string(),
        })
        .with_code("E0001")
    }

    pub fn unsupported_combination<D: ToString>(details: D) -> Self {
        Error::new(Reason::UnsupportedCombination {
            details: details.to_string(),
        })
        .with_code("E0002")
    }

    /// Used for things that you *think* should never happen, but are not sure.
    pub fn new_assert<S: ToString>(details: S) -> Self {
        Error::new(Reason::Bug {
            details: Some(details.to_string()),
        })
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Simple(text) => f.write_str(text),
            Reason::InvalidArgument { argument, details } => {
                write!(f, "invalid argument `{argument}`: {details}")
            }
            Reason::UnsupportedCombination { details } => {
                write!(f, "unsupported combination: {details}")
            }
            Reason::NotFound { name, namespace } => write!(f, "{namespace} `{name}` not found"),
            Reason::Bug { details } => {
                write!(f, "internal error")?;
                if let Some(details) = details {
                    write!(f, "; {details}")?;
                }
                Ok(())
            }
        }
    }
}

// Needed for anyhow
impl std::error::Error for Error {}

// Needed for StdError
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self, f)
    }
}

pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;

    fn with_code(self, code: &'static str) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}

impl<T, E: WithErrorInfo> WithErrorInfo for Result<T, E> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }

    fn with_code(self, code: &'static str) -> Self {
        self.map_err(|e| e.with_code(code))
    }
}
