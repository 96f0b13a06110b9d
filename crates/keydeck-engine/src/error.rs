use std::{fmt, io, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Registry namespace an element type is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Key press actions.
    Action,
    /// Key display elements.
    Display,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => f.write_str("action"),
            Self::Display => f.write_str("display element"),
        }
    }
}

/// Unified error type for the keydeck engine.
#[derive(Debug, Error)]
pub enum Error {
    /// No handler is registered under the configured type name.
    #[error("Unknown {kind} type {name:?}")]
    UnknownType {
        /// Namespace that was searched.
        kind: ElementKind,
        /// Configured type name.
        name: String,
    },

    /// A handler needs an attribute that is not configured.
    #[error("{element}: missing attribute {attribute:?}")]
    MissingAttribute {
        /// Element type name.
        element: &'static str,
        /// Attribute name as written in the config.
        attribute: &'static str,
    },

    /// A configured attribute has an unusable value.
    #[error("{element}: invalid attribute {attribute:?}: {reason}")]
    InvalidAttribute {
        /// Element type name.
        element: &'static str,
        /// Attribute name as written in the config.
        attribute: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Relative navigation reaches past the recorded history.
    #[error("Cannot go back {requested} pages, history holds {available}")]
    HistoryTooShort {
        /// Requested offset.
        requested: usize,
        /// Entries available.
        available: usize,
    },

    /// An external command could not be run or exited unsuccessfully.
    #[error("Command {command:?} failed: {message}")]
    Command {
        /// Program name.
        command: String,
        /// Failure detail.
        message: String,
    },

    /// I/O failure while performing a system operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The deck transport rejected a write.
    #[error("Deck error: {0}")]
    Device(String),

    /// Canvas, font or image decode failure.
    #[error("Render error: {0}")]
    Render(String),

    /// Remote image download failure.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Audio mixer query or update failure.
    #[error("Audio error: {0}")]
    Audio(String),

    /// Keyboard emulation failure.
    #[error("Keyboard error: {0}")]
    Keyboard(String),

    /// Loading or validating a configuration failed.
    #[error(transparent)]
    Config(#[from] config::Error),

    /// Generic error with context.
    #[error("Engine error: {0}")]
    Msg(String),
}

impl Error {
    /// Shorthand for [`Error::MissingAttribute`].
    pub fn missing(element: &'static str, attribute: &'static str) -> Self {
        Self::MissingAttribute { element, attribute }
    }

    /// Shorthand for [`Error::InvalidAttribute`].
    pub fn invalid(element: &'static str, attribute: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            element,
            attribute,
            reason: reason.into(),
        }
    }
}
