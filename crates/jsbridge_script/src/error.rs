//! Bridge error types
//!
//! Everything except `EngineInit` is recoverable: the context stays usable
//! after a failed call.

use rquickjs::convert::Coerced;
use rquickjs::{Ctx, FromJs, Value};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by every `Context` operation.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to initialise the JavaScript engine: {0}")]
    EngineInit(#[source] rquickjs::Error),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ContextError {
    /// Convert an engine error raised inside `ctx`.
    ///
    /// A pending JavaScript exception is taken off the context and reported as
    /// a script error, so it cannot leak into the next call.
    pub(crate) fn from_engine(ctx: &Ctx<'_>, err: rquickjs::Error, filename: &str) -> Self {
        match err {
            rquickjs::Error::Exception => ScriptError::from_thrown(ctx, ctx.catch(), filename).into(),
            other => ContextError::Engine(other),
        }
    }
}

/// Compile or runtime failure of a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("compile error: {0}")]
    Compile(ScriptReport),

    #[error("runtime error: {0}")]
    Runtime(ScriptReport),
}

impl ScriptError {
    pub fn report(&self) -> &ScriptReport {
        match self {
            ScriptError::Compile(report) | ScriptError::Runtime(report) => report,
        }
    }

    pub fn is_compile(&self) -> bool {
        matches!(self, ScriptError::Compile(_))
    }

    /// Build a report from whatever the script threw.
    ///
    /// A `SyntaxError` from parsing the script counts as a compile error; any
    /// other thrown value, a `SyntaxError` thrown while running included, is a
    /// runtime error. Thrown non-error values are stringified with the
    /// engine's ToString rules.
    pub(crate) fn from_thrown<'js>(ctx: &Ctx<'js>, thrown: Value<'js>, filename: &str) -> Self {
        let mut report = ScriptReport {
            name: None,
            message: String::new(),
            filename: filename.to_string(),
            line: None,
            stack: None,
        };

        if let Some(object) = thrown.as_object() {
            report.name = object.get::<_, Option<String>>("name").ok().flatten();
            report.stack = object
                .get::<_, Option<String>>("stack")
                .ok()
                .flatten()
                .filter(|stack| !stack.is_empty());
            report.line = object
                .get::<_, Option<f64>>("lineNumber")
                .ok()
                .flatten()
                .filter(|line| *line >= 1.0)
                .map(|line| line as u32);
            if let Ok(Some(message)) = object.get::<_, Option<String>>("message") {
                report.message = message;
            }
        }

        if report.message.is_empty() && report.name.is_none() {
            report.message = coerce_to_string(ctx, thrown);
        }

        if is_parse_failure(&report) {
            ScriptError::Compile(report)
        } else {
            ScriptError::Runtime(report)
        }
    }
}

/// A `SyntaxError` raised while parsing the script itself, before any of it
/// ran. The engine then reports only the parse location (`at file:line`);
/// errors thrown by running code (`JSON.parse`, `RegExp`, nested `eval`,
/// `throw`) carry at least one call frame (`at name (location)`).
fn is_parse_failure(report: &ScriptReport) -> bool {
    if report.name.as_deref() != Some("SyntaxError") {
        return false;
    }
    let Some(stack) = &report.stack else {
        return false;
    };
    stack
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .all(|line| !line.ends_with(')'))
}

/// Details carried by a `ScriptError`.
#[derive(Debug, Clone)]
pub struct ScriptReport {
    /// Constructor name of the thrown error (`TypeError`, ...), if it was one.
    pub name: Option<String>,
    pub message: String,
    pub filename: String,
    pub line: Option<u32>,
    pub stack: Option<String>,
}

impl fmt::Display for ScriptReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{name}: ")?;
        }
        write!(f, "{} ({}", self.message, self.filename)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        f.write_str(")")
    }
}

/// Failure converting a value across the bridge.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("cannot marshal a value of type {type_name}")]
    Unsupported { type_name: String },

    #[error("cyclic reference at {path}")]
    Cycle { path: String },

    #[error("object at {path} was already marshaled through another path")]
    Revisited { path: String },

    #[error("value nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("value holds more than {limit} elements")]
    TooLarge { limit: usize },

    #[error("engine error while marshaling: {0}")]
    Engine(#[from] rquickjs::Error),
}

/// Malformed or unusable property path.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("invalid property path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("cannot set '{path}': '{segment}' is not an object")]
    NotAnObject { path: String, segment: String },
}

/// ToString of an arbitrary value, never failing.
pub(crate) fn coerce_to_string<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> String {
    match Coerced::<String>::from_js(ctx, value) {
        Ok(Coerced(text)) => text,
        Err(_) => {
            // Drop the TypeError raised by e.g. symbols.
            let _ = ctx.catch();
            "<string conversion failed>".to_string()
        }
    }
}
