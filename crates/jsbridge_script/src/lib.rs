//! jsbridge Scripting Bridge
//!
//! Embeds QuickJS (via `rquickjs`) behind a host-facing API.
//!
//! ## Architecture
//!
//! - **Platform:** process-wide engine state, reference-counted across live contexts
//! - **Context:** one runtime + one persistent global object per host context
//! - **Marshaler:** `HostValue` <-> engine values, with cycle and depth guards
//! - **Bindings:** `print`, `version`, `timestamp_ms` plus host-side get/set by property path
//!
//! ```ignore
//! use jsbridge_script::Context;
//!
//! let ctx = Context::new(None)?;
//! let sum = ctx.evaluate("1 + 2", None)?;
//! assert_eq!(sum, 3.into());
//! ```

pub mod bindings;
pub mod classify;
pub mod config;
pub mod context;
pub mod dump;
pub mod error;
pub mod marshal;
pub mod path;
pub mod platform;

pub use classify::TypeFlags;
pub use config::{ConfigError, ContextConfig};
pub use context::{Context, MemoryStats};
pub use error::{BindingError, ContextError, MarshalError, ScriptError, ScriptReport};
pub use jsbridge_core::{HostMap, HostValue};
pub use marshal::{MarshalLimits, Marshaler};
pub use path::PropertyPath;

pub use rquickjs;

/// Identifier of the embedded engine, returned by the `version()` global.
pub const ENGINE_VERSION: &str = "QuickJS (rquickjs 0.6)";
