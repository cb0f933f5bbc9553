//! Script context lifecycle and evaluation
//!
//! A `Context` owns one QuickJS runtime (its own heap, allocator and GC) and
//! one persistent global object. Every host call enters the runtime through
//! `rquickjs::Context::with`, so engine handles never outlive the call, on
//! the error paths included.

use jsbridge_core::HostValue;
use rquickjs::context::EvalOptions;
use rquickjs::{Runtime, Value};
use std::path::Path;

use crate::bindings;
use crate::classify::{self, TypeFlags};
use crate::config::ContextConfig;
use crate::dump;
use crate::error::{ContextError, MarshalError};
use crate::marshal::Marshaler;
use crate::path::PropertyPath;
use crate::platform::{self, PlatformLease};

/// Filename reported for scripts evaluated without one.
pub const DEFAULT_FILENAME: &str = "<eval>";

/// Engine heap figures for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub malloc_size: i64,
    pub memory_used_size: i64,
    pub object_count: i64,
}

/// An isolated JavaScript execution context.
///
/// Not `Send`: a context stays on the thread that created it.
pub struct Context {
    label: String,
    config: ContextConfig,
    // Field order is drop order: context, then runtime, then the lease.
    context: rquickjs::Context,
    runtime: Runtime,
    _lease: PlatformLease,
}

impl Context {
    /// Create a context with default settings.
    ///
    /// `label` defaults to an auto-generated `program_NNNNN`.
    pub fn new(label: Option<&str>) -> Result<Self, ContextError> {
        Self::with_config(ContextConfig {
            label: label.map(str::to_string),
            ..ContextConfig::default()
        })
    }

    pub fn with_config(config: ContextConfig) -> Result<Self, ContextError> {
        let label = config.label.clone().unwrap_or_else(platform::next_label);

        // Released again by drop if anything below fails.
        let lease = PlatformLease::acquire();

        let runtime = Runtime::new().map_err(ContextError::EngineInit)?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(limit) = config.max_stack_size {
            runtime.set_max_stack_size(limit);
        }
        if let Some(threshold) = config.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }

        let context = rquickjs::Context::full(&runtime).map_err(ContextError::EngineInit)?;
        context
            .with(|ctx| bindings::install(&ctx))
            .map_err(ContextError::EngineInit)?;

        tracing::debug!(label = %label, live = platform::stats().live, "created script context");

        Ok(Self {
            label,
            config,
            context,
            runtime,
            _lease: lease,
        })
    }

    /// Dispose the context. Same as dropping it.
    pub fn destroy(self) {}

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Run `source` as a global script and marshal its completion value.
    ///
    /// Blocks until the script finishes; there is no timeout. Compile and
    /// runtime failures leave the context usable.
    pub fn evaluate(&self, source: &str, filename: Option<&str>) -> Result<HostValue, ContextError> {
        let filename = filename.unwrap_or(DEFAULT_FILENAME);
        tracing::debug!(label = %self.label, filename, bytes = source.len(), "evaluating script");

        let result: Result<HostValue, ContextError> = self.context.with(|ctx| {
            let mut options = EvalOptions::default();
            options.strict = self.config.strict;

            let value: Value = ctx
                .eval_with_options(source, options)
                .map_err(|err| ContextError::from_engine(&ctx, err, filename))?;
            let marshaler = Marshaler::new(&ctx, self.config.marshal_limits()).map_err(MarshalError::from)?;
            Ok(marshaler.to_host(&value)?)
        });

        if let Err(err) = &result {
            tracing::warn!(label = %self.label, filename, %err, "script failed");
        }
        result
    }

    /// Read a file and evaluate it with its path as the filename.
    pub fn evaluate_file(&self, path: impl AsRef<Path>) -> Result<HostValue, ContextError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ContextError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.evaluate(&source, Some(&path.display().to_string()))
    }

    // ========================================================================
    // Named values
    // ========================================================================

    /// Marshaled value of a global or property path; `Undefined` if absent.
    pub fn get(&self, name: &str) -> Result<HostValue, ContextError> {
        let path = PropertyPath::parse(name)?;
        self.context
            .with(|ctx| bindings::get(&ctx, &path, self.config.marshal_limits()))
    }

    /// True iff `name` resolves to something other than `undefined`.
    pub fn exists(&self, name: &str) -> Result<bool, ContextError> {
        let path = PropertyPath::parse(name)?;
        self.context.with(|ctx| bindings::exists(&ctx, &path))
    }

    /// JavaScript `typeof` of the named value.
    pub fn type_of(&self, name: &str) -> Result<String, ContextError> {
        let path = PropertyPath::parse(name)?;
        self.context
            .with(|ctx| bindings::type_of(&ctx, &path).map(str::to_string))
    }

    /// Create or overwrite a global or property.
    pub fn set(&self, name: &str, value: &HostValue) -> Result<(), ContextError> {
        let path = PropertyPath::parse(name)?;
        tracing::trace!(label = %self.label, name, kind = value.type_name(), "setting binding");
        self.context.with(|ctx| bindings::set(&ctx, &path, value))
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Categories of the named value.
    pub fn classify(&self, name: &str) -> Result<TypeFlags, ContextError> {
        let path = PropertyPath::parse(name)?;
        self.context.with(|ctx| {
            let value = bindings::resolve(&ctx, &path)
                .map_err(|err| ContextError::from_engine(&ctx, err, path.as_str()))?
                .unwrap_or_else(|| Value::new_undefined(ctx.clone()));
            Ok(classify::classify(&ctx, &value))
        })
    }

    /// Debug rendering of the named value, also logged at debug level.
    pub fn dump(&self, name: &str) -> Result<String, ContextError> {
        let path = PropertyPath::parse(name)?;
        let rendered = self.context.with(|ctx| {
            let value = bindings::resolve(&ctx, &path)
                .map_err(|err| ContextError::from_engine(&ctx, err, path.as_str()))?
                .unwrap_or_else(|| Value::new_undefined(ctx.clone()));
            Ok::<_, ContextError>(dump::dump(&ctx, &value))
        })?;
        tracing::debug!(label = %self.label, name, value = %rendered, "dump");
        Ok(rendered)
    }

    /// Force a full garbage collection. Returns how many engine objects it
    /// reclaimed.
    pub fn run_garbage_collection(&self) -> i64 {
        let before = self.runtime.memory_usage().obj_count;
        self.runtime.run_gc();
        let after = self.runtime.memory_usage().obj_count;
        let reclaimed = (before - after).max(0);
        tracing::debug!(label = %self.label, reclaimed, "garbage collection");
        reclaimed
    }

    pub fn memory_usage(&self) -> MemoryStats {
        let usage = self.runtime.memory_usage();
        MemoryStats {
            malloc_size: usage.malloc_size,
            memory_used_size: usage.memory_used_size,
            object_count: usage.obj_count,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        tracing::debug!(label = %self.label, "destroying script context");
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("label", &self.label)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
