//! Global binding table
//!
//! Native functions installed into every context (`print`, `version`,
//! `timestamp_ms`) and the host-side lookups by property path.

use jsbridge_core::HostValue;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};
use std::io::Write;

use crate::classify;
use crate::error::{coerce_to_string, BindingError, ContextError, MarshalError};
use crate::marshal::{to_engine, MarshalLimits, Marshaler};
use crate::path::PropertyPath;
use crate::ENGINE_VERSION;

/// Names of the installed globals, in installation order.
pub const GLOBALS: [&str; 3] = ["print", "version", "timestamp_ms"];

/// Install the native globals into `ctx`.
pub fn install<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let print = Function::new(ctx.clone(), |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = print_line(&ctx, args.0, &mut stdout) {
            tracing::warn!(%err, "print() could not write to stdout");
        }
    })?
    .with_name("print")?;
    globals.set("print", print)?;

    let version = Function::new(ctx.clone(), || ENGINE_VERSION)?.with_name("version")?;
    globals.set("version", version)?;

    let timestamp = Function::new(ctx.clone(), jsbridge_core::time::now_ms)?.with_name("timestamp_ms")?;
    globals.set("timestamp_ms", timestamp)?;

    tracing::trace!(globals = ?GLOBALS, "installed global bindings");
    Ok(())
}

/// Body of `print()`: ToString of each argument, space separated, one line,
/// flushed.
fn print_line<'js>(ctx: &Ctx<'js>, args: Vec<Value<'js>>, out: &mut impl Write) -> std::io::Result<()> {
    let line = args
        .into_iter()
        .map(|arg| coerce_to_string(ctx, arg))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{line}")?;
    out.flush()
}

// ============================================================================
// Host-side lookups
// ============================================================================

/// Resolve `path` from the global object. `None` when any segment is missing
/// or a parent is not an object.
pub(crate) fn resolve<'js>(ctx: &Ctx<'js>, path: &PropertyPath) -> rquickjs::Result<Option<Value<'js>>> {
    let mut current = ctx.globals().into_value();
    for segment in path.segments() {
        let Some(object) = current.as_object() else {
            return Ok(None);
        };
        let next: Value = object.get(segment.as_str())?;
        if next.is_undefined() {
            return Ok(None);
        }
        current = next;
    }
    Ok(Some(current))
}

pub(crate) fn get<'js>(ctx: &Ctx<'js>, path: &PropertyPath, limits: MarshalLimits) -> Result<HostValue, ContextError> {
    match resolve(ctx, path).map_err(|err| ContextError::from_engine(ctx, err, path.as_str()))? {
        Some(value) => {
            let marshaler = Marshaler::new(ctx, limits).map_err(MarshalError::from)?;
            Ok(marshaler.to_host(&value)?)
        }
        None => Ok(HostValue::Undefined),
    }
}

pub(crate) fn exists(ctx: &Ctx<'_>, path: &PropertyPath) -> Result<bool, ContextError> {
    let resolved = resolve(ctx, path).map_err(|err| ContextError::from_engine(ctx, err, path.as_str()))?;
    Ok(resolved.is_some())
}

pub(crate) fn type_of(ctx: &Ctx<'_>, path: &PropertyPath) -> Result<&'static str, ContextError> {
    let resolved = resolve(ctx, path).map_err(|err| ContextError::from_engine(ctx, err, path.as_str()))?;
    Ok(resolved.as_ref().map_or("undefined", classify::type_of))
}

/// Create or overwrite the binding at `path`. Missing parents are created as
/// empty objects.
pub(crate) fn set(ctx: &Ctx<'_>, path: &PropertyPath, value: &HostValue) -> Result<(), ContextError> {
    assign(ctx, path, value).map_err(|err| match err {
        Assign::Binding(err) => ContextError::Binding(err),
        Assign::Engine(err) => ContextError::from_engine(ctx, err, path.as_str()),
    })
}

enum Assign {
    Binding(BindingError),
    Engine(rquickjs::Error),
}

impl From<rquickjs::Error> for Assign {
    fn from(err: rquickjs::Error) -> Self {
        Assign::Engine(err)
    }
}

fn assign(ctx: &Ctx<'_>, path: &PropertyPath, value: &HostValue) -> Result<(), Assign> {
    let (parents, last) = path.split_last();

    let mut current = ctx.globals();
    for segment in parents {
        let next: Value = current.get(segment.as_str())?;
        current = if next.is_undefined() {
            let created = Object::new(ctx.clone())?;
            current.set(segment.as_str(), created.clone())?;
            created
        } else {
            match next.into_object() {
                Some(object) => object,
                None => {
                    return Err(Assign::Binding(BindingError::NotAnObject {
                        path: path.to_string(),
                        segment: segment.clone(),
                    }))
                }
            }
        };
    }

    current.set(last, to_engine(ctx, value)?)?;
    Ok(())
}
