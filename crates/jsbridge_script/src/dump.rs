//! Debug rendering of engine values
//!
//! Output is for humans reading logs, not a stable format:
//! `UNDEFINED`, `NULL`, `true`, `42`, `<text>`, `[1, 2]`, `{key: value}`.
//! Rendering stops after a fixed number of values and ends in `...`.

use rquickjs::{Ctx, Object, Value};
use std::fmt::Write;

use crate::classify::{tag_name, ClassTag};
use crate::marshal::array_length;

/// Values rendered before the output is cut short.
const MAX_DUMP_VALUES: usize = 10_000;

/// Render `value` for a debug dump. Never fails; unreadable parts show as
/// `<error>`.
pub fn dump<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    dump_limited(ctx, value, MAX_DUMP_VALUES)
}

fn dump_limited<'js>(ctx: &Ctx<'js>, value: &Value<'js>, budget: usize) -> String {
    let mut renderer = Renderer {
        class_tag: ClassTag::new(ctx).ok(),
        open: Vec::new(),
        out: String::new(),
        budget,
    };
    renderer.render(value);
    renderer.out
}

struct Renderer<'js> {
    class_tag: Option<ClassTag<'js>>,
    open: Vec<Value<'js>>,
    out: String,
    budget: usize,
}

impl<'js> Renderer<'js> {
    fn exhausted(&self) -> bool {
        self.budget == 0
    }

    fn render(&mut self, value: &Value<'js>) {
        if self.exhausted() {
            self.out.push_str("...");
            return;
        }
        self.budget -= 1;

        if value.is_undefined() {
            self.out.push_str("UNDEFINED");
        } else if value.is_null() {
            self.out.push_str("NULL");
        } else if let Some(b) = value.as_bool() {
            self.out.push_str(if b { "true" } else { "false" });
        } else if let Some(int) = value.as_int() {
            let _ = write!(self.out, "{int}");
        } else if let Some(float) = value.as_float() {
            let _ = write!(self.out, "{float}");
        } else if let Some(string) = value.as_string() {
            match string.to_string() {
                Ok(text) => {
                    let _ = write!(self.out, "<{text}>");
                }
                Err(_) => self.out.push_str("<error>"),
            }
        } else if self.open.contains(value) {
            self.out.push_str("<cycle>");
        } else if let Some(array) = value.as_array() {
            self.open.push(value.clone());
            self.out.push('[');
            for index in 0..array_length(array).unwrap_or(0) {
                if index > 0 {
                    self.out.push_str(", ");
                }
                if self.exhausted() {
                    self.out.push_str("...");
                    break;
                }
                match array.get::<Value>(index) {
                    Ok(element) => self.render(&element),
                    Err(_) => self.out.push_str("<error>"),
                }
            }
            self.out.push(']');
            self.open.pop();
        } else if value.is_function() {
            self.out.push_str("<function>");
        } else if let Some(object) = value.as_object() {
            let tag = self.class_tag.as_ref().and_then(|probe| probe.of(value));
            match tag.as_deref() {
                None | Some("[object Object]") => {
                    self.open.push(value.clone());
                    self.render_object(object);
                    self.open.pop();
                }
                Some(other) => {
                    let _ = write!(self.out, "<{}>", tag_name(other));
                }
            }
        } else if value.is_symbol() {
            self.out.push_str("<symbol>");
        } else {
            let _ = write!(self.out, "<{:?}>", value.type_of());
        }
    }

    fn render_object(&mut self, object: &Object<'js>) {
        self.out.push('{');
        for (i, key) in object.keys::<String>().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if self.exhausted() {
                self.out.push_str("...");
                break;
            }
            let Ok(key) = key else {
                self.out.push_str("<error>");
                continue;
            };
            let _ = write!(self.out, "{key}: ");
            match object.get::<_, Value>(key.as_str()) {
                Ok(property) => self.render(&property),
                Err(_) => self.out.push_str("<error>"),
            }
        }
        self.out.push('}');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn dump_source(source: &str) -> String {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let value: Value = ctx.eval(source).unwrap();
            dump(&ctx, &value)
        })
    }

    #[test]
    fn test_dump_scalars() {
        assert_eq!(dump_source("undefined"), "UNDEFINED");
        assert_eq!(dump_source("null"), "NULL");
        assert_eq!(dump_source("true"), "true");
        assert_eq!(dump_source("42"), "42");
        assert_eq!(dump_source("1.5"), "1.5");
        assert_eq!(dump_source("'hi'"), "<hi>");
    }

    #[test]
    fn test_dump_containers() {
        assert_eq!(
            dump_source("({a: [1, 'x'], b: {c: null}})"),
            "{a: [1, <x>], b: {c: NULL}}"
        );
    }

    #[test]
    fn test_dump_exotic_values() {
        assert_eq!(dump_source("[function() {}, new Map()]"), "[<function>, <Map>]");
    }

    #[test]
    fn test_dump_stops_at_budget() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let value: Value = ctx.eval("[1, 2, 3, [4, 5]]").unwrap();
            assert_eq!(dump_limited(&ctx, &value, 3), "[1, 2, ...]");
        });
    }

    #[test]
    fn test_dump_huge_sparse_array() {
        let rendered = dump_source("var a = []; a.length = 4294967295; a");
        assert!(rendered.starts_with("[UNDEFINED, UNDEFINED"));
        assert!(rendered.ends_with(", ...]"));
    }

    #[test]
    fn test_dump_doubling_graph_is_bounded() {
        let rendered = dump_source("var a = [1]; for (var i = 0; i < 40; i++) a = [a, a]; a");
        assert!(rendered.contains("..."));
    }

    #[test]
    fn test_dump_cycle() {
        assert_eq!(dump_source("var a = {n: 1}; a.self = a; a"), "{n: 1, self: <cycle>}");
    }
}
