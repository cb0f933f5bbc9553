//! Value marshaling between `HostValue` and engine values
//!
//! `to_host` walks the engine value depth-first and converts every array and
//! object at most once per call. Re-entering a container that is still open
//! is a cycle; reaching an already converted one through another branch is a
//! revisit. Both fail instead of recursing. A node budget bounds the total
//! work, sparse arrays with huge `length` included.

use jsbridge_core::value::MAX_SAFE_INTEGER;
use jsbridge_core::{HostMap, HostValue};
use rquickjs::function::This;
use rquickjs::function::Constructor;
use rquickjs::{Array, Ctx, Function, Object, Value};

use crate::classify::{self, tag_name, ClassTag};
use crate::config::{DEFAULT_MAX_MARSHAL_DEPTH, DEFAULT_MAX_MARSHAL_NODES};
use crate::error::MarshalError;

/// Largest up-front allocation for an array's items.
const PREALLOCATE_ITEMS: usize = 1024;

/// Bounds on a single `to_host` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarshalLimits {
    /// Deepest array/object nesting followed.
    pub max_depth: usize,
    /// Most values converted, counting every element and property.
    pub max_nodes: usize,
}

impl Default for MarshalLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_MARSHAL_DEPTH,
            max_nodes: DEFAULT_MAX_MARSHAL_NODES,
        }
    }
}

/// Converts values in both directions within one engine context.
pub struct Marshaler<'js> {
    ctx: Ctx<'js>,
    class_tag: ClassTag<'js>,
    limits: MarshalLimits,
}

impl<'js> Marshaler<'js> {
    pub fn new(ctx: &Ctx<'js>, limits: MarshalLimits) -> rquickjs::Result<Self> {
        Ok(Self {
            ctx: ctx.clone(),
            class_tag: ClassTag::new(ctx)?,
            limits,
        })
    }

    /// Engine value to host value.
    pub fn to_host(&self, value: &Value<'js>) -> Result<HostValue, MarshalError> {
        let result = self.walk(value);
        if let Err(MarshalError::Engine(rquickjs::Error::Exception)) = &result {
            // A throwing getter or valueOf; leave the context clean.
            let _ = self.ctx.catch();
        }
        result
    }

    /// Host value to engine value.
    pub fn to_engine(&self, value: &HostValue) -> rquickjs::Result<Value<'js>> {
        to_engine(&self.ctx, value)
    }

    fn walk(&self, value: &Value<'js>) -> Result<HostValue, MarshalError> {
        let visited = if value.is_object() {
            Some(Visited::new(&self.ctx)?)
        } else {
            None
        };
        let mut walk = Walk::new(visited, self.limits);
        self.convert(value, &mut walk)
    }

    fn convert(&self, value: &Value<'js>, walk: &mut Walk<'js>) -> Result<HostValue, MarshalError> {
        walk.count(1)?;

        if value.is_undefined() {
            return Ok(HostValue::Undefined);
        }
        if value.is_null() {
            return Ok(HostValue::Null);
        }
        if let Some(b) = value.as_bool() {
            return Ok(HostValue::Bool(b));
        }
        if let Some(int) = value.as_int() {
            return Ok(HostValue::Int(int.into()));
        }
        if let Some(float) = value.as_float() {
            return Ok(float_to_host(float));
        }
        if let Some(string) = value.as_string() {
            return Ok(HostValue::String(string.to_string()?));
        }
        if let Some(array) = value.as_array() {
            return self.array_to_host(value, array, walk);
        }
        if value.is_function() {
            return Err(unsupported("function"));
        }
        if let Some(object) = value.as_object() {
            return self.object_to_host(value, object, walk);
        }
        Err(unsupported(classify::type_of(value)))
    }

    fn array_to_host(
        &self,
        value: &Value<'js>,
        array: &Array<'js>,
        walk: &mut Walk<'js>,
    ) -> Result<HostValue, MarshalError> {
        walk.open(value)?;
        let result = self.array_items(array, walk);
        walk.close();
        result
    }

    fn array_items(&self, array: &Array<'js>, walk: &mut Walk<'js>) -> Result<HostValue, MarshalError> {
        let len = array_length(array)?;
        // Holes count too; fail before touching a sparse array's length.
        walk.ensure_room(len)?;

        let mut items = Vec::with_capacity(len.min(PREALLOCATE_ITEMS));
        for index in 0..len {
            let element: Value = array.get(index)?;
            walk.path.push(PathStep::Index(index));
            let converted = self.convert(&element, walk);
            walk.path.pop();
            items.push(converted?);
        }
        tracing::trace!(len = items.len(), "marshaled array");
        Ok(HostValue::Array(items))
    }

    fn object_to_host(
        &self,
        value: &Value<'js>,
        object: &Object<'js>,
        walk: &mut Walk<'js>,
    ) -> Result<HostValue, MarshalError> {
        let tag = self.class_tag.of(value).unwrap_or_default();
        match tag.as_str() {
            "[object Object]" | "[object Arguments]" => {}
            "[object Boolean]" | "[object Number]" | "[object String]" => {
                return self.unwrap_primitive(object, &tag, walk);
            }
            other => return Err(unsupported(tag_name(other))),
        }

        walk.open(value)?;
        let result = self.object_entries(object, walk);
        walk.close();
        result
    }

    fn object_entries(&self, object: &Object<'js>, walk: &mut Walk<'js>) -> Result<HostValue, MarshalError> {
        let mut map = HostMap::new();
        for key in object.keys::<String>() {
            let key = key?;
            let property: Value = object.get(key.as_str())?;
            walk.path.push(PathStep::Key(key.clone()));
            let converted = self.convert(&property, walk);
            walk.path.pop();
            map.insert(key, converted?);
        }
        tracing::trace!(len = map.len(), "marshaled object");
        Ok(HostValue::Object(map))
    }

    /// `new Number(1)` and friends marshal as the primitive they wrap.
    fn unwrap_primitive(
        &self,
        object: &Object<'js>,
        tag: &str,
        walk: &mut Walk<'js>,
    ) -> Result<HostValue, MarshalError> {
        let value_of: Function = object.get("valueOf")?;
        let primitive: Value = value_of.call((This(object.clone()),))?;
        if primitive.is_object() {
            return Err(unsupported(tag_name(tag)));
        }
        self.convert(&primitive, walk)
    }
}

/// An array's `length`, read as a double: lengths past `i32::MAX` are not
/// stored as ints.
pub(crate) fn array_length(array: &Array<'_>) -> rquickjs::Result<usize> {
    let object: &Object = array;
    let length: f64 = object.get("length")?;
    Ok(length as usize)
}

/// Host value to engine value, recursively.
///
/// Integers outside the `i32` range become doubles; map keys are set in map
/// order.
pub fn to_engine<'js>(ctx: &Ctx<'js>, value: &HostValue) -> rquickjs::Result<Value<'js>> {
    let value = match value {
        HostValue::Undefined => Value::new_undefined(ctx.clone()),
        HostValue::Null => Value::new_null(ctx.clone()),
        HostValue::Bool(b) => Value::new_bool(ctx.clone(), *b),
        HostValue::Int(int) => match i32::try_from(*int) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_float(ctx.clone(), *int as f64),
        },
        HostValue::Float(float) => Value::new_float(ctx.clone(), *float),
        HostValue::String(string) => rquickjs::String::from_str(ctx.clone(), string)?.into_value(),
        HostValue::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (index, item) in items.iter().enumerate() {
                array.set(index, to_engine(ctx, item)?)?;
            }
            array.into_value()
        }
        HostValue::Object(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map.iter() {
                object.set(key, to_engine(ctx, item)?)?;
            }
            object.into_value()
        }
    };
    Ok(value)
}

/// Integral doubles within the safe range come back as `Int`.
fn float_to_host(float: f64) -> HostValue {
    let is_negative_zero = float == 0.0 && float.is_sign_negative();
    if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER && !is_negative_zero {
        HostValue::Int(float as i64)
    } else {
        HostValue::Float(float)
    }
}

fn unsupported(type_name: &str) -> MarshalError {
    MarshalError::Unsupported {
        type_name: type_name.to_string(),
    }
}

enum PathStep {
    Index(usize),
    Key(String),
}

/// Identity set of the containers converted so far, held in an engine `Set`
/// so lookups go by object identity.
struct Visited<'js> {
    set: Object<'js>,
    has: Function<'js>,
    add: Function<'js>,
}

impl<'js> Visited<'js> {
    fn new(ctx: &Ctx<'js>) -> rquickjs::Result<Self> {
        let constructor: Constructor = ctx.globals().get("Set")?;
        let set: Object = constructor.construct(())?;
        Ok(Self {
            has: set.get("has")?,
            add: set.get("add")?,
            set,
        })
    }

    /// Record `value`. `false` if it was already recorded.
    fn insert(&self, value: &Value<'js>) -> rquickjs::Result<bool> {
        let seen: bool = self.has.call((This(self.set.clone()), value.clone()))?;
        if seen {
            return Ok(false);
        }
        let _: Value = self.add.call((This(self.set.clone()), value.clone()))?;
        Ok(true)
    }
}

/// State of one `to_host` call: the containers currently open (outermost
/// first), every container seen so far, the steps taken from the root value
/// and the number of values converted.
struct Walk<'js> {
    open: Vec<Value<'js>>,
    visited: Option<Visited<'js>>,
    path: Vec<PathStep>,
    nodes: usize,
    limits: MarshalLimits,
}

impl<'js> Walk<'js> {
    fn new(visited: Option<Visited<'js>>, limits: MarshalLimits) -> Self {
        Self {
            open: Vec::new(),
            visited,
            path: Vec::new(),
            nodes: 0,
            limits,
        }
    }

    fn open(&mut self, container: &Value<'js>) -> Result<(), MarshalError> {
        if self.open.contains(container) {
            return Err(MarshalError::Cycle { path: self.render() });
        }
        if let Some(visited) = &self.visited {
            if !visited.insert(container)? {
                return Err(MarshalError::Revisited { path: self.render() });
            }
        }
        if self.open.len() >= self.limits.max_depth {
            return Err(MarshalError::TooDeep {
                limit: self.limits.max_depth,
            });
        }
        self.open.push(container.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.open.pop();
    }

    fn count(&mut self, nodes: usize) -> Result<(), MarshalError> {
        self.ensure_room(nodes)?;
        self.nodes += nodes;
        Ok(())
    }

    /// Fail unless `nodes` more values fit in the budget.
    fn ensure_room(&self, nodes: usize) -> Result<(), MarshalError> {
        match self.nodes.checked_add(nodes) {
            Some(total) if total <= self.limits.max_nodes => Ok(()),
            _ => Err(MarshalError::TooLarge {
                limit: self.limits.max_nodes,
            }),
        }
    }

    /// `$.list[0].back` style rendering of the current position.
    fn render(&self) -> String {
        let mut path = String::from("$");
        for step in &self.path {
            match step {
                PathStep::Index(index) => path.push_str(&format!("[{index}]")),
                PathStep::Key(key) => {
                    path.push('.');
                    path.push_str(key);
                }
            }
        }
        path
    }
}
