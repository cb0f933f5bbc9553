//! Type classification for diagnostics
//!
//! A value is tested against every category independently, so one value can
//! land in several (`7` is NUMBER, INT32 and UINT32). Marshaling never looks
//! at these flags; it has its own fixed dispatch order.

use bitflags::bitflags;
use rquickjs::function::This;
use rquickjs::{Ctx, Function, Object, Type, Value};
use std::fmt;

bitflags! {
    /// Categories a value belongs to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u64 {
        const UNDEFINED           = 1 << 0;
        const NULL                = 1 << 1;
        const TRUE                = 1 << 2;
        const FALSE               = 1 << 3;
        const BOOLEAN             = 1 << 4;
        const NUMBER              = 1 << 5;
        const INT32               = 1 << 6;
        const UINT32              = 1 << 7;
        const STRING              = 1 << 8;
        const SYMBOL              = 1 << 9;
        const NAME                = 1 << 10;
        const BIG_INT             = 1 << 11;
        const OBJECT              = 1 << 12;
        const FUNCTION            = 1 << 13;
        const CONSTRUCTOR         = 1 << 14;
        const ARRAY               = 1 << 15;
        const ARGUMENTS_OBJECT    = 1 << 16;
        const BOOLEAN_OBJECT      = 1 << 17;
        const NUMBER_OBJECT       = 1 << 18;
        const STRING_OBJECT       = 1 << 19;
        const SYMBOL_OBJECT       = 1 << 20;
        const NATIVE_ERROR        = 1 << 21;
        const DATE                = 1 << 22;
        const REG_EXP             = 1 << 23;
        const PROMISE             = 1 << 24;
        const MAP                 = 1 << 25;
        const SET                 = 1 << 26;
        const WEAK_MAP            = 1 << 27;
        const WEAK_SET            = 1 << 28;
        const MAP_ITERATOR        = 1 << 29;
        const SET_ITERATOR        = 1 << 30;
        const GENERATOR_FUNCTION  = 1 << 31;
        const GENERATOR_OBJECT    = 1 << 32;
        const ARRAY_BUFFER        = 1 << 33;
        const ARRAY_BUFFER_VIEW   = 1 << 34;
        const DATA_VIEW           = 1 << 35;
        const TYPED_ARRAY         = 1 << 36;
        const INT8_ARRAY          = 1 << 37;
        const UINT8_ARRAY         = 1 << 38;
        const UINT8_CLAMPED_ARRAY = 1 << 39;
        const INT16_ARRAY         = 1 << 40;
        const UINT16_ARRAY        = 1 << 41;
        const INT32_ARRAY         = 1 << 42;
        const UINT32_ARRAY        = 1 << 43;
        const FLOAT32_ARRAY       = 1 << 44;
        const FLOAT64_ARRAY       = 1 << 45;
    }
}

impl fmt::Display for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

const TYPED_ARRAY_TAGS: &[&str] = &[
    "[object Int8Array]",
    "[object Uint8Array]",
    "[object Uint8ClampedArray]",
    "[object Int16Array]",
    "[object Uint16Array]",
    "[object Int32Array]",
    "[object Uint32Array]",
    "[object Float32Array]",
    "[object Float64Array]",
    "[object BigInt64Array]",
    "[object BigUint64Array]",
];

const ARRAY_BUFFER_VIEW_TAGS: &[&str] = &[
    "[object DataView]",
    "[object Int8Array]",
    "[object Uint8Array]",
    "[object Uint8ClampedArray]",
    "[object Int16Array]",
    "[object Uint16Array]",
    "[object Int32Array]",
    "[object Uint32Array]",
    "[object Float32Array]",
    "[object Float64Array]",
    "[object BigInt64Array]",
    "[object BigUint64Array]",
];

/// How a category is recognised.
enum Probe {
    Undefined,
    Null,
    True,
    False,
    Boolean,
    Number,
    Int32,
    Uint32,
    String,
    Symbol,
    Name,
    BigInt,
    Object,
    Function,
    Constructor,
    Array,
    /// Object whose class tag is exactly this.
    Tag(&'static str),
    /// Object whose class tag is any of these.
    AnyTag(&'static [&'static str]),
}

/// Evaluated top to bottom; every matching row sets its flag.
const PROBES: &[(TypeFlags, Probe)] = &[
    (TypeFlags::UNDEFINED, Probe::Undefined),
    (TypeFlags::NULL, Probe::Null),
    (TypeFlags::TRUE, Probe::True),
    (TypeFlags::FALSE, Probe::False),
    (TypeFlags::BOOLEAN, Probe::Boolean),
    (TypeFlags::NUMBER, Probe::Number),
    (TypeFlags::INT32, Probe::Int32),
    (TypeFlags::UINT32, Probe::Uint32),
    (TypeFlags::STRING, Probe::String),
    (TypeFlags::SYMBOL, Probe::Symbol),
    (TypeFlags::NAME, Probe::Name),
    (TypeFlags::BIG_INT, Probe::BigInt),
    (TypeFlags::OBJECT, Probe::Object),
    (TypeFlags::FUNCTION, Probe::Function),
    (TypeFlags::CONSTRUCTOR, Probe::Constructor),
    (TypeFlags::ARRAY, Probe::Array),
    (TypeFlags::ARGUMENTS_OBJECT, Probe::Tag("[object Arguments]")),
    (TypeFlags::BOOLEAN_OBJECT, Probe::Tag("[object Boolean]")),
    (TypeFlags::NUMBER_OBJECT, Probe::Tag("[object Number]")),
    (TypeFlags::STRING_OBJECT, Probe::Tag("[object String]")),
    (TypeFlags::SYMBOL_OBJECT, Probe::Tag("[object Symbol]")),
    (TypeFlags::NATIVE_ERROR, Probe::Tag("[object Error]")),
    (TypeFlags::DATE, Probe::Tag("[object Date]")),
    (TypeFlags::REG_EXP, Probe::Tag("[object RegExp]")),
    (TypeFlags::PROMISE, Probe::Tag("[object Promise]")),
    (TypeFlags::MAP, Probe::Tag("[object Map]")),
    (TypeFlags::SET, Probe::Tag("[object Set]")),
    (TypeFlags::WEAK_MAP, Probe::Tag("[object WeakMap]")),
    (TypeFlags::WEAK_SET, Probe::Tag("[object WeakSet]")),
    (TypeFlags::MAP_ITERATOR, Probe::Tag("[object Map Iterator]")),
    (TypeFlags::SET_ITERATOR, Probe::Tag("[object Set Iterator]")),
    (TypeFlags::GENERATOR_FUNCTION, Probe::Tag("[object GeneratorFunction]")),
    (TypeFlags::GENERATOR_OBJECT, Probe::Tag("[object Generator]")),
    (
        TypeFlags::ARRAY_BUFFER,
        Probe::AnyTag(&["[object ArrayBuffer]", "[object SharedArrayBuffer]"]),
    ),
    (TypeFlags::ARRAY_BUFFER_VIEW, Probe::AnyTag(ARRAY_BUFFER_VIEW_TAGS)),
    (TypeFlags::DATA_VIEW, Probe::Tag("[object DataView]")),
    (TypeFlags::TYPED_ARRAY, Probe::AnyTag(TYPED_ARRAY_TAGS)),
    (TypeFlags::INT8_ARRAY, Probe::Tag("[object Int8Array]")),
    (TypeFlags::UINT8_ARRAY, Probe::Tag("[object Uint8Array]")),
    (TypeFlags::UINT8_CLAMPED_ARRAY, Probe::Tag("[object Uint8ClampedArray]")),
    (TypeFlags::INT16_ARRAY, Probe::Tag("[object Int16Array]")),
    (TypeFlags::UINT16_ARRAY, Probe::Tag("[object Uint16Array]")),
    (TypeFlags::INT32_ARRAY, Probe::Tag("[object Int32Array]")),
    (TypeFlags::UINT32_ARRAY, Probe::Tag("[object Uint32Array]")),
    (TypeFlags::FLOAT32_ARRAY, Probe::Tag("[object Float32Array]")),
    (TypeFlags::FLOAT64_ARRAY, Probe::Tag("[object Float64Array]")),
];

impl Probe {
    fn matches(&self, value: &Value<'_>, tag: Option<&str>) -> bool {
        match self {
            Probe::Undefined => value.is_undefined(),
            Probe::Null => value.is_null(),
            Probe::True => value.as_bool() == Some(true),
            Probe::False => value.as_bool() == Some(false),
            Probe::Boolean => value.is_bool(),
            Probe::Number => value.is_number(),
            Probe::Int32 => exact_integer(value).is_some_and(|n| i32::try_from(n).is_ok()),
            Probe::Uint32 => exact_integer(value).is_some_and(|n| u32::try_from(n).is_ok()),
            Probe::String => value.is_string(),
            Probe::Symbol => value.is_symbol(),
            Probe::Name => value.is_string() || value.is_symbol(),
            Probe::BigInt => value.type_of() == Type::BigInt,
            Probe::Object => value.is_object(),
            Probe::Function => value.is_function(),
            Probe::Constructor => value.is_constructor(),
            Probe::Array => value.is_array(),
            Probe::Tag(expected) => tag == Some(*expected),
            Probe::AnyTag(expected) => tag.is_some_and(|tag| expected.contains(&tag)),
        }
    }
}

/// Integer held by a number value, if it holds one exactly.
fn exact_integer(value: &Value<'_>) -> Option<i64> {
    if let Some(int) = value.as_int() {
        return Some(int.into());
    }
    let float = value.as_float()?;
    let is_negative_zero = float == 0.0 && float.is_sign_negative();
    (float.fract() == 0.0 && float.abs() < 4_294_967_296.0 && !is_negative_zero)
        .then_some(float as i64)
}

/// Classify `value` into every category it belongs to. Never fails.
pub fn classify<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> TypeFlags {
    let tag = if value.is_object() {
        ClassTag::new(ctx).ok().and_then(|probe| probe.of(value))
    } else {
        None
    };

    PROBES
        .iter()
        .filter(|(_, probe)| probe.matches(value, tag.as_deref()))
        .fold(TypeFlags::empty(), |flags, (flag, _)| flags | *flag)
}

/// JavaScript `typeof` of a value.
pub fn type_of(value: &Value<'_>) -> &'static str {
    if value.is_undefined() {
        "undefined"
    } else if value.is_null() {
        "object"
    } else if value.is_bool() {
        "boolean"
    } else if value.is_number() {
        "number"
    } else if value.is_string() {
        "string"
    } else if value.is_symbol() {
        "symbol"
    } else if value.is_function() {
        "function"
    } else if value.type_of() == Type::BigInt {
        "bigint"
    } else {
        "object"
    }
}

/// `Object.prototype.toString`, the engine's class tag for objects.
pub(crate) struct ClassTag<'js> {
    ctx: Ctx<'js>,
    to_string: Function<'js>,
}

impl<'js> ClassTag<'js> {
    pub(crate) fn new(ctx: &Ctx<'js>) -> rquickjs::Result<Self> {
        let object: Object = ctx.globals().get("Object")?;
        let prototype: Object = object.get("prototype")?;
        Ok(Self {
            ctx: ctx.clone(),
            to_string: prototype.get("toString")?,
        })
    }

    /// Tag such as `[object Map]`, or `None` if the lookup threw.
    pub(crate) fn of(&self, value: &Value<'js>) -> Option<String> {
        match self.to_string.call::<_, String>((This(value.clone()),)) {
            Ok(tag) => Some(tag),
            Err(_) => {
                let _ = self.ctx.catch();
                None
            }
        }
    }
}

/// `Map` from `[object Map]`.
pub(crate) fn tag_name(tag: &str) -> &str {
    tag.strip_prefix("[object ")
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn classify_source(source: &str) -> TypeFlags {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let value: Value = ctx.eval(source).unwrap();
            classify(&ctx, &value)
        })
    }

    #[test]
    fn test_small_integer_matches_several_categories() {
        let flags = classify_source("7");
        assert!(flags.contains(TypeFlags::NUMBER | TypeFlags::INT32 | TypeFlags::UINT32));
        assert!(!flags.contains(TypeFlags::OBJECT));
    }

    #[test]
    fn test_negative_and_fractional_numbers() {
        let negative = classify_source("-3");
        assert!(negative.contains(TypeFlags::INT32));
        assert!(!negative.contains(TypeFlags::UINT32));

        let fraction = classify_source("1.5");
        assert!(fraction.contains(TypeFlags::NUMBER));
        assert!(!fraction.intersects(TypeFlags::INT32 | TypeFlags::UINT32));
    }

    #[test]
    fn test_booleans_and_absence() {
        assert!(classify_source("true").contains(TypeFlags::TRUE | TypeFlags::BOOLEAN));
        assert!(classify_source("false").contains(TypeFlags::FALSE | TypeFlags::BOOLEAN));
        assert_eq!(classify_source("undefined"), TypeFlags::UNDEFINED);
        assert_eq!(classify_source("null"), TypeFlags::NULL);
    }

    #[test]
    fn test_strings_and_symbols_are_names() {
        assert!(classify_source("'abc'").contains(TypeFlags::STRING | TypeFlags::NAME));
        assert!(classify_source("Symbol('s')").contains(TypeFlags::SYMBOL | TypeFlags::NAME));
    }

    #[test]
    fn test_object_categories_by_class_tag() {
        assert!(classify_source("new Map()").contains(TypeFlags::OBJECT | TypeFlags::MAP));
        assert!(classify_source("new Set()").contains(TypeFlags::SET));
        assert!(classify_source("new Date(0)").contains(TypeFlags::DATE));
        assert!(classify_source("/x/g").contains(TypeFlags::REG_EXP));
        assert!(classify_source("new TypeError('x')").contains(TypeFlags::NATIVE_ERROR));
        assert!(classify_source("new Boolean(false)").contains(TypeFlags::BOOLEAN_OBJECT));
        assert!(!classify_source("new Boolean(false)").contains(TypeFlags::BOOLEAN));
        assert!(classify_source("(function() { return arguments; })()")
            .contains(TypeFlags::ARGUMENTS_OBJECT));
    }

    #[test]
    fn test_typed_arrays() {
        let flags = classify_source("new Uint8ClampedArray(4)");
        assert!(flags.contains(
            TypeFlags::TYPED_ARRAY | TypeFlags::UINT8_CLAMPED_ARRAY | TypeFlags::OBJECT
        ));
        assert!(!flags.contains(TypeFlags::UINT8_ARRAY));
        assert!(classify_source("new ArrayBuffer(8)").contains(TypeFlags::ARRAY_BUFFER));
        assert!(classify_source("new DataView(new ArrayBuffer(8))")
            .contains(TypeFlags::DATA_VIEW | TypeFlags::ARRAY_BUFFER_VIEW));
        assert!(!classify_source("new ArrayBuffer(8)").contains(TypeFlags::ARRAY_BUFFER_VIEW));
    }

    #[test]
    fn test_functions() {
        let flags = classify_source("(function() {})");
        assert!(flags.contains(TypeFlags::FUNCTION | TypeFlags::OBJECT));
        assert!(classify_source("(function*() {})").contains(TypeFlags::GENERATOR_FUNCTION));
        assert!(classify_source("[1, 2]").contains(TypeFlags::ARRAY | TypeFlags::OBJECT));
    }

    #[test]
    fn test_display_joins_names() {
        let flags = TypeFlags::NUMBER | TypeFlags::INT32;
        assert_eq!(flags.to_string(), "NUMBER|INT32");
        assert_eq!(TypeFlags::empty().to_string(), "(none)");
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name("[object Map Iterator]"), "Map Iterator");
        assert_eq!(tag_name("weird"), "weird");
    }
}
