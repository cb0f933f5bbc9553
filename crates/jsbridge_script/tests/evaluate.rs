//! End-to-end behaviour of a script context through the public API.

use jsbridge_script::{
    BindingError, Context, ContextConfig, ContextError, HostMap, HostValue, MarshalError, ScriptError, TypeFlags,
    ENGINE_VERSION,
};

fn context() -> Context {
    Context::new(Some("integration")).unwrap()
}

#[test]
fn test_arithmetic_result() {
    let ctx = context();
    assert_eq!(ctx.evaluate("1 + 2", None).unwrap(), HostValue::Int(3));
    assert_eq!(ctx.evaluate("7 / 2", None).unwrap(), HostValue::Float(3.5));
    assert_eq!(ctx.evaluate("var unused = 1;", None).unwrap(), HostValue::Undefined);
}

#[test]
fn test_version_global() {
    let ctx = context();
    assert_eq!(ctx.evaluate("version()", None).unwrap(), HostValue::from(ENGINE_VERSION));
    assert_eq!(ctx.type_of("timestamp_ms").unwrap(), "function");
}

#[test]
fn test_object_result() {
    let ctx = context();
    let value = ctx.evaluate("({a: 1, b: [2, 3]})", None).unwrap();

    let expected: HostMap = [
        ("a", HostValue::Int(1)),
        ("b", HostValue::Array(vec![HostValue::Int(2), HostValue::Int(3)])),
    ]
    .into_iter()
    .collect();
    assert_eq!(value, HostValue::Object(expected));
}

#[test]
fn test_compile_error_leaves_context_usable() {
    let ctx = context();
    let err = ctx.evaluate("syntax (((", Some("broken.js")).unwrap_err();
    match err {
        ContextError::Script(ScriptError::Compile(report)) => {
            assert_eq!(report.name.as_deref(), Some("SyntaxError"));
            assert_eq!(report.filename, "broken.js");
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert_eq!(ctx.evaluate("2 * 21", None).unwrap(), HostValue::Int(42));
}

#[test]
fn test_syntax_errors_thrown_while_running_are_runtime_errors() {
    let ctx = context();
    for source in [
        "JSON.parse('{')",
        "new RegExp('(')",
        "eval('(((')",
        "throw new SyntaxError('x')",
        "function parse() { return JSON.parse('{'); } parse()",
    ] {
        match ctx.evaluate(source, None) {
            Err(ContextError::Script(ScriptError::Runtime(report))) => {
                assert_eq!(report.name.as_deref(), Some("SyntaxError"), "{source}");
            }
            other => panic!("{source}: expected a runtime error, got {other:?}"),
        }
    }
    assert_eq!(ctx.evaluate("'still' + ' usable'", None).unwrap(), HostValue::from("still usable"));
}

#[test]
fn test_parse_failures_are_compile_errors() {
    let ctx = context();
    for source in ["var = 1;", "function (", "let x = ;", "}"] {
        let err = ctx.evaluate(source, None).unwrap_err();
        assert!(
            matches!(err, ContextError::Script(ScriptError::Compile(_))),
            "{source}: {err:?}"
        );
    }
}

#[test]
fn test_runtime_error_keeps_state() {
    let ctx = context();
    ctx.evaluate("var counter = 1;", None).unwrap();

    let err = ctx.evaluate("counter += 1; null.property", None).unwrap_err();
    match err {
        ContextError::Script(ScriptError::Runtime(report)) => {
            assert_eq!(report.name.as_deref(), Some("TypeError"));
            assert_eq!(report.filename, "<eval>");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }

    let err = ctx.evaluate("throw 'plain'", None).unwrap_err();
    match err {
        ContextError::Script(ScriptError::Runtime(report)) => assert_eq!(report.message, "plain"),
        other => panic!("expected a runtime error, got {other:?}"),
    }

    assert_eq!(ctx.get("counter").unwrap(), HostValue::Int(2));
}

#[test]
fn test_set_then_read_from_script() {
    let ctx = context();
    ctx.set("foo", &HostValue::Int(42)).unwrap();
    assert_eq!(ctx.evaluate("foo", None).unwrap(), HostValue::Int(42));

    ctx.set("settings.name", &HostValue::from("bridge")).unwrap();
    assert_eq!(ctx.evaluate("settings.name.length", None).unwrap(), HostValue::Int(6));
}

#[test]
fn test_undeclared_names() {
    let ctx = context();
    assert!(!ctx.exists("neverDeclared").unwrap());
    assert_eq!(ctx.type_of("neverDeclared").unwrap(), "undefined");
    assert_eq!(ctx.get("neverDeclared").unwrap(), HostValue::Undefined);
    assert_eq!(ctx.classify("neverDeclared").unwrap(), TypeFlags::UNDEFINED);
}

#[test]
fn test_cyclic_result_is_rejected() {
    let ctx = context();
    let err = ctx.evaluate("var o = {}; o.self = o; o", None).unwrap_err();
    assert!(matches!(err, ContextError::Marshal(MarshalError::Cycle { .. })), "{err:?}");

    // The object itself is still there for scripts.
    assert_eq!(ctx.evaluate("o.self === o", None).unwrap(), HostValue::Bool(true));
}

#[test]
fn test_shared_and_oversized_results_fail_fast() {
    let ctx = context();

    let err = ctx
        .evaluate("var a = [1]; for (var i = 0; i < 40; i++) a = [a, a]; a", None)
        .unwrap_err();
    assert!(matches!(err, ContextError::Marshal(MarshalError::Revisited { .. })), "{err:?}");

    let err = ctx.evaluate("var sparse = []; sparse.length = 4294967295; sparse", None).unwrap_err();
    assert!(matches!(err, ContextError::Marshal(MarshalError::TooLarge { .. })), "{err:?}");
    assert!(matches!(
        ctx.get("sparse"),
        Err(ContextError::Marshal(MarshalError::TooLarge { .. }))
    ));

    assert_eq!(ctx.evaluate("sparse.length", None).unwrap(), HostValue::Int(4_294_967_295));
}

#[test]
fn test_unsupported_result() {
    let ctx = context();
    let err = ctx.evaluate("(function named() {})", None).unwrap_err();
    assert!(matches!(err, ContextError::Marshal(MarshalError::Unsupported { .. })), "{err:?}");
}

#[test]
fn test_invalid_paths() {
    let ctx = context();
    for name in ["", "a..b", "9lives", "has space"] {
        let err = ctx.get(name).unwrap_err();
        assert!(matches!(err, ContextError::Binding(BindingError::InvalidPath { .. })), "{name}");
    }
}

#[test]
fn test_evaluate_file() {
    let dir = std::env::temp_dir().join(format!("jsbridge_eval_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("script.js");
    std::fs::write(&path, "var total = 0;\nfor (var i = 1; i <= 4; i++) total += i;\ntotal").unwrap();

    let ctx = context();
    assert_eq!(ctx.evaluate_file(&path).unwrap(), HostValue::Int(10));

    let err = ctx.evaluate_file(dir.join("missing.js")).unwrap_err();
    assert!(matches!(err, ContextError::Io { .. }));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_contexts_are_isolated() {
    let first = context();
    let second = Context::with_config(ContextConfig::labelled("other")).unwrap();

    first.set("shared", &HostValue::Int(1)).unwrap();
    assert!(first.exists("shared").unwrap());
    assert!(!second.exists("shared").unwrap());
}
