//! Function and class codec.
//!
//! Callables travel as their source text. Decoding takes one of two paths:
//! class declarations are compiled structurally (constructor, methods,
//! accessors and static members rebuilt in an empty scope); everything else
//! is disassembled by pattern into name, parameters and body, and only the
//! body is parsed. The original closure environment is never restored, so a
//! body that reads a captured variable fails when called, not when decoded.

use std::sync::OnceLock;

use regex::Regex;

use crate::ast::{FunctionBody, FunctionKind, FunctionNode};
use crate::interpreter::RuntimeResult;
use crate::object_model::{ObjectHandle, ObjectKind};
use crate::parser::{
    ParseError, ParseErrorCode, ParseResult, parse_expression, parse_function_body,
    parse_parameters,
};
use crate::realm::Realm;

const CALLABLE_LABEL: &str = "<callable>";

/// Names the method pattern must not mistake for a method.
const NON_METHOD_NAMES: &[&str] = &[
    "function", "if", "for", "while", "switch", "catch", "with", "return", "class",
];

fn function_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^(async\s+)?function\s*([A-Za-z_$][\w$]*)?\s*\(([^)]*)\)\s*\{(.*)\}$").ok()
    })
    .as_ref()
}

fn arrow_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^(async\s+)?(?:\(([^)]*)\)|([A-Za-z_$][\w$]*))\s*=>\s*(.*)$").ok()
    })
    .as_ref()
}

fn method_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)^(?:(get|set|static)\s+)?(async\s+)?([A-Za-z_$][\w$]*)\s*\(([^)]*)\)\s*\{(.*)\}$",
        )
        .ok()
    })
    .as_ref()
}

fn unsupported(message: &str) -> ParseError {
    ParseError::new(
        ParseErrorCode::UnsupportedSyntax,
        message,
        CALLABLE_LABEL,
        None,
    )
}

/// Source text of a script callable. Natives have none: they are
/// intrinsics and always travel as well-known references.
pub fn encode_callable(kind: &ObjectKind) -> Option<&str> {
    match kind {
        ObjectKind::Function(data) => Some(&data.source),
        ObjectKind::Class(data) => Some(&data.source),
        _ => None,
    }
}

/// Does `source` declare a class?
pub fn is_class_source(source: &str) -> bool {
    source
        .trim_start()
        .strip_prefix("class")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '{'))
}

/// Split function, arrow or method source into a parsed node.
pub fn disassemble(source: &str) -> ParseResult<FunctionNode> {
    let text = source.trim();

    if let Some(captures) = function_regex().and_then(|re| re.captures(text)) {
        if captures.get(1).is_some() {
            return Err(unsupported("async functions are not supported"));
        }
        return Ok(FunctionNode {
            name: captures.get(2).map(|m| m.as_str().to_string()),
            params: parse_parameters(&captures[3])?,
            body: FunctionBody::Block(parse_function_body(&captures[4])?),
            kind: FunctionKind::Normal,
        });
    }

    if let Some(captures) = arrow_regex().and_then(|re| re.captures(text)) {
        if captures.get(1).is_some() {
            return Err(unsupported("async arrow functions are not supported"));
        }
        let params = match (captures.get(2), captures.get(3)) {
            (Some(list), _) => parse_parameters(list.as_str())?,
            (None, Some(single)) => vec![single.as_str().to_string()],
            (None, None) => Vec::new(),
        };
        let rest = captures[4].trim();
        let body = match rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            Some(block) => FunctionBody::Block(parse_function_body(block)?),
            None => FunctionBody::Expression(Box::new(parse_expression(rest)?)),
        };
        return Ok(FunctionNode {
            name: None,
            params,
            body,
            kind: FunctionKind::Arrow,
        });
    }

    if let Some(captures) = method_regex().and_then(|re| re.captures(text)) {
        let name = captures[3].to_string();
        if NON_METHOD_NAMES.contains(&name.as_str()) {
            return Err(unsupported("source is not a function, arrow or method"));
        }
        if captures.get(2).is_some() {
            return Err(unsupported("async methods are not supported"));
        }
        let kind = match captures.get(1).map(|m| m.as_str()) {
            Some("get") => FunctionKind::Getter,
            Some("set") => FunctionKind::Setter,
            _ => FunctionKind::Method,
        };
        return Ok(FunctionNode {
            name: Some(name),
            params: parse_parameters(&captures[4])?,
            body: FunctionBody::Block(parse_function_body(&captures[5])?),
            kind,
        });
    }

    Err(unsupported("source is not a function, arrow or method"))
}

/// Rebuild a callable from source, reporting why it failed.
pub fn reconstruct(realm: &mut Realm, source: &str) -> RuntimeResult<ObjectHandle> {
    if is_class_source(source) {
        realm.compile_class(source)
    } else {
        realm.compile_function(source, Vec::new())
    }
}

/// Rebuild a callable from source; `None` when the source is not invertible.
pub fn decode_callable(realm: &mut Realm, source: &str) -> Option<ObjectHandle> {
    reconstruct(realm, source).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression;
    use crate::interpreter::RuntimeError;
    use crate::object_model::JsValue;

    #[test]
    fn function_declaration_shape() {
        let node = disassemble("function add(a, b) {\n  return a + b;\n}").unwrap();
        assert_eq!(node.name.as_deref(), Some("add"));
        assert_eq!(node.params, vec!["a", "b"]);
        assert_eq!(node.kind, FunctionKind::Normal);
    }

    #[test]
    fn anonymous_function_shape() {
        let node = disassemble("function () {}").unwrap();
        assert_eq!(node.name, None);
        assert_eq!(node.body, FunctionBody::Block(Vec::new()));
    }

    #[test]
    fn arrow_shapes() {
        let concise = disassemble("(a, b) => a * b").unwrap();
        assert_eq!(concise.kind, FunctionKind::Arrow);
        assert!(matches!(concise.body, FunctionBody::Expression(_)));

        let single = disassemble("x => { return x }").unwrap();
        assert_eq!(single.params, vec!["x"]);
        assert!(matches!(single.body, FunctionBody::Block(_)));

        let object = disassemble("() => ({ a: 1 })").unwrap();
        let FunctionBody::Expression(expr) = object.body else {
            panic!("expected concise body");
        };
        assert!(matches!(*expr, Expression::Object(_)));
    }

    #[test]
    fn method_and_accessor_shapes() {
        let method = disassemble("sum(x) { return this.b + x; }").unwrap();
        assert_eq!(method.kind, FunctionKind::Method);
        let getter = disassemble("get size() { return 1 }").unwrap();
        assert_eq!(getter.kind, FunctionKind::Getter);
        assert_eq!(getter.name.as_deref(), Some("size"));
        let setter = disassemble("set size(v) { this.s = v }").unwrap();
        assert_eq!(setter.kind, FunctionKind::Setter);
        let named_get = disassemble("get() { return 1 }").unwrap();
        assert_eq!(named_get.kind, FunctionKind::Method);
    }

    #[test]
    fn unrecognized_sources_are_rejected() {
        for source in [
            "async function f() {}",
            "if (x) { y }",
            "42",
            "class",
            "function f() { for (;;) {} }",
        ] {
            assert!(disassemble(source).is_err(), "{source}");
        }
    }

    #[test]
    fn class_detection() {
        assert!(is_class_source("class A {}"));
        assert!(is_class_source("  class{}"));
        assert!(!is_class_source("classy() { return 1 }"));
        assert!(!is_class_source("function () {}"));
    }

    #[test]
    fn encode_returns_source_verbatim() {
        let mut realm = Realm::new();
        let source = "function (a) { return a }";
        let handle = realm.compile_function(source, Vec::new()).unwrap();
        let kind = realm.heap().kind(handle).unwrap();
        assert_eq!(encode_callable(kind), Some(source));
        let math = realm.intrinsics().math;
        let max = realm
            .heap()
            .get_own_property_descriptor(math, &"max".into())
            .unwrap()
            .and_then(|d| d.value().and_then(JsValue::as_object))
            .unwrap();
        assert_eq!(encode_callable(realm.heap().kind(max).unwrap()), None);
    }

    #[test]
    fn decoded_closure_fails_at_call_time() {
        let mut realm = Realm::new();
        let handle = decode_callable(&mut realm, "function () { return hidden * 2 }").unwrap();
        let err = realm
            .call(&JsValue::Object(handle), JsValue::Undefined, &[])
            .unwrap_err();
        assert_eq!(err, RuntimeError::ReferenceError("hidden".to_string()));
    }

    #[test]
    fn undecodable_source_is_none() {
        let mut realm = Realm::new();
        assert!(decode_callable(&mut realm, "not a function").is_none());
        assert!(decode_callable(&mut realm, "class extends {}").is_none());
    }
}
