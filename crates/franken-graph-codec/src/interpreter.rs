//! Tree-walking evaluator for parsed callable bodies.
//!
//! Each invocation gets a fresh scope stack: the captured bindings of the
//! function form the outermost frame, parameters the next one, and every
//! block pushes its own frame. Names that resolve nowhere fall back to the
//! realm's global object and otherwise raise `ReferenceError`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{
    AssignOperator, BinaryOperator, DeclarationKind, Expression, FunctionBody, FunctionKind,
    FunctionNode, LogicalOperator, MemberProperty, Statement, UnaryOperator,
};
use crate::object_model::{
    JsValue, ObjectError, ObjectKind, PropertyDescriptor, PropertyKey, format_number,
};
use crate::parser::ParseError;
use crate::realm::Realm;

// ---------------------------------------------------------------------------
// RuntimeError
// ---------------------------------------------------------------------------

/// Errors raised while running script code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RuntimeError {
    #[error("ReferenceError: {0} is not defined")]
    ReferenceError(String),
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("{0}")]
    Object(#[from] ObjectError),
    #[error("SyntaxError: {0}")]
    Parse(#[from] ParseError),
    #[error("RangeError: maximum call depth {max} exceeded")]
    CallDepthExceeded { max: u32 },
    #[error("RangeError: expression nesting exceeds {max}")]
    EvaluationTooDeep { max: u32 },
}

impl RuntimeError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ReferenceError(_) => "reference_error",
            Self::TypeError(_) => "type_error",
            Self::Object(_) => "object_error",
            Self::Parse(_) => "parse_error",
            Self::CallDepthExceeded { .. } => "call_depth_exceeded",
            Self::EvaluationTooDeep { .. } => "evaluation_too_deep",
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// `typeof value`.
pub fn type_of(realm: &Realm, value: &JsValue) -> &'static str {
    match value {
        JsValue::Object(handle) => match realm.heap().kind(*handle) {
            Ok(kind) if kind.is_callable() => "function",
            _ => "object",
        },
        other => other.type_name(),
    }
}

fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    let numeric = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !numeric {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// ToNumber (ES2020 §7.1.4) over the value kinds this runtime has.
pub fn to_number(realm: &Realm, value: &JsValue) -> RuntimeResult<f64> {
    match value {
        JsValue::Undefined => Ok(f64::NAN),
        JsValue::Null => Ok(0.0),
        JsValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        JsValue::Number(n) => Ok(*n),
        JsValue::Str(s) => Ok(string_to_number(s)),
        JsValue::BigInt(_) => Err(RuntimeError::type_error(
            "Cannot convert a BigInt value to a number",
        )),
        JsValue::Symbol(_) => Err(RuntimeError::type_error(
            "Cannot convert a Symbol value to a number",
        )),
        JsValue::Object(_) => Ok(string_to_number(&to_display_string(realm, value)?)),
    }
}

fn object_to_string(realm: &Realm, value: &JsValue, depth: u32) -> RuntimeResult<String> {
    let JsValue::Object(handle) = value else {
        return to_display_string(realm, value);
    };
    let object = realm.heap().get(*handle)?;
    Ok(match &object.kind {
        ObjectKind::Function(data) => data.source.clone(),
        ObjectKind::Class(data) => data.source.clone(),
        ObjectKind::Native(native) => format!("function {}() {{ [native code] }}", native.name()),
        ObjectKind::Opaque(_) => "[object Blob]".to_string(),
        ObjectKind::Ordinary => "[object Object]".to_string(),
        ObjectKind::Array => {
            let mut parts = Vec::new();
            for index in 0..object.array_length() {
                let key = PropertyKey::String(index.to_string());
                let element = object
                    .get_own_property(&key)
                    .and_then(PropertyDescriptor::value)
                    .cloned()
                    .unwrap_or(JsValue::Undefined);
                parts.push(match element {
                    JsValue::Undefined | JsValue::Null => String::new(),
                    JsValue::Object(_) if depth >= 8 => String::new(),
                    JsValue::Object(_) => object_to_string(realm, &element, depth + 1)?,
                    other => to_display_string(realm, &other)?,
                });
            }
            parts.join(",")
        }
    })
}

/// ToString (ES2020 §7.1.12); objects render without invoking script code.
pub fn to_display_string(realm: &Realm, value: &JsValue) -> RuntimeResult<String> {
    match value {
        JsValue::Symbol(_) => Err(RuntimeError::type_error(
            "Cannot convert a Symbol value to a string",
        )),
        JsValue::Number(n) => Ok(format_number(*n)),
        JsValue::Object(_) => object_to_string(realm, value, 0),
        other => Ok(other.to_string()),
    }
}

/// ToPropertyKey (ES2020 §7.1.19).
pub fn to_property_key(realm: &Realm, value: &JsValue) -> RuntimeResult<PropertyKey> {
    match value {
        JsValue::Symbol(id) => Ok(PropertyKey::Symbol(*id)),
        other => Ok(PropertyKey::String(to_display_string(realm, other)?)),
    }
}

fn loose_equals(realm: &Realm, left: &JsValue, right: &JsValue) -> RuntimeResult<bool> {
    Ok(match (left, right) {
        (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
        (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => false,
        (JsValue::Number(_), JsValue::Str(_)) | (JsValue::Str(_), JsValue::Number(_)) => {
            to_number(realm, left)? == to_number(realm, right)?
        }
        (JsValue::Bool(_), _) => {
            loose_equals(realm, &JsValue::Number(to_number(realm, left)?), right)?
        }
        (_, JsValue::Bool(_)) => {
            loose_equals(realm, left, &JsValue::Number(to_number(realm, right)?))?
        }
        (JsValue::Object(_), JsValue::Number(_) | JsValue::Str(_)) => {
            loose_equals(realm, &JsValue::Str(to_display_string(realm, left)?), right)?
        }
        (JsValue::Number(_) | JsValue::Str(_), JsValue::Object(_)) => {
            loose_equals(realm, left, &JsValue::Str(to_display_string(realm, right)?))?
        }
        _ => left.strict_equals(right),
    })
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Binding {
    value: JsValue,
    mutable: bool,
}

enum Completion {
    Normal,
    Return(JsValue),
}

struct Interpreter<'r> {
    realm: &'r mut Realm,
    scopes: Vec<BTreeMap<String, Binding>>,
    this: JsValue,
}

/// Run `node` with the given captured bindings, receiver and arguments.
pub(crate) fn call_node(
    realm: &mut Realm,
    node: &FunctionNode,
    captures: &[(String, JsValue)],
    this: JsValue,
    args: &[JsValue],
) -> RuntimeResult<JsValue> {
    let captured: BTreeMap<String, Binding> = captures
        .iter()
        .map(|(name, value)| {
            (
                name.clone(),
                Binding {
                    value: value.clone(),
                    mutable: true,
                },
            )
        })
        .collect();
    let params: BTreeMap<String, Binding> = node
        .params
        .iter()
        .enumerate()
        .map(|(index, name)| {
            (
                name.clone(),
                Binding {
                    value: args.get(index).cloned().unwrap_or(JsValue::Undefined),
                    mutable: true,
                },
            )
        })
        .collect();
    let this = match node.kind {
        FunctionKind::Arrow => JsValue::Undefined,
        _ => this,
    };

    let mut interpreter = Interpreter {
        realm,
        scopes: vec![captured, params],
        this,
    };
    match &node.body {
        FunctionBody::Expression(expression) => interpreter.evaluate(expression),
        FunctionBody::Block(statements) => match interpreter.execute_all(statements)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(JsValue::Undefined),
        },
    }
}

impl Interpreter<'_> {
    // -- scopes -------------------------------------------------------------

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    fn read_identifier(&mut self, name: &str) -> RuntimeResult<JsValue> {
        if let Some(binding) = self.lookup(name) {
            return Ok(binding.value.clone());
        }
        let global = self.realm.global();
        let key = PropertyKey::from(name);
        if self.realm.heap().has_property(global, &key)? {
            return self.realm.get(global, &key);
        }
        Err(RuntimeError::ReferenceError(name.to_string()))
    }

    fn write_identifier(&mut self, name: &str, value: JsValue) -> RuntimeResult<()> {
        for frame in self.scopes.iter_mut().rev() {
            if let Some(binding) = frame.get_mut(name) {
                if !binding.mutable {
                    return Err(RuntimeError::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(());
            }
        }
        let global = self.realm.global();
        let key = PropertyKey::from(name);
        if self.realm.heap().has_property(global, &key)? {
            return self.realm.set(global, key, value);
        }
        Err(RuntimeError::ReferenceError(name.to_string()))
    }

    fn declare(&mut self, kind: DeclarationKind, name: &str, value: JsValue) {
        let binding = Binding {
            value,
            mutable: kind != DeclarationKind::Const,
        };
        // `var` is function scoped: it lands in the parameter frame.
        let frame = match kind {
            DeclarationKind::Var => self.scopes.get_mut(1),
            DeclarationKind::Let | DeclarationKind::Const => self.scopes.last_mut(),
        };
        if let Some(frame) = frame {
            frame.insert(name.to_string(), binding);
        }
    }

    // -- statements ---------------------------------------------------------

    fn execute_all(&mut self, statements: &[Statement]) -> RuntimeResult<Completion> {
        for statement in statements {
            if let Completion::Return(value) = self.execute(statement)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_block(&mut self, statements: &[Statement]) -> RuntimeResult<Completion> {
        self.scopes.push(BTreeMap::new());
        let completion = self.execute_all(statements);
        self.scopes.pop();
        completion
    }

    fn execute(&mut self, statement: &Statement) -> RuntimeResult<Completion> {
        match statement {
            Statement::Return(argument) => {
                let value = match argument {
                    Some(expression) => self.evaluate(expression)?,
                    None => JsValue::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Declaration { kind, name, init } => {
                let value = match init {
                    Some(expression) => self.evaluate(expression)?,
                    None => JsValue::Undefined,
                };
                self.declare(*kind, name, value);
                Ok(Completion::Normal)
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test)?.is_truthy() {
                    self.execute_nested(consequent)
                } else if let Some(alternate) = alternate {
                    self.execute_nested(alternate)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Statement::Block(statements) => self.execute_block(statements),
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
                Ok(Completion::Normal)
            }
        }
    }

    fn execute_nested(&mut self, statement: &Statement) -> RuntimeResult<Completion> {
        match statement {
            Statement::Block(statements) => self.execute_block(statements),
            other => self.execute_block(std::slice::from_ref(other)),
        }
    }

    // -- expressions --------------------------------------------------------

    fn evaluate(&mut self, expression: &Expression) -> RuntimeResult<JsValue> {
        self.realm.enter_evaluation()?;
        let result = self.evaluate_unguarded(expression);
        self.realm.exit_evaluation();
        result
    }

    fn evaluate_unguarded(&mut self, expression: &Expression) -> RuntimeResult<JsValue> {
        match expression {
            Expression::Number(n) => Ok(JsValue::Number(*n)),
            Expression::String(s) => Ok(JsValue::Str(s.clone())),
            Expression::Bool(b) => Ok(JsValue::Bool(*b)),
            Expression::Null => Ok(JsValue::Null),
            Expression::Undefined => Ok(JsValue::Undefined),
            Expression::Identifier(name) => self.read_identifier(name),
            Expression::This => Ok(self.this.clone()),
            Expression::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(JsValue::Object(self.realm.create_array(values)?))
            }
            Expression::Object(properties) => {
                let object = self.realm.create_object();
                for (key, value) in properties {
                    let value = self.evaluate(value)?;
                    self.realm.heap_mut().define_property(
                        object,
                        PropertyKey::from(key.as_str()),
                        PropertyDescriptor::data(value),
                    )?;
                }
                Ok(JsValue::Object(object))
            }
            Expression::Member { object, property } => {
                let base = self.evaluate(object)?;
                let key = self.member_key(property)?;
                self.get_member(&base, &key)
            }
            Expression::Call { callee, arguments } => {
                let (function, this) = match callee.as_ref() {
                    Expression::Member { object, property } => {
                        let base = self.evaluate(object)?;
                        let key = self.member_key(property)?;
                        (self.get_member(&base, &key)?, base)
                    }
                    other => (self.evaluate(other)?, JsValue::Undefined),
                };
                let args = self.evaluate_arguments(arguments)?;
                if type_of(self.realm, &function) != "function" {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a function",
                        describe(callee)
                    )));
                }
                self.realm.call(&function, this, &args)
            }
            Expression::New { callee, arguments } => {
                let constructor = self.evaluate(callee)?;
                let args = self.evaluate_arguments(arguments)?;
                self.realm.construct(&constructor, &args)
            }
            Expression::Unary { operator, argument } => self.evaluate_unary(*operator, argument),
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.apply_binary(*operator, &left, &right)
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match operator {
                    LogicalOperator::And => !left.is_truthy(),
                    LogicalOperator::Or => left.is_truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate(test)?.is_truthy() {
                    self.evaluate(consequent)
                } else {
                    self.evaluate(alternate)
                }
            }
            Expression::Assign {
                operator,
                target,
                value,
            } => self.evaluate_assignment(*operator, target, value),
        }
    }

    fn evaluate_arguments(&mut self, arguments: &[Expression]) -> RuntimeResult<Vec<JsValue>> {
        arguments.iter().map(|a| self.evaluate(a)).collect()
    }

    fn member_key(&mut self, property: &MemberProperty) -> RuntimeResult<PropertyKey> {
        match property {
            MemberProperty::Named(name) => Ok(PropertyKey::from(name.as_str())),
            MemberProperty::Computed(expression) => {
                let value = self.evaluate(expression)?;
                to_property_key(self.realm, &value)
            }
        }
    }

    fn get_member(&mut self, base: &JsValue, key: &PropertyKey) -> RuntimeResult<JsValue> {
        match base {
            JsValue::Object(handle) => self.realm.get(*handle, key),
            JsValue::Undefined | JsValue::Null => Err(RuntimeError::type_error(format!(
                "Cannot read properties of {base} (reading '{key}')"
            ))),
            JsValue::Str(s) => {
                if *key == PropertyKey::from("length") {
                    return Ok(JsValue::Number(s.encode_utf16().count() as f64));
                }
                Ok(key
                    .array_index()
                    .and_then(|index| s.encode_utf16().nth(index as usize))
                    .map_or(JsValue::Undefined, |unit| {
                        JsValue::Str(String::from_utf16_lossy(&[unit]))
                    }))
            }
            _ => Ok(JsValue::Undefined),
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: UnaryOperator,
        argument: &Expression,
    ) -> RuntimeResult<JsValue> {
        if operator == UnaryOperator::TypeOf
            && let Expression::Identifier(name) = argument
            && self.lookup(name).is_none()
            && !self
                .realm
                .heap()
                .has_property(self.realm.global(), &PropertyKey::from(name.as_str()))?
        {
            return Ok(JsValue::str("undefined"));
        }
        let value = self.evaluate(argument)?;
        Ok(match operator {
            UnaryOperator::Not => JsValue::Bool(!value.is_truthy()),
            UnaryOperator::Minus => JsValue::Number(-to_number(self.realm, &value)?),
            UnaryOperator::Plus => JsValue::Number(to_number(self.realm, &value)?),
            UnaryOperator::TypeOf => JsValue::str(type_of(self.realm, &value)),
        })
    }

    fn apply_binary(
        &self,
        operator: BinaryOperator,
        left: &JsValue,
        right: &JsValue,
    ) -> RuntimeResult<JsValue> {
        let realm: &Realm = &*self.realm;
        if matches!(left, JsValue::BigInt(_)) || matches!(right, JsValue::BigInt(_)) {
            match operator {
                BinaryOperator::StrictEq => return Ok(JsValue::Bool(left.strict_equals(right))),
                BinaryOperator::StrictNotEq => {
                    return Ok(JsValue::Bool(!left.strict_equals(right)));
                }
                BinaryOperator::LooseEq => return Ok(JsValue::Bool(left == right)),
                BinaryOperator::LooseNotEq => return Ok(JsValue::Bool(left != right)),
                _ => {
                    return Err(RuntimeError::type_error(
                        "BigInt arithmetic is not supported",
                    ));
                }
            }
        }
        let numeric = |op: fn(f64, f64) -> f64| -> RuntimeResult<JsValue> {
            Ok(JsValue::Number(op(
                to_number(realm, left)?,
                to_number(realm, right)?,
            )))
        };
        let compare = |op: fn(std::cmp::Ordering) -> bool| -> RuntimeResult<JsValue> {
            if let (JsValue::Str(a), JsValue::Str(b)) = (left, right) {
                return Ok(JsValue::Bool(op(a.cmp(b))));
            }
            let a = to_number(realm, left)?;
            let b = to_number(realm, right)?;
            Ok(JsValue::Bool(a.partial_cmp(&b).is_some_and(op)))
        };
        match operator {
            BinaryOperator::Add => {
                let is_textual = |v: &JsValue| matches!(v, JsValue::Str(_) | JsValue::Object(_));
                if is_textual(left) || is_textual(right) {
                    let mut text = to_display_string(realm, left)?;
                    text.push_str(&to_display_string(realm, right)?);
                    return Ok(JsValue::Str(text));
                }
                numeric(|a, b| a + b)
            }
            BinaryOperator::Sub => numeric(|a, b| a - b),
            BinaryOperator::Mul => numeric(|a, b| a * b),
            BinaryOperator::Div => numeric(|a, b| a / b),
            BinaryOperator::Rem => numeric(|a, b| a % b),
            BinaryOperator::Less => compare(|o| o.is_lt()),
            BinaryOperator::Greater => compare(|o| o.is_gt()),
            BinaryOperator::LessEq => compare(|o| o.is_le()),
            BinaryOperator::GreaterEq => compare(|o| o.is_ge()),
            BinaryOperator::StrictEq => Ok(JsValue::Bool(left.strict_equals(right))),
            BinaryOperator::StrictNotEq => Ok(JsValue::Bool(!left.strict_equals(right))),
            BinaryOperator::LooseEq => Ok(JsValue::Bool(loose_equals(realm, left, right)?)),
            BinaryOperator::LooseNotEq => Ok(JsValue::Bool(!loose_equals(realm, left, right)?)),
        }
    }

    fn evaluate_assignment(
        &mut self,
        operator: AssignOperator,
        target: &Expression,
        value: &Expression,
    ) -> RuntimeResult<JsValue> {
        match target {
            Expression::Identifier(name) => {
                let mut result = self.evaluate(value)?;
                if let Some(binary) = operator.binary() {
                    let current = self.read_identifier(name)?;
                    result = self.apply_binary(binary, &current, &result)?;
                }
                self.write_identifier(name, result.clone())?;
                Ok(result)
            }
            Expression::Member { object, property } => {
                let base = self.evaluate(object)?;
                let key = self.member_key(property)?;
                let mut result = self.evaluate(value)?;
                if let Some(binary) = operator.binary() {
                    let current = self.get_member(&base, &key)?;
                    result = self.apply_binary(binary, &current, &result)?;
                }
                let JsValue::Object(handle) = base else {
                    return Err(RuntimeError::type_error(format!(
                        "Cannot set properties of {base} (setting '{key}')"
                    )));
                };
                self.realm.set(handle, key, result.clone())?;
                Ok(result)
            }
            _ => Err(RuntimeError::type_error("Invalid assignment target")),
        }
    }
}

/// Short rendering of a callee for error messages.
fn describe(expression: &Expression) -> String {
    match expression {
        Expression::Identifier(name) => name.clone(),
        Expression::This => "this".to_string(),
        Expression::Member { object, property } => match property {
            MemberProperty::Named(name) => format!("{}.{name}", describe(object)),
            MemberProperty::Computed(_) => format!("{}[...]", describe(object)),
        },
        Expression::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}
