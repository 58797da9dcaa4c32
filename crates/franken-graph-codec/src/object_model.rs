//! ES2020 object model the graph codec reads from and writes into.
//!
//! Key features:
//!
//! - **Property descriptors**: data vs accessor, configurable/enumerable/writable
//! - **Prototype chains**: `[[Prototype]]` internal slot with chain traversal
//! - **Ordered own properties**: `[[OwnPropertyKeys]]` yields integer keys
//!   ascending, then string keys and symbol keys in definition order
//! - **Object kinds**: ordinary, array exotic, function, class, native, opaque
//! - **Symbol keys**: property keys that are either strings or symbols
//!
//! Own properties live in an `IndexMap` so definition order survives; every
//! other map is a `BTreeMap` for deterministic iteration.
//! `#![forbid(unsafe_code)]`: no unsafe anywhere.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::FunctionNode;
use crate::payload::OpaqueData;

/// Property tables serialize as a list of `[key, descriptor]` pairs: JSON
/// object keys must be strings and `PropertyKey` may be a symbol.
mod properties_as_seq {
    use super::{IndexMap, PropertyDescriptor, PropertyKey};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        table: &IndexMap<PropertyKey, PropertyDescriptor>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(table)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<PropertyKey, PropertyDescriptor>, D::Error> {
        Vec::<(PropertyKey, PropertyDescriptor)>::deserialize(deserializer)
            .map(IndexMap::from_iter)
    }
}

// ---------------------------------------------------------------------------
// PropertyKey: string or symbol
// ---------------------------------------------------------------------------

/// Index into a realm's symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// Own-property key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    String(String),
    Symbol(SymbolId),
}

impl PropertyKey {
    /// The array index this key denotes, if it is a canonical index string
    /// (`"0"`, `"17"`, never `"01"`) below `2^32 - 1`.
    pub fn array_index(&self) -> Option<u32> {
        let Self::String(s) = self else {
            return None;
        };
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse::<u32>().ok().filter(|n| *n < u32::MAX)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<SymbolId> for PropertyKey {
    fn from(id: SymbolId) -> Self {
        Self::Symbol(id)
    }
}

// ---------------------------------------------------------------------------
// Well-known symbols
// ---------------------------------------------------------------------------

/// Well-known symbol indices (fixed allocation in the symbol registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WellKnownSymbol {
    Iterator,
    ToPrimitive,
    HasInstance,
    ToStringTag,
    Species,
    IsConcatSpreadable,
    Unscopables,
    AsyncIterator,
    Match,
    MatchAll,
    Replace,
    Search,
    Split,
}

impl WellKnownSymbol {
    pub const ALL: [Self; 13] = [
        Self::Iterator,
        Self::ToPrimitive,
        Self::HasInstance,
        Self::ToStringTag,
        Self::Species,
        Self::IsConcatSpreadable,
        Self::Unscopables,
        Self::AsyncIterator,
        Self::Match,
        Self::MatchAll,
        Self::Replace,
        Self::Search,
        Self::Split,
    ];

    /// Get the `SymbolId` for this well-known symbol.
    /// Well-known symbols occupy ids 1..=13.
    pub fn id(self) -> SymbolId {
        SymbolId(self as u32 + 1)
    }

    /// Get the property key for this well-known symbol.
    pub fn key(self) -> PropertyKey {
        PropertyKey::Symbol(self.id())
    }

    /// Stable name, also the symbol's description (e.g. `Symbol.iterator`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Iterator => "Symbol.iterator",
            Self::ToPrimitive => "Symbol.toPrimitive",
            Self::HasInstance => "Symbol.hasInstance",
            Self::ToStringTag => "Symbol.toStringTag",
            Self::Species => "Symbol.species",
            Self::IsConcatSpreadable => "Symbol.isConcatSpreadable",
            Self::Unscopables => "Symbol.unscopables",
            Self::AsyncIterator => "Symbol.asyncIterator",
            Self::Match => "Symbol.match",
            Self::MatchAll => "Symbol.matchAll",
            Self::Replace => "Symbol.replace",
            Self::Search => "Symbol.search",
            Self::Split => "Symbol.split",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sym| sym.name() == name)
    }

    pub fn from_id(id: SymbolId) -> Option<Self> {
        Self::ALL.into_iter().find(|sym| sym.id() == id)
    }
}

// ---------------------------------------------------------------------------
// ObjectHandle: typed reference to heap objects
// ---------------------------------------------------------------------------

/// Opaque handle referencing an object on the managed heap.
///
/// Handle equality is reference identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

// ---------------------------------------------------------------------------
// BigIntValue: arbitrary-precision integer
// ---------------------------------------------------------------------------

/// Arbitrary-precision integer kept as a canonical signed decimal string:
/// no leading zeros and no negative zero.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BigIntValue(String);

impl BigIntValue {
    /// Parse decimal digits with an optional leading `-`.
    pub fn parse(text: &str) -> Option<Self> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            return Some(Self("0".to_string()));
        }
        if negative {
            Some(Self(format!("-{trimmed}")))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn from_i128(value: i128) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BigIntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// JsValue: runtime value for the object model
// ---------------------------------------------------------------------------

/// Runtime value for the ES2020 object model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    BigInt(BigIntValue),
    Symbol(SymbolId),
    Object(ObjectHandle),
}

impl JsValue {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Self::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// `typeof`-style name; callable objects are reported by the realm.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::BigInt(_) => "bigint",
            Self::Symbol(_) => "symbol",
            Self::Object(_) => "object",
        }
    }

    /// ToBoolean (ES2020 §7.1.2).
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::BigInt(b) => b.as_str() != "0",
            Self::Symbol(_) | Self::Object(_) => true,
        }
    }

    /// SameValue comparison (ES2020 §7.2.10).
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
            }
            _ => self == other,
        }
    }

    /// Strict equality (`===`, ES2020 §7.2.15).
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Str(s) => write!(f, "{s}"),
            Self::BigInt(b) => write!(f, "{b}"),
            Self::Symbol(id) => write!(f, "Symbol({})", id.0),
            Self::Object(h) => write!(f, "[object#{}]", h.0),
        }
    }
}

/// Number-to-string in the shape scripts observe (`3`, not `3.0`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{n:.0}");
    }
    format!("{n}")
}

// ---------------------------------------------------------------------------
// PropertyDescriptor
// ---------------------------------------------------------------------------

/// ES2020 property descriptor (§6.2.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyDescriptor {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    /// Either half may be missing.
    Accessor {
        get: Option<ObjectHandle>,
        set: Option<ObjectHandle>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// What plain assignment creates: writable, enumerable, configurable.
    pub fn data(value: JsValue) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Shape of built-in methods: hidden from enumeration, otherwise open.
    pub fn data_hidden(value: JsValue) -> Self {
        Self::Data {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Read-only, hidden and permanent.
    pub fn data_frozen(value: JsValue) -> Self {
        Self::Data {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }

    pub fn is_configurable(&self) -> bool {
        let (Self::Data { configurable, .. } | Self::Accessor { configurable, .. }) = self;
        *configurable
    }

    pub fn is_enumerable(&self) -> bool {
        let (Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. }) = self;
        *enumerable
    }

    pub fn is_data(&self) -> bool {
        !self.is_accessor()
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    /// `[[Value]]` of a data descriptor.
    pub fn value(&self) -> Option<&JsValue> {
        if let Self::Data { value, .. } = self {
            Some(value)
        } else {
            None
        }
    }

    /// Accessors are never writable in the `[[Writable]]` sense.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Data { writable: true, .. })
    }

    pub fn set_non_configurable(&mut self) {
        let (Self::Data { configurable, .. } | Self::Accessor { configurable, .. }) = self;
        *configurable = false;
    }

    /// No-op for accessors.
    pub fn set_non_writable(&mut self) {
        if let Self::Data { writable, .. } = self {
            *writable = false;
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectError
// ---------------------------------------------------------------------------

/// Failure of a heap-level object operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectError {
    /// Surfaces as a TypeError in script code.
    TypeError(String),
    /// Dangling handle.
    ObjectNotFound(ObjectHandle),
    PrototypeCycleDetected,
    PrototypeChainTooDeep { depth: u32, max: u32 },
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeError(message) => write!(f, "TypeError: {message}"),
            Self::ObjectNotFound(handle) => write!(f, "no object#{} on this heap", handle.0),
            Self::PrototypeCycleDetected => f.write_str("TypeError: cyclic prototype value"),
            Self::PrototypeChainTooDeep { depth, max } => write!(
                f,
                "TypeError: prototype chain of {depth} links is longer than {max}"
            ),
        }
    }
}

impl std::error::Error for ObjectError {}

// ---------------------------------------------------------------------------
// Object kinds
// ---------------------------------------------------------------------------

/// Built-in behaviour implemented in Rust rather than script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NativeFunction {
    ObjectConstructor,
    BlobConstructor,
    ArrayPush,
    ArrayIteratorNext,
    MathMax,
    MathMin,
    MathAbs,
    ObjectKeys,
    BlobSize,
}

impl NativeFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::ObjectConstructor => "Object",
            Self::BlobConstructor => "Blob",
            Self::ArrayPush => "push",
            Self::ArrayIteratorNext => "next",
            Self::MathMax => "max",
            Self::MathMin => "min",
            Self::MathAbs => "abs",
            Self::ObjectKeys => "keys",
            Self::BlobSize => "get size",
        }
    }

    /// Declared parameter count (the function's `length`).
    pub fn arity(self) -> u32 {
        match self {
            Self::ArrayIteratorNext | Self::BlobSize => 0,
            Self::ObjectConstructor
            | Self::BlobConstructor
            | Self::ArrayPush
            | Self::MathAbs
            | Self::ObjectKeys => 1,
            Self::MathMax | Self::MathMin => 2,
        }
    }
}

/// Internal slots of a script function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionData {
    /// Verbatim source text; the only part of a function the codec keeps.
    pub source: String,
    pub node: FunctionNode,
    /// Bindings captured from the creating scope.
    pub captures: Vec<(String, JsValue)>,
}

/// Internal slots of a class constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassData {
    pub source: String,
    pub name: Option<String>,
    pub constructor: Option<FunctionNode>,
}

/// What an object is, beyond its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    Ordinary,
    /// Array exotic object: `length` tracks the highest index.
    Array,
    Function(FunctionData),
    Class(ClassData),
    Native(NativeFunction),
    /// Binary blob whose content is carried verbatim.
    Opaque(OpaqueData),
}

impl ObjectKind {
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Class(_) | Self::Native(_))
    }
}

/// May `next` replace `current`? Configurable properties accept anything;
/// a non-configurable one only accepts a descriptor that changes nothing
/// observable, except lowering `writable` or rewriting a writable value
/// (ES2020 §9.1.6.3).
fn permits_redefinition(current: &PropertyDescriptor, next: &PropertyDescriptor) -> bool {
    if current.is_configurable() {
        return true;
    }
    if next.is_configurable() || next.is_enumerable() != current.is_enumerable() {
        return false;
    }
    match (current, next) {
        (PropertyDescriptor::Data { writable: true, .. }, PropertyDescriptor::Data { .. }) => true,
        (
            PropertyDescriptor::Data {
                writable: false,
                value: old,
                ..
            },
            PropertyDescriptor::Data { writable, value, .. },
        ) => !writable && old.same_value(value),
        (
            PropertyDescriptor::Accessor {
                get: old_get,
                set: old_set,
                ..
            },
            PropertyDescriptor::Accessor { get, set, .. },
        ) => old_get == get && old_set == set,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// HeapObject: the core ES2020 object
// ---------------------------------------------------------------------------

/// Maximum prototype chain depth to prevent infinite loops.
const MAX_PROTOTYPE_CHAIN_DEPTH: u32 = 1024;

/// An ES2020 object with internal slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapObject {
    pub kind: ObjectKind,
    /// `[[Prototype]]` internal slot (None means end of chain).
    pub prototype: Option<ObjectHandle>,
    /// `[[Extensible]]` internal slot.
    pub extensible: bool,
    /// Own properties with descriptors, in definition order.
    #[serde(with = "properties_as_seq")]
    pub properties: IndexMap<PropertyKey, PropertyDescriptor>,
    /// Created by the realm itself; only intrinsics may be well-known.
    pub intrinsic: bool,
}

impl Default for HeapObject {
    fn default() -> Self {
        Self {
            kind: ObjectKind::Ordinary,
            prototype: None,
            extensible: true,
            properties: IndexMap::new(),
            intrinsic: false,
        }
    }
}

fn length_key() -> PropertyKey {
    PropertyKey::String("length".to_string())
}

impl HeapObject {
    /// Create a new object of `kind` with the given prototype.
    pub fn new(kind: ObjectKind, proto: Option<ObjectHandle>) -> Self {
        let mut object = Self {
            kind,
            prototype: proto,
            ..Self::default()
        };
        if matches!(object.kind, ObjectKind::Array) {
            object.properties.insert(
                length_key(),
                PropertyDescriptor::Data {
                    value: JsValue::Number(0.0),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        object
    }

    // -- [[GetOwnProperty]] (§9.1.1) ---------------------------------------

    /// `[[GetOwnProperty]](P)`: return the own property descriptor for `key`.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    /// `[[HasOwnProperty]](P)`: does this object have an own property `key`?
    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    // -- [[DefineOwnProperty]] (§9.1.6, §9.4.2.1) --------------------------

    /// `[[DefineOwnProperty]](P, Desc)`: define or update a property.
    ///
    /// Returns `Ok(true)` if the property was successfully defined,
    /// `Ok(false)` if rejected (non-configurable conflict), or
    /// `Err` for type errors.
    pub fn define_own_property(
        &mut self,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        if matches!(self.kind, ObjectKind::Array) {
            return self.define_array_property(key, desc);
        }
        Ok(self.define_ordinary_property(key, desc))
    }

    /// Ordinary define: an existing key keeps its position, a new key is
    /// appended unless the object is non-extensible.
    fn define_ordinary_property(&mut self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        match self.properties.get_mut(&key) {
            Some(current) if permits_redefinition(current, &desc) => {
                *current = desc;
                true
            }
            Some(_) => false,
            None if self.extensible => {
                self.properties.insert(key, desc);
                true
            }
            None => false,
        }
    }

    fn define_array_property(
        &mut self,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        if key == length_key() {
            let PropertyDescriptor::Data { value, .. } = &desc else {
                return Ok(false);
            };
            let new_len = value
                .as_number()
                .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
                .ok_or_else(|| ObjectError::TypeError("Invalid array length".to_string()))?
                as u32;
            let old_len = self.array_length();
            if !self.define_ordinary_property(key, desc) {
                return Ok(false);
            }
            if new_len < old_len {
                let doomed: Vec<PropertyKey> = self
                    .properties
                    .iter()
                    .filter(|(k, d)| {
                        d.is_configurable() && k.array_index().is_some_and(|i| i >= new_len)
                    })
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in doomed {
                    self.properties.shift_remove(&k);
                }
            }
            return Ok(true);
        }

        if let Some(index) = key.array_index() {
            let len = self.array_length();
            let length_writable = self
                .properties
                .get(&length_key())
                .is_some_and(PropertyDescriptor::is_writable);
            if index >= len && !length_writable {
                return Ok(false);
            }
            if !self.define_ordinary_property(key, desc) {
                return Ok(false);
            }
            if index >= len
                && let Some(PropertyDescriptor::Data { value, .. }) =
                    self.properties.get_mut(&length_key())
            {
                *value = JsValue::Number(f64::from(index) + 1.0);
            }
            return Ok(true);
        }

        Ok(self.define_ordinary_property(key, desc))
    }

    /// Current `length` of an array (0 for non-arrays).
    pub fn array_length(&self) -> u32 {
        self.properties
            .get(&length_key())
            .and_then(PropertyDescriptor::value)
            .and_then(JsValue::as_number)
            .filter(|_| matches!(self.kind, ObjectKind::Array))
            .map_or(0, |n| n as u32)
    }

    // -- [[Delete]] (§9.1.10) -----------------------------------------------

    /// `[[Delete]](P)`: `false` only for a non-configurable property.
    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        match self.properties.get(key) {
            Some(desc) if !desc.is_configurable() => false,
            Some(_) => {
                self.properties.shift_remove(key);
                true
            }
            None => true,
        }
    }

    // -- [[OwnPropertyKeys]] (§9.1.11) -------------------------------------

    /// `[[OwnPropertyKeys]]()`: array indices ascending, then the other
    /// string keys, then symbols, each group in definition order.
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<(u32, &PropertyKey)> = self
            .properties
            .keys()
            .filter_map(|key| key.array_index().map(|index| (index, key)))
            .collect();
        indices.sort_unstable_by_key(|(index, _)| *index);
        let names = self
            .properties
            .keys()
            .filter(|key| matches!(key, PropertyKey::String(_)) && key.array_index().is_none());
        let symbols = self
            .properties
            .keys()
            .filter(|key| matches!(key, PropertyKey::Symbol(_)));
        indices
            .into_iter()
            .map(|(_, key)| key)
            .chain(names)
            .chain(symbols)
            .cloned()
            .collect()
    }

    // -- [[PreventExtensions]] (§9.1.4) ------------------------------------

    /// `[[PreventExtensions]]()`: makes this object non-extensible.
    pub fn prevent_extensions(&mut self) {
        self.extensible = false;
    }

    // -- integrity levels (§7.3.14, §7.3.15) ----------------------------

    fn lock_down(&mut self, frozen: bool) {
        self.extensible = false;
        for desc in self.properties.values_mut() {
            desc.set_non_configurable();
            if frozen {
                desc.set_non_writable();
            }
        }
    }

    fn is_locked_down(&self, frozen: bool) -> bool {
        !self.extensible
            && self
                .properties
                .values()
                .all(|desc| !desc.is_configurable() && !(frozen && desc.is_writable()))
    }

    /// `Object.freeze`.
    pub fn freeze(&mut self) {
        self.lock_down(true);
    }

    /// `Object.seal`: like freeze, but writable properties stay writable.
    pub fn seal(&mut self) {
        self.lock_down(false);
    }

    pub fn is_frozen(&self) -> bool {
        self.is_locked_down(true)
    }

    pub fn is_sealed(&self) -> bool {
        self.is_locked_down(false)
    }
}

// ---------------------------------------------------------------------------
// ObjectHeap: the managed object store
// ---------------------------------------------------------------------------

/// The object heap: arena of objects addressed by handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectHeap {
    objects: Vec<HeapObject>,
}

impl ObjectHeap {
    /// Create a new empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new object of `kind` with the given prototype.
    pub fn alloc(&mut self, kind: ObjectKind, proto: Option<ObjectHandle>) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u32);
        self.objects.push(HeapObject::new(kind, proto));
        handle
    }

    /// Allocate a new ordinary object with no prototype.
    pub fn alloc_plain(&mut self) -> ObjectHandle {
        self.alloc(ObjectKind::Ordinary, None)
    }

    /// Get a reference to an object.
    pub fn get(&self, handle: ObjectHandle) -> Result<&HeapObject, ObjectError> {
        self.objects
            .get(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    /// Get a mutable reference to an object.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut HeapObject, ObjectError> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(ObjectError::ObjectNotFound(handle))
    }

    /// Number of objects allocated.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Is the heap empty?
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn kind(&self, handle: ObjectHandle) -> Result<&ObjectKind, ObjectError> {
        Ok(&self.get(handle)?.kind)
    }

    /// Allocate an object owned by the realm itself.
    pub fn alloc_intrinsic(
        &mut self,
        kind: ObjectKind,
        proto: Option<ObjectHandle>,
    ) -> ObjectHandle {
        let handle = self.alloc(kind, proto);
        if let Some(object) = self.objects.get_mut(handle.0 as usize) {
            object.intrinsic = true;
        }
        handle
    }

    /// Insert a property without `[[DefineOwnProperty]]` validation.
    ///
    /// Only for populating objects this heap just allocated.
    pub fn install(
        &mut self,
        handle: ObjectHandle,
        key: impl Into<PropertyKey>,
        desc: PropertyDescriptor,
    ) {
        if let Some(object) = self.objects.get_mut(handle.0 as usize) {
            object.properties.insert(key.into(), desc);
        }
    }

    pub fn is_intrinsic(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_ok_and(|o| o.intrinsic)
    }

    // -- High-level operations requiring heap access ------------------------

    /// Find the descriptor `key` resolves to, walking the prototype chain.
    ///
    /// Returns the descriptor together with the object that owns it.
    pub fn find_property(
        &self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<(ObjectHandle, PropertyDescriptor)>, ObjectError> {
        let mut seen = BTreeSet::new();
        let mut cursor = Some(handle);
        while let Some(current) = cursor {
            let depth = seen.len() as u32;
            if depth > MAX_PROTOTYPE_CHAIN_DEPTH {
                return Err(ObjectError::PrototypeChainTooDeep {
                    depth,
                    max: MAX_PROTOTYPE_CHAIN_DEPTH,
                });
            }
            if !seen.insert(current) {
                return Err(ObjectError::PrototypeCycleDetected);
            }
            let object = self.get(current)?;
            if let Some(desc) = object.properties.get(key) {
                return Ok(Some((current, desc.clone())));
            }
            cursor = object.prototype;
        }
        Ok(None)
    }

    /// `[[HasProperty]](O, P)`: check if property exists (walks prototype chain).
    pub fn has_property(
        &self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<bool, ObjectError> {
        Ok(self.find_property(handle, key)?.is_some())
    }

    /// `Object.getPrototypeOf(O)`.
    pub fn get_prototype_of(
        &self,
        handle: ObjectHandle,
    ) -> Result<Option<ObjectHandle>, ObjectError> {
        Ok(self.get(handle)?.prototype)
    }

    /// `Object.setPrototypeOf(O, proto)`.
    pub fn set_prototype_of(
        &mut self,
        handle: ObjectHandle,
        proto: Option<ObjectHandle>,
    ) -> Result<bool, ObjectError> {
        let mut ancestor = proto;
        let mut steps = 0;
        while let Some(current) = ancestor {
            if current == handle {
                return Err(ObjectError::PrototypeCycleDetected);
            }
            steps += 1;
            if steps > MAX_PROTOTYPE_CHAIN_DEPTH {
                return Err(ObjectError::PrototypeChainTooDeep {
                    depth: steps,
                    max: MAX_PROTOTYPE_CHAIN_DEPTH,
                });
            }
            ancestor = self.get(current)?.prototype;
        }

        let object = self.get_mut(handle)?;
        if !object.extensible {
            // A non-extensible object only accepts its current prototype.
            return Ok(object.prototype == proto);
        }
        object.prototype = proto;
        Ok(true)
    }

    /// `Object.isExtensible(O)`.
    pub fn is_extensible(&self, handle: ObjectHandle) -> Result<bool, ObjectError> {
        Ok(self.get(handle)?.extensible)
    }

    /// `Object.preventExtensions(O)`.
    pub fn prevent_extensions(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.get_mut(handle)?.prevent_extensions();
        Ok(())
    }

    /// `Object.defineProperty(O, P, Desc)`.
    pub fn define_property(
        &mut self,
        handle: ObjectHandle,
        key: PropertyKey,
        desc: PropertyDescriptor,
    ) -> Result<bool, ObjectError> {
        self.get_mut(handle)?.define_own_property(key, desc)
    }

    /// `Object.getOwnPropertyDescriptor(O, P)`.
    pub fn get_own_property_descriptor(
        &self,
        handle: ObjectHandle,
        key: &PropertyKey,
    ) -> Result<Option<PropertyDescriptor>, ObjectError> {
        Ok(self.get(handle)?.get_own_property(key).cloned())
    }

    /// `Reflect.ownKeys(O)`: every own key in ES2020 order.
    pub fn own_property_keys(&self, handle: ObjectHandle) -> Result<Vec<PropertyKey>, ObjectError> {
        Ok(self.get(handle)?.own_property_keys())
    }

    /// `Object.keys(O)`: enumerable own string keys.
    pub fn keys(&self, handle: ObjectHandle) -> Result<Vec<String>, ObjectError> {
        let o = self.get(handle)?;
        Ok(o.own_property_keys()
            .into_iter()
            .filter(|k| o.properties.get(k).is_some_and(|d| d.is_enumerable()))
            .filter_map(|k| match k {
                PropertyKey::String(s) => Some(s),
                PropertyKey::Symbol(_) => None,
            })
            .collect())
    }

    /// `Object.freeze(O)`.
    pub fn freeze(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.get_mut(handle)?.freeze();
        Ok(())
    }

    /// `Object.seal(O)`.
    pub fn seal(&mut self, handle: ObjectHandle) -> Result<(), ObjectError> {
        self.get_mut(handle)?.seal();
        Ok(())
    }

    /// `Array.prototype.push` for a single value; returns the new length.
    pub fn array_push(&mut self, handle: ObjectHandle, value: JsValue) -> Result<u32, ObjectError> {
        let obj = self.get_mut(handle)?;
        if !matches!(obj.kind, ObjectKind::Array) {
            return Err(ObjectError::TypeError(format!(
                "object#{} is not an array",
                handle.0
            )));
        }
        let len = obj.array_length();
        let key = PropertyKey::String(len.to_string());
        if !obj.define_own_property(key, PropertyDescriptor::data(value))? {
            return Err(ObjectError::TypeError(format!(
                "cannot add property {len}, object is not extensible"
            )));
        }
        Ok(obj.array_length())
    }
}

// ---------------------------------------------------------------------------
// SymbolRegistry: realm symbol table
// ---------------------------------------------------------------------------

/// What the realm knows about one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub description: Option<String>,
    /// Created through `Symbol.for()`.
    pub registered: bool,
}

/// Every symbol of a realm: well-known, `Symbol.for()` registered, and
/// plain `Symbol(description)` symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRegistry {
    symbols: BTreeMap<SymbolId, SymbolInfo>,
    /// Registry key -> SymbolId mapping for `Symbol.for()`.
    by_key: BTreeMap<String, SymbolId>,
    next_symbol: u32,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolRegistry {
    /// Create a new registry with well-known symbols pre-registered.
    pub fn new() -> Self {
        let mut symbols = BTreeMap::new();
        for sym in WellKnownSymbol::ALL {
            symbols.insert(
                sym.id(),
                SymbolInfo {
                    description: Some(sym.name().to_string()),
                    registered: false,
                },
            );
        }
        Self {
            symbols,
            by_key: BTreeMap::new(),
            // Well-known symbols occupy 1..=13.
            next_symbol: 14,
        }
    }

    /// `Symbol(description)`: a fresh, unregistered symbol.
    pub fn create(&mut self, description: Option<String>) -> SymbolId {
        let id = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        self.symbols.insert(
            id,
            SymbolInfo {
                description,
                registered: false,
            },
        );
        id
    }

    /// `Symbol.for(key)`: get or create a symbol for the given key.
    pub fn symbol_for(&mut self, key: &str) -> SymbolId {
        if let Some(&id) = self.by_key.get(key) {
            return id;
        }
        let id = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        self.symbols.insert(
            id,
            SymbolInfo {
                description: Some(key.to_string()),
                registered: true,
            },
        );
        self.by_key.insert(key.to_string(), id);
        id
    }

    /// `Symbol.keyFor(sym)`: the registry key of a `Symbol.for()` symbol.
    pub fn key_for(&self, sym: SymbolId) -> Option<&str> {
        self.symbols
            .get(&sym)
            .filter(|info| info.registered)
            .and_then(|info| info.description.as_deref())
    }

    /// `sym.description`.
    pub fn description(&self, sym: SymbolId) -> Option<&str> {
        self.symbols
            .get(&sym)
            .and_then(|info| info.description.as_deref())
    }

    pub fn info(&self, sym: SymbolId) -> Option<&SymbolInfo> {
        self.symbols.get(&sym)
    }

    pub fn contains(&self, sym: SymbolId) -> bool {
        self.symbols.contains_key(&sym)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- helpers --------------------------------------------------------

    fn str_key(s: &str) -> PropertyKey {
        PropertyKey::String(s.to_string())
    }

    fn num(n: f64) -> JsValue {
        JsValue::Number(n)
    }

    // -----------------------------------------------------------------------
    // 1. PropertyKey
    // -----------------------------------------------------------------------

    #[test]
    fn property_key_from_str() {
        let k: PropertyKey = "foo".into();
        assert_eq!(k, PropertyKey::String("foo".to_string()));
    }

    #[test]
    fn property_key_display() {
        assert_eq!(str_key("foo").to_string(), "foo");
        assert_eq!(PropertyKey::Symbol(SymbolId(42)).to_string(), "Symbol(42)");
    }

    #[test]
    fn array_index_accepts_only_canonical_indices() {
        assert_eq!(str_key("0").array_index(), Some(0));
        assert_eq!(str_key("17").array_index(), Some(17));
        assert_eq!(str_key("01").array_index(), None);
        assert_eq!(str_key("-1").array_index(), None);
        assert_eq!(str_key("1.5").array_index(), None);
        assert_eq!(str_key("4294967295").array_index(), None);
        assert_eq!(PropertyKey::Symbol(SymbolId(1)).array_index(), None);
    }

    // -----------------------------------------------------------------------
    // 2. Values
    // -----------------------------------------------------------------------

    #[test]
    fn same_value_distinguishes_zero_signs_and_equates_nan() {
        assert!(num(f64::NAN).same_value(&num(f64::NAN)));
        assert!(!num(0.0).same_value(&num(-0.0)));
        assert!(num(0.0).strict_equals(&num(-0.0)));
        assert!(!num(f64::NAN).strict_equals(&num(f64::NAN)));
    }

    #[test]
    fn format_number_matches_script_rendering() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn bigint_parse_canonicalizes() {
        assert_eq!(BigIntValue::parse("007").unwrap().as_str(), "7");
        assert_eq!(BigIntValue::parse("-000").unwrap().as_str(), "0");
        assert_eq!(
            BigIntValue::parse("-123456789012345678901234567890")
                .unwrap()
                .as_str(),
            "-123456789012345678901234567890"
        );
        assert!(BigIntValue::parse("").is_none());
        assert!(BigIntValue::parse("12a").is_none());
        assert!(BigIntValue::parse("-").is_none());
    }

    #[test]
    fn truthiness() {
        assert!(!JsValue::Undefined.is_truthy());
        assert!(!num(0.0).is_truthy());
        assert!(!num(f64::NAN).is_truthy());
        assert!(!JsValue::str("").is_truthy());
        assert!(JsValue::str("x").is_truthy());
        assert!(JsValue::Object(ObjectHandle(0)).is_truthy());
        assert!(!JsValue::BigInt(BigIntValue::from_i128(0)).is_truthy());
    }

    // -----------------------------------------------------------------------
    // 3. PropertyDescriptor basics
    // -----------------------------------------------------------------------

    #[test]
    fn data_descriptor_defaults() {
        let d = PropertyDescriptor::data(num(42.0));
        assert!(d.is_data());
        assert!(!d.is_accessor());
        assert!(d.is_configurable());
        assert!(d.is_enumerable());
        assert!(d.is_writable());
        assert_eq!(d.value(), Some(&num(42.0)));
    }

    #[test]
    fn data_descriptor_frozen() {
        let d = PropertyDescriptor::data_frozen(num(1.0));
        assert!(!d.is_configurable());
        assert!(!d.is_enumerable());
        assert!(!d.is_writable());
    }

    #[test]
    fn accessor_descriptor() {
        let d = PropertyDescriptor::Accessor {
            get: Some(ObjectHandle(1)),
            set: None,
            enumerable: true,
            configurable: true,
        };
        assert!(d.is_accessor());
        assert!(!d.is_writable());
        assert_eq!(d.value(), None);
    }

    // -----------------------------------------------------------------------
    // 4. HeapObject definition rules
    // -----------------------------------------------------------------------

    #[test]
    fn define_own_property_non_extensible_rejects() {
        let mut obj = HeapObject {
            extensible: false,
            ..Default::default()
        };
        let result = obj
            .define_own_property(str_key("x"), PropertyDescriptor::data(num(1.0)))
            .unwrap();
        assert!(!result);
    }

    #[test]
    fn define_own_property_non_configurable_rejects_value_change() {
        let mut obj = HeapObject::default();
        obj.define_own_property(str_key("x"), PropertyDescriptor::data_frozen(num(1.0)))
            .unwrap();
        let changed = obj
            .define_own_property(str_key("x"), PropertyDescriptor::data_frozen(num(2.0)))
            .unwrap();
        assert!(!changed);
        let same = obj
            .define_own_property(str_key("x"), PropertyDescriptor::data_frozen(num(1.0)))
            .unwrap();
        assert!(same);
    }

    #[test]
    fn redefinition_keeps_definition_order() {
        let mut obj = HeapObject::default();
        for k in ["b", "a", "c"] {
            obj.define_own_property(str_key(k), PropertyDescriptor::data(num(0.0)))
                .unwrap();
        }
        obj.define_own_property(str_key("b"), PropertyDescriptor::data(num(9.0)))
            .unwrap();
        assert_eq!(
            obj.own_property_keys(),
            vec![str_key("b"), str_key("a"), str_key("c")]
        );
    }

    #[test]
    fn own_keys_put_indices_first_and_symbols_last() {
        let mut obj = HeapObject::default();
        obj.define_own_property(
            PropertyKey::Symbol(SymbolId(20)),
            PropertyDescriptor::data(num(0.0)),
        )
        .unwrap();
        obj.define_own_property(str_key("z"), PropertyDescriptor::data(num(0.0)))
            .unwrap();
        obj.define_own_property(str_key("10"), PropertyDescriptor::data(num(0.0)))
            .unwrap();
        obj.define_own_property(str_key("2"), PropertyDescriptor::data(num(0.0)))
            .unwrap();
        assert_eq!(
            obj.own_property_keys(),
            vec![
                str_key("2"),
                str_key("10"),
                str_key("z"),
                PropertyKey::Symbol(SymbolId(20))
            ]
        );
    }

    #[test]
    fn delete_removes_configurable_only() {
        let mut obj = HeapObject::default();
        obj.define_own_property(str_key("a"), PropertyDescriptor::data(num(1.0)))
            .unwrap();
        obj.define_own_property(str_key("b"), PropertyDescriptor::data_frozen(num(1.0)))
            .unwrap();
        assert!(obj.delete(&str_key("a")));
        assert!(!obj.delete(&str_key("b")));
        assert!(obj.delete(&str_key("missing")));
    }

    #[test]
    fn freeze_and_seal() {
        let mut obj = HeapObject::default();
        obj.define_own_property(str_key("a"), PropertyDescriptor::data(num(1.0)))
            .unwrap();
        let mut sealed = obj.clone();
        sealed.seal();
        assert!(sealed.is_sealed());
        assert!(!sealed.is_frozen());
        obj.freeze();
        assert!(obj.is_frozen());
    }

    // -----------------------------------------------------------------------
    // 5. Array exotic behaviour
    // -----------------------------------------------------------------------

    #[test]
    fn array_length_tracks_highest_index() {
        let mut heap = ObjectHeap::new();
        let arr = heap.alloc(ObjectKind::Array, None);
        heap.define_property(arr, str_key("4"), PropertyDescriptor::data(num(1.0)))
            .unwrap();
        assert_eq!(heap.get(arr).unwrap().array_length(), 5);
        assert_eq!(heap.array_push(arr, num(2.0)).unwrap(), 6);
    }

    #[test]
    fn shrinking_length_truncates_elements() {
        let mut heap = ObjectHeap::new();
        let arr = heap.alloc(ObjectKind::Array, None);
        for n in 0..4 {
            heap.array_push(arr, num(f64::from(n))).unwrap();
        }
        let ok = heap
            .define_property(
                arr,
                str_key("length"),
                PropertyDescriptor::Data {
                    value: num(2.0),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            )
            .unwrap();
        assert!(ok);
        assert!(!heap.get(arr).unwrap().has_own_property(&str_key("3")));
        assert_eq!(heap.get(arr).unwrap().array_length(), 2);
    }

    #[test]
    fn invalid_array_length_is_type_error() {
        let mut heap = ObjectHeap::new();
        let arr = heap.alloc(ObjectKind::Array, None);
        let err = heap
            .define_property(
                arr,
                str_key("length"),
                PropertyDescriptor::Data {
                    value: num(1.5),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ObjectError::TypeError(_)));
    }

    #[test]
    fn largest_array_length_is_accepted() {
        let mut heap = ObjectHeap::new();
        let arr = heap.alloc(ObjectKind::Array, None);
        let length = |value: f64| PropertyDescriptor::Data {
            value: num(value),
            writable: true,
            enumerable: false,
            configurable: false,
        };
        assert!(heap
            .define_property(arr, str_key("length"), length(f64::from(u32::MAX)))
            .unwrap());
        assert_eq!(heap.get(arr).unwrap().array_length(), u32::MAX);

        let err = heap
            .define_property(arr, str_key("length"), length(f64::from(u32::MAX) + 1.0))
            .unwrap_err();
        assert!(matches!(err, ObjectError::TypeError(_)));
    }

    #[test]
    fn push_on_plain_object_is_type_error() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain();
        assert!(heap.array_push(obj, num(1.0)).is_err());
    }

    // -----------------------------------------------------------------------
    // 6. Heap prototype operations
    // -----------------------------------------------------------------------

    #[test]
    fn find_property_walks_chain() {
        let mut heap = ObjectHeap::new();
        let proto = heap.alloc_plain();
        let child = heap.alloc(ObjectKind::Ordinary, Some(proto));
        heap.define_property(proto, str_key("x"), PropertyDescriptor::data(num(7.0)))
            .unwrap();
        let (owner, desc) = heap.find_property(child, &str_key("x")).unwrap().unwrap();
        assert_eq!(owner, proto);
        assert_eq!(desc.value(), Some(&num(7.0)));
        assert!(heap.find_property(child, &str_key("y")).unwrap().is_none());
    }

    #[test]
    fn set_prototype_rejects_cycles() {
        let mut heap = ObjectHeap::new();
        let a = heap.alloc_plain();
        let b = heap.alloc(ObjectKind::Ordinary, Some(a));
        assert_eq!(
            heap.set_prototype_of(a, Some(b)).unwrap_err(),
            ObjectError::PrototypeCycleDetected
        );
    }

    #[test]
    fn non_extensible_prototype_is_fixed() {
        let mut heap = ObjectHeap::new();
        let a = heap.alloc_plain();
        let b = heap.alloc_plain();
        heap.prevent_extensions(a).unwrap();
        assert!(!heap.set_prototype_of(a, Some(b)).unwrap());
        assert!(heap.set_prototype_of(a, None).unwrap());
    }

    #[test]
    fn missing_handle_is_reported() {
        let heap = ObjectHeap::new();
        assert_eq!(
            heap.get(ObjectHandle(3)).unwrap_err(),
            ObjectError::ObjectNotFound(ObjectHandle(3))
        );
    }

    // -----------------------------------------------------------------------
    // 7. Symbols
    // -----------------------------------------------------------------------

    #[test]
    fn well_known_symbols_have_fixed_ids_and_names() {
        let reg = SymbolRegistry::new();
        for sym in WellKnownSymbol::ALL {
            assert_eq!(reg.description(sym.id()), Some(sym.name()));
            assert_eq!(WellKnownSymbol::from_name(sym.name()), Some(sym));
            assert_eq!(WellKnownSymbol::from_id(sym.id()), Some(sym));
        }
        assert_eq!(WellKnownSymbol::Iterator.id(), SymbolId(1));
        assert_eq!(WellKnownSymbol::Split.id(), SymbolId(13));
    }

    #[test]
    fn symbol_for_is_idempotent_and_key_for_only_sees_registered() {
        let mut reg = SymbolRegistry::new();
        let a = reg.symbol_for("app.key");
        let b = reg.symbol_for("app.key");
        assert_eq!(a, b);
        assert_eq!(reg.key_for(a), Some("app.key"));
        let plain = reg.create(Some("app.key".to_string()));
        assert_ne!(plain, a);
        assert_eq!(reg.key_for(plain), None);
        assert_eq!(reg.description(plain), Some("app.key"));
    }

    #[test]
    fn heap_serde_round_trip_keeps_property_order() {
        let mut heap = ObjectHeap::new();
        let obj = heap.alloc_plain();
        for k in ["z", "a"] {
            heap.define_property(obj, str_key(k), PropertyDescriptor::data(num(1.0)))
                .unwrap();
        }
        let json = serde_json::to_string(&heap).expect("serialize");
        let back: ObjectHeap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(
            back.own_property_keys(obj).unwrap(),
            vec![str_key("z"), str_key("a")]
        );
    }
}
