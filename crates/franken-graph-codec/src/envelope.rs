//! Wire format: a JSON two-element array `[type_tag, payload]`.
//!
//! The `complex` payload carries the identity table (`objects`) and the
//! custom symbol table (`symbols`). Entries of `objects` are either an
//! object record or a bare integer naming a well-known registry index.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::classify::ValueTag;
use crate::codec::CodecError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// What a record's shell is built as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Plain,
    Array,
    Function,
    Class,
    Opaque,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Array => "array",
            Self::Function => "function",
            Self::Class => "class",
            Self::Opaque => "opaque",
        }
    }

    pub fn from_wire(kind: &str) -> Option<Self> {
        [
            Self::Plain,
            Self::Array,
            Self::Function,
            Self::Class,
            Self::Opaque,
        ]
        .into_iter()
        .find(|candidate| candidate.as_str() == kind)
    }
}

/// Delegation (prototype) link of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationLink {
    /// `true`: `index` is a registry index; `false`: a local table index.
    pub well_known: bool,
    pub index: usize,
}

/// Property key as written on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KeyRecord {
    String(String),
    /// Full name, e.g. `Symbol.iterator`.
    WellKnownSymbol(String),
    /// Index into the envelope's symbol table.
    CustomSymbol(usize),
    /// Key in the global symbol registry (`Symbol.for`).
    RegisteredSymbol(String),
}

/// Marks an absent getter or setter.
pub const NO_ACCESSOR: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub configurable: bool,
    pub enumerable: bool,
    pub writable: bool,
    /// Encoded according to the owning record's `value_type`.
    pub value: Value,
    pub getter: i64,
    pub setter: i64,
}

impl DescriptorRecord {
    pub fn is_accessor(&self) -> bool {
        self.getter != NO_ACCESSOR || self.setter != NO_ACCESSOR
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub key: KeyRecord,
    pub value_type: ValueTag,
    pub descriptor: DescriptorRecord,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub kind: RecordKind,
    /// Source text for callables, a `data:` URL for opaque objects.
    pub payload: Option<String>,
    /// `None` for a null prototype.
    pub delegation: Option<DelegationLink>,
    pub properties: Vec<PropertyRecord>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub extensible: bool,
}

/// One slot of the identity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectEntry {
    WellKnown(usize),
    Record(ObjectRecord),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplexPayload {
    pub objects: Vec<ObjectEntry>,
    /// Descriptions of the custom symbols, by table index.
    pub symbols: Vec<Option<String>>,
}

/// A symbol carried as the root value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SymbolRef {
    WellKnownSymbol(String),
    /// A fresh symbol with this description.
    CustomSymbol(Option<String>),
    RegisteredSymbol(String),
}

/// Numbers JSON cannot carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonFiniteNumber {
    #[serde(rename = "NaN")]
    NaN,
    #[serde(rename = "Infinity")]
    Infinity,
    #[serde(rename = "-Infinity")]
    NegativeInfinity,
    #[serde(rename = "-0")]
    NegativeZero,
}

impl NonFiniteNumber {
    pub fn from_f64(n: f64) -> Option<Self> {
        if n.is_nan() {
            Some(Self::NaN)
        } else if n == f64::INFINITY {
            Some(Self::Infinity)
        } else if n == f64::NEG_INFINITY {
            Some(Self::NegativeInfinity)
        } else if n == 0.0 && n.is_sign_negative() {
            Some(Self::NegativeZero)
        } else {
            None
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Self::NaN => f64::NAN,
            Self::Infinity => f64::INFINITY,
            Self::NegativeInfinity => f64::NEG_INFINITY,
            Self::NegativeZero => -0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// JSON form of a finite number; integral values are written without a
/// fraction.
pub fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A decoded `[type_tag, payload]` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    JsonReady(Value),
    Complex(ComplexPayload),
    BigInt(String),
    Symbol(SymbolRef),
    Undefined,
    WellKnown(usize),
    NonFinite(NonFiniteNumber),
}

impl Envelope {
    pub fn tag(&self) -> ValueTag {
        match self {
            Self::JsonReady(_) => ValueTag::JsonReady,
            Self::Complex(_) => ValueTag::Complex,
            Self::BigInt(_) => ValueTag::BigInt,
            Self::Symbol(_) => ValueTag::Symbol,
            Self::Undefined => ValueTag::Undefined,
            Self::WellKnown(_) => ValueTag::WellKnown,
            Self::NonFinite(_) => ValueTag::NonFiniteNumber,
        }
    }

    pub fn to_json(&self) -> Value {
        let payload = match self {
            Self::JsonReady(value) => value.clone(),
            Self::Complex(payload) => serde_json::to_value(payload).unwrap_or(Value::Null),
            Self::BigInt(digits) => Value::String(digits.clone()),
            Self::Symbol(symbol) => serde_json::to_value(symbol).unwrap_or(Value::Null),
            Self::Undefined => Value::Null,
            Self::WellKnown(index) => Value::from(*index),
            Self::NonFinite(n) => serde_json::to_value(n).unwrap_or(Value::Null),
        };
        Value::Array(vec![Value::String(self.tag().as_str().to_string()), payload])
    }

    /// Wire text, compact or pretty-printed.
    pub fn to_text(&self, pretty: bool) -> String {
        let value = self.to_json();
        if pretty {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        }
    }

    /// `sha256:<hex>` digest of the compact wire text.
    pub fn content_hash(&self) -> String {
        let digest = Sha256::digest(self.to_text(false).as_bytes());
        format!("sha256:{}", hex::encode(digest))
    }

    pub fn from_text(text: &str) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_str(text).map_err(|err| malformed(err.to_string()))?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> Result<Self, CodecError> {
        let Value::Array(mut pair) = value else {
            return Err(malformed("envelope must be a two-element array"));
        };
        if pair.len() != 2 {
            return Err(malformed(format!(
                "envelope must be a two-element array, found {} elements",
                pair.len()
            )));
        }
        let payload = pair.pop().unwrap_or(Value::Null);
        let Some(Value::String(tag)) = pair.pop() else {
            return Err(malformed("type tag must be a string"));
        };
        let tag = ValueTag::from_wire(&tag).ok_or(CodecError::UnknownTypeTag { tag })?;

        match tag {
            ValueTag::JsonReady => Ok(Self::JsonReady(payload)),
            ValueTag::Complex => parse_complex(payload).map(Self::Complex),
            ValueTag::BigInt => match payload {
                Value::String(digits) => Ok(Self::BigInt(digits)),
                other => Err(malformed(format!("big_int payload must be a string, found {other}"))),
            },
            ValueTag::Symbol => serde_json::from_value(payload)
                .map(Self::Symbol)
                .map_err(|err| malformed(format!("symbol payload: {err}"))),
            ValueTag::Undefined => Ok(Self::Undefined),
            ValueTag::WellKnown => index_from(&payload).map(Self::WellKnown).ok_or_else(|| {
                malformed(format!("well_known payload must be an index, found {payload}"))
            }),
            ValueTag::NonFiniteNumber => serde_json::from_value(payload)
                .map(Self::NonFinite)
                .map_err(|err| malformed(format!("non_finite payload: {err}"))),
        }
    }
}

fn malformed(detail: impl Into<String>) -> CodecError {
    CodecError::MalformedEnvelope {
        detail: detail.into(),
    }
}

fn index_from(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}

/// Parse a `complex` payload entry by entry so an unknown record kind is
/// reported as such rather than as a generic shape error.
fn parse_complex(payload: Value) -> Result<ComplexPayload, CodecError> {
    let Value::Object(mut fields) = payload else {
        return Err(malformed("complex payload must be an object"));
    };
    let Some(Value::Array(entries)) = fields.remove("objects") else {
        return Err(malformed("complex payload needs an `objects` array"));
    };
    let symbols = match fields.remove("symbols") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value)
            .map_err(|err| malformed(format!("symbol table: {err}")))?,
    };
    if entries.is_empty() {
        return Err(malformed("identity table is empty"));
    }

    let mut objects = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        if entry.is_number() {
            let index = index_from(&entry).ok_or_else(|| {
                malformed(format!("object {position}: registry index must be a non-negative integer"))
            })?;
            objects.push(ObjectEntry::WellKnown(index));
            continue;
        }
        if let Some(kind) = entry.get("kind").and_then(Value::as_str)
            && RecordKind::from_wire(kind).is_none()
        {
            return Err(CodecError::UnknownObjectKind {
                kind: kind.to_string(),
            });
        }
        let record: ObjectRecord = serde_json::from_value(entry)
            .map_err(|err| malformed(format!("object {position}: {err}")))?;
        objects.push(ObjectEntry::Record(record));
    }
    Ok(ComplexPayload { objects, symbols })
}
