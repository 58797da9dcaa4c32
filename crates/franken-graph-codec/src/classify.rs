//! Value classification: which wire tag a value travels under.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::object_model::JsValue;
use crate::realm::Realm;

/// Encoding strategy for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTag {
    /// `null`, strings, booleans and finite numbers other than `-0`.
    JsonReady,
    /// Objects that are not well-known: deep-copied through the walker.
    Complex,
    BigInt,
    Symbol,
    Undefined,
    /// Registry objects, encoded by index.
    WellKnown,
    /// `NaN`, `Infinity`, `-Infinity` and `-0`.
    #[serde(rename = "non_finite")]
    NonFiniteNumber,
}

impl ValueTag {
    pub const ALL: [Self; 7] = [
        Self::JsonReady,
        Self::Complex,
        Self::BigInt,
        Self::Symbol,
        Self::Undefined,
        Self::WellKnown,
        Self::NonFiniteNumber,
    ];

    /// Wire spelling of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonReady => "json_ready",
            Self::Complex => "complex",
            Self::BigInt => "big_int",
            Self::Symbol => "symbol",
            Self::Undefined => "undefined",
            Self::WellKnown => "well_known",
            Self::NonFiniteNumber => "non_finite",
        }
    }

    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == tag)
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Does this number survive a trip through JSON unchanged?
pub fn is_json_number(n: f64) -> bool {
    n.is_finite() && !(n == 0.0 && n.is_sign_negative())
}

/// Classify `value`. Total and side-effect free: unindexed intrinsics are
/// reported as `Complex` here; the encoder decides whether to append them.
pub fn classify(realm: &Realm, value: &JsValue) -> ValueTag {
    match value {
        JsValue::Null | JsValue::Bool(_) | JsValue::Str(_) => ValueTag::JsonReady,
        JsValue::Number(n) if is_json_number(*n) => ValueTag::JsonReady,
        JsValue::Number(_) => ValueTag::NonFiniteNumber,
        JsValue::BigInt(_) => ValueTag::BigInt,
        JsValue::Symbol(_) => ValueTag::Symbol,
        JsValue::Undefined => ValueTag::Undefined,
        JsValue::Object(handle) => {
            if realm.registry().find_index(*handle).is_some() {
                ValueTag::WellKnown
            } else {
                ValueTag::Complex
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_model::{BigIntValue, SymbolId};

    #[test]
    fn primitives() {
        let realm = Realm::new();
        let cases = [
            (JsValue::Null, ValueTag::JsonReady),
            (JsValue::Bool(false), ValueTag::JsonReady),
            (JsValue::str("hi"), ValueTag::JsonReady),
            (JsValue::Number(1.5), ValueTag::JsonReady),
            (JsValue::Number(0.0), ValueTag::JsonReady),
            (JsValue::Number(-0.0), ValueTag::NonFiniteNumber),
            (JsValue::Number(f64::NAN), ValueTag::NonFiniteNumber),
            (JsValue::Number(f64::NEG_INFINITY), ValueTag::NonFiniteNumber),
            (JsValue::BigInt(BigIntValue::from_i128(7)), ValueTag::BigInt),
            (JsValue::Symbol(SymbolId(1)), ValueTag::Symbol),
            (JsValue::Undefined, ValueTag::Undefined),
        ];
        for (value, expected) in cases {
            assert_eq!(classify(&realm, &value), expected, "{value:?}");
        }
    }

    #[test]
    fn objects_split_on_registry_membership() {
        let mut realm = Realm::new();
        let plain = realm.create_object();
        let global = realm.global();
        let hidden = realm.intrinsics().array_iterator_prototype;
        assert_eq!(classify(&realm, &JsValue::Object(plain)), ValueTag::Complex);
        assert_eq!(classify(&realm, &JsValue::Object(global)), ValueTag::WellKnown);
        assert_eq!(classify(&realm, &JsValue::Object(hidden)), ValueTag::Complex);
    }

    #[test]
    fn wire_names_are_stable() {
        for tag in ValueTag::ALL {
            assert_eq!(ValueTag::from_wire(tag.as_str()), Some(tag));
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{tag}\""));
        }
        assert_eq!(ValueTag::from_wire("date"), None);
    }
}
