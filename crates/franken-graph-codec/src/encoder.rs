//! Graph walker.
//!
//! The identity table is a worklist iterated by position: index 0 is the
//! root, and every object discovered while encoding entry `i` is appended
//! and encoded when the cursor reaches it. Lookup is by handle, so shared
//! references and cycles both collapse onto one table slot.

use std::collections::HashMap;

use serde_json::Value;

use crate::callable::encode_callable;
use crate::classify::{ValueTag, classify};
use crate::codec::{
    CodecConfig, CodecError, CodecEventKind, CodecPhase, EventLog, UnnamedSymbolPolicy,
};
use crate::envelope::{
    ComplexPayload, DelegationLink, DescriptorRecord, Envelope, KeyRecord, NO_ACCESSOR,
    NonFiniteNumber, ObjectEntry, ObjectRecord, PropertyRecord, RecordKind, SymbolRef,
    number_to_json,
};
use crate::object_model::{
    JsValue, ObjectHandle, ObjectKind, PropertyDescriptor, PropertyKey, SymbolId, WellKnownSymbol,
};
use crate::payload::{self, PayloadReader};
use crate::realm::Realm;

/// Encode `value` into an envelope.
pub(crate) fn encode_value(
    realm: &Realm,
    value: &JsValue,
    config: &CodecConfig,
    log: &mut EventLog,
    reader: &mut dyn PayloadReader,
) -> Result<Envelope, CodecError> {
    let mut walker = GraphWalker {
        realm,
        config,
        log,
        reader,
        table: Vec::new(),
        index_of: HashMap::new(),
        symbols: Vec::new(),
        symbol_index: HashMap::new(),
    };
    let envelope = walker.encode_root(value)?;
    let (objects, symbols) = match &envelope {
        Envelope::Complex(payload) => (payload.objects.len(), payload.symbols.len()),
        _ => (0, 0),
    };
    walker.log.record(
        CodecPhase::Encode,
        CodecEventKind::EncodeCompleted,
        None,
        format!("tag={} objects={objects} symbols={symbols}", envelope.tag()),
    );
    Ok(envelope)
}

struct GraphWalker<'a> {
    realm: &'a Realm,
    config: &'a CodecConfig,
    log: &'a mut EventLog,
    reader: &'a mut dyn PayloadReader,
    table: Vec<ObjectHandle>,
    index_of: HashMap<ObjectHandle, usize>,
    symbols: Vec<Option<String>>,
    symbol_index: HashMap<SymbolId, usize>,
}

impl GraphWalker<'_> {
    fn encode_root(&mut self, value: &JsValue) -> Result<Envelope, CodecError> {
        Ok(match self.classified(value) {
            Classified::JsonReady(json) => Envelope::JsonReady(json),
            Classified::NonFinite(tag) => Envelope::NonFinite(tag),
            Classified::BigInt(digits) => Envelope::BigInt(digits.to_string()),
            Classified::Symbol(id) => Envelope::Symbol(self.root_symbol(id)),
            Classified::Undefined => Envelope::Undefined,
            Classified::WellKnown(index) => Envelope::WellKnown(index),
            Classified::Complex(handle) => Envelope::Complex(self.encode_graph(handle)?),
        })
    }

    /// Run the classifier and gather what the tag needs on the wire. A
    /// `Complex` object that turns out to be an unindexed intrinsic is
    /// appended to the registry and travels as well-known.
    fn classified<'v>(&mut self, value: &'v JsValue) -> Classified<'v> {
        match (classify(self.realm, value), value) {
            (ValueTag::WellKnown | ValueTag::Complex, JsValue::Object(handle)) => {
                match self.well_known_index(*handle) {
                    Some(index) => Classified::WellKnown(index),
                    None => Classified::Complex(*handle),
                }
            }
            (ValueTag::JsonReady, value) => Classified::JsonReady(json_ready(value)),
            (ValueTag::NonFiniteNumber, JsValue::Number(n)) => Classified::NonFinite(
                NonFiniteNumber::from_f64(*n).unwrap_or(NonFiniteNumber::NaN),
            ),
            (ValueTag::BigInt, JsValue::BigInt(n)) => Classified::BigInt(n.as_str()),
            (ValueTag::Symbol, JsValue::Symbol(id)) => Classified::Symbol(*id),
            _ => Classified::Undefined,
        }
    }

    fn root_symbol(&self, id: SymbolId) -> SymbolRef {
        if let Some(known) = WellKnownSymbol::from_id(id) {
            return SymbolRef::WellKnownSymbol(known.name().to_string());
        }
        let symbols = self.realm.symbols();
        match symbols.key_for(id) {
            Some(key) => SymbolRef::RegisteredSymbol(key.to_string()),
            None => SymbolRef::CustomSymbol(symbols.description(id).map(str::to_string)),
        }
    }

    // -- identity ---------------------------------------------------------

    /// Registry index of `handle`. Intrinsics the registry has not indexed
    /// yet are appended on first sight.
    fn well_known_index(&mut self, handle: ObjectHandle) -> Option<usize> {
        if let Some(index) = self.realm.registry().find_index(handle) {
            return Some(index);
        }
        if !self.realm.heap().is_intrinsic(handle) {
            return None;
        }
        let index = self.realm.registry().register(handle);
        self.log.record(
            CodecPhase::Encode,
            CodecEventKind::RegistryAppended,
            None,
            format!("object#{} registered at {index}", handle.0),
        );
        Some(index)
    }

    /// Local table index of `handle`, appending it if new.
    fn local_index(&mut self, handle: ObjectHandle) -> Result<usize, CodecError> {
        if let Some(&index) = self.index_of.get(&handle) {
            return Ok(index);
        }
        if self.table.len() >= self.config.max_objects {
            return Err(CodecError::ObjectLimitExceeded {
                limit: self.config.max_objects,
            });
        }
        let index = self.table.len();
        self.table.push(handle);
        self.index_of.insert(handle, index);
        Ok(index)
    }

    fn symbol_slot(&mut self, id: SymbolId) -> usize {
        if let Some(&index) = self.symbol_index.get(&id) {
            return index;
        }
        let index = self.symbols.len();
        self.symbols
            .push(self.realm.symbols().description(id).map(str::to_string));
        self.symbol_index.insert(id, index);
        index
    }

    // -- walk -------------------------------------------------------------

    fn encode_graph(&mut self, root: ObjectHandle) -> Result<ComplexPayload, CodecError> {
        self.local_index(root)?;
        let mut objects = Vec::new();
        let mut cursor = 0;
        while let Some(&handle) = self.table.get(cursor) {
            // Only accessor slots can put a well-known object here.
            let entry = match self.well_known_index(handle) {
                Some(index) => ObjectEntry::WellKnown(index),
                None => ObjectEntry::Record(self.encode_record(cursor, handle)?),
            };
            objects.push(entry);
            cursor += 1;
        }
        Ok(ComplexPayload {
            objects,
            symbols: std::mem::take(&mut self.symbols),
        })
    }

    fn encode_record(
        &mut self,
        position: usize,
        handle: ObjectHandle,
    ) -> Result<ObjectRecord, CodecError> {
        let realm = self.realm;
        let object = realm.heap().get(handle)?;

        let (kind, payload) = match &object.kind {
            ObjectKind::Ordinary => (RecordKind::Plain, None),
            ObjectKind::Array => (RecordKind::Array, None),
            ObjectKind::Function(_) => (
                RecordKind::Function,
                encode_callable(&object.kind).map(str::to_string),
            ),
            ObjectKind::Class(_) => (
                RecordKind::Class,
                encode_callable(&object.kind).map(str::to_string),
            ),
            // Natives are intrinsics and never reach here through the
            // registry path; an unregistered one decodes as unparsable.
            ObjectKind::Native(native) => (
                RecordKind::Function,
                Some(format!("function {}() {{ [native code] }}", native.name())),
            ),
            ObjectKind::Opaque(data) => {
                let bytes = payload::extract(data, &mut *self.reader)?;
                self.log.record(
                    CodecPhase::Encode,
                    CodecEventKind::PayloadExtracted,
                    Some(position),
                    format!("{} bytes of {}", bytes.len(), data.media_type),
                );
                (
                    RecordKind::Opaque,
                    Some(payload::to_data_url(&data.media_type, &bytes)),
                )
            }
        };

        let delegation = match object.prototype {
            None => None,
            Some(parent) => Some(match self.well_known_index(parent) {
                Some(index) => DelegationLink {
                    well_known: true,
                    index,
                },
                None => DelegationLink {
                    well_known: false,
                    index: self.local_index(parent)?,
                },
            }),
        };

        let mut properties = Vec::new();
        for key in object.own_property_keys() {
            let Some(descriptor) = object.get_own_property(&key) else {
                continue;
            };
            let Some(key) = self.key_record(position, &key)? else {
                continue;
            };
            properties.push(self.property_record(key, descriptor)?);
        }

        Ok(ObjectRecord {
            kind,
            payload,
            delegation,
            properties,
            extensible: object.extensible,
        })
    }

    /// Wire form of an own key; `None` when the key is dropped by policy.
    fn key_record(
        &mut self,
        position: usize,
        key: &PropertyKey,
    ) -> Result<Option<KeyRecord>, CodecError> {
        let id = match key {
            PropertyKey::String(name) => return Ok(Some(KeyRecord::String(name.clone()))),
            PropertyKey::Symbol(id) => *id,
        };
        let realm = self.realm;
        let named = WellKnownSymbol::from_id(id).is_some()
            || realm.symbols().key_for(id).is_some()
            || realm.symbols().description(id).is_some();
        if named {
            return Ok(Some(self.symbol_record(id)));
        }
        match self.config.unnamed_symbol_policy {
            UnnamedSymbolPolicy::Drop => Ok(None),
            UnnamedSymbolPolicy::Warn => {
                self.log.record(
                    CodecPhase::Encode,
                    CodecEventKind::SymbolKeyDropped,
                    Some(position),
                    format!("symbol#{} has no description", id.0),
                );
                Ok(None)
            }
            UnnamedSymbolPolicy::Reject => Err(CodecError::UnnamedSymbolKey {
                object_index: position,
            }),
        }
    }

    /// Reference to a symbol inside the graph, as key or as value.
    fn symbol_record(&mut self, id: SymbolId) -> KeyRecord {
        if let Some(known) = WellKnownSymbol::from_id(id) {
            return KeyRecord::WellKnownSymbol(known.name().to_string());
        }
        if let Some(key) = self.realm.symbols().key_for(id) {
            return KeyRecord::RegisteredSymbol(key.to_string());
        }
        KeyRecord::CustomSymbol(self.symbol_slot(id))
    }

    fn property_record(
        &mut self,
        key: KeyRecord,
        descriptor: &PropertyDescriptor,
    ) -> Result<PropertyRecord, CodecError> {
        match descriptor {
            PropertyDescriptor::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => {
                let (value_type, value) = self.encode_slot(value)?;
                Ok(PropertyRecord {
                    key,
                    value_type,
                    descriptor: DescriptorRecord {
                        configurable: *configurable,
                        enumerable: *enumerable,
                        writable: *writable,
                        value,
                        getter: NO_ACCESSOR,
                        setter: NO_ACCESSOR,
                    },
                })
            }
            PropertyDescriptor::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => {
                let getter = match get {
                    Some(handle) => self.local_index(*handle)? as i64,
                    None => NO_ACCESSOR,
                };
                let setter = match set {
                    Some(handle) => self.local_index(*handle)? as i64,
                    None => NO_ACCESSOR,
                };
                Ok(PropertyRecord {
                    key,
                    value_type: ValueTag::Undefined,
                    descriptor: DescriptorRecord {
                        configurable: *configurable,
                        enumerable: *enumerable,
                        writable: false,
                        value: Value::Null,
                        getter,
                        setter,
                    },
                })
            }
        }
    }

    /// Inline encoding of a data property value.
    fn encode_slot(&mut self, value: &JsValue) -> Result<(ValueTag, Value), CodecError> {
        Ok(match self.classified(value) {
            Classified::JsonReady(json) => (ValueTag::JsonReady, json),
            Classified::NonFinite(tag) => (
                ValueTag::NonFiniteNumber,
                serde_json::to_value(tag).unwrap_or(Value::Null),
            ),
            Classified::BigInt(digits) => (ValueTag::BigInt, Value::String(digits.to_string())),
            Classified::Symbol(id) => {
                let record = self.symbol_record(id);
                (
                    ValueTag::Symbol,
                    serde_json::to_value(record).unwrap_or(Value::Null),
                )
            }
            Classified::Undefined => (ValueTag::Undefined, Value::Null),
            Classified::WellKnown(index) => (ValueTag::WellKnown, Value::from(index)),
            Classified::Complex(handle) => {
                (ValueTag::Complex, Value::from(self.local_index(handle)?))
            }
        })
    }
}

/// A value with its classifier tag resolved to what the wire carries.
enum Classified<'v> {
    JsonReady(Value),
    NonFinite(NonFiniteNumber),
    BigInt(&'v str),
    Symbol(SymbolId),
    Undefined,
    WellKnown(usize),
    Complex(ObjectHandle),
}

fn json_ready(value: &JsValue) -> Value {
    match value {
        JsValue::Bool(b) => Value::Bool(*b),
        JsValue::Str(s) => Value::String(s.clone()),
        JsValue::Number(n) => number_to_json(*n),
        _ => Value::Null,
    }
}
