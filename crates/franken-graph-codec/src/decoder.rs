//! Two-pass reconstruction.
//!
//! Pass 1 allocates one shell per identity-table entry so that every local
//! index resolves before any property is defined. Pass 2 wires properties
//! and delegation links in index order.

use serde_json::Value;

use crate::callable;
use crate::classify::ValueTag;
use crate::codec::{CodecError, CodecEventKind, CodecPhase, EventLog};
use crate::envelope::{
    ComplexPayload, Envelope, KeyRecord, NO_ACCESSOR, NonFiniteNumber, ObjectEntry, ObjectRecord,
    PropertyRecord, RecordKind, SymbolRef,
};
use crate::object_model::{
    BigIntValue, JsValue, ObjectHandle, ObjectKind, PropertyDescriptor, PropertyKey, SymbolId,
    WellKnownSymbol,
};
use crate::payload;
use crate::realm::Realm;

/// Rebuild the value an envelope describes inside `realm`.
pub(crate) fn decode_envelope(
    realm: &mut Realm,
    envelope: &Envelope,
    log: &mut EventLog,
) -> Result<JsValue, CodecError> {
    let value = match envelope {
        Envelope::JsonReady(value) => json_to_value(realm, value)?,
        Envelope::Complex(payload) => {
            let value = Reconstructor::new(realm, payload, log).run()?;
            log.record(
                CodecPhase::Decode,
                CodecEventKind::DecodeCompleted,
                None,
                format!(
                    "tag=complex objects={} symbols={}",
                    payload.objects.len(),
                    payload.symbols.len()
                ),
            );
            return Ok(value);
        }
        Envelope::BigInt(digits) => JsValue::BigInt(parse_big_int(digits)?),
        Envelope::Symbol(symbol) => JsValue::Symbol(resolve_root_symbol(realm, symbol)?),
        Envelope::Undefined => JsValue::Undefined,
        Envelope::WellKnown(index) => JsValue::Object(resolve_well_known(realm, *index)?),
        Envelope::NonFinite(n) => JsValue::Number(n.to_f64()),
    };
    log.record(
        CodecPhase::Decode,
        CodecEventKind::DecodeCompleted,
        None,
        format!("tag={} objects=0 symbols=0", envelope.tag()),
    );
    Ok(value)
}

fn malformed(detail: impl Into<String>) -> CodecError {
    CodecError::MalformedEnvelope {
        detail: detail.into(),
    }
}

fn parse_big_int(digits: &str) -> Result<BigIntValue, CodecError> {
    BigIntValue::parse(digits)
        .ok_or_else(|| malformed(format!("invalid big_int digits `{digits}`")))
}

fn resolve_well_known(realm: &Realm, index: usize) -> Result<ObjectHandle, CodecError> {
    realm
        .registry()
        .resolve(index)
        .ok_or(CodecError::UnknownWellKnownIndex { index })
}

fn well_known_symbol(name: &str) -> Result<SymbolId, CodecError> {
    WellKnownSymbol::from_name(name)
        .map(WellKnownSymbol::id)
        .ok_or_else(|| CodecError::UnresolvableSymbolicKey {
            detail: format!("`{name}` is not a well-known symbol"),
        })
}

fn resolve_root_symbol(realm: &mut Realm, symbol: &SymbolRef) -> Result<SymbolId, CodecError> {
    match symbol {
        SymbolRef::WellKnownSymbol(name) => well_known_symbol(name),
        SymbolRef::CustomSymbol(description) => Ok(realm.symbols_mut().create(description.clone())),
        SymbolRef::RegisteredSymbol(key) => Ok(realm.symbols_mut().symbol_for(key)),
    }
}

/// Build a value from plain JSON. Arrays and objects become fresh arrays
/// and ordinary objects.
fn json_to_value(realm: &mut Realm, value: &Value) -> Result<JsValue, CodecError> {
    Ok(match value {
        Value::Null => JsValue::Null,
        Value::Bool(b) => JsValue::Bool(*b),
        Value::Number(n) => JsValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => JsValue::Str(s.clone()),
        Value::Array(items) => {
            let proto = realm.intrinsics().array_prototype;
            let array = realm.heap_mut().alloc(ObjectKind::Array, Some(proto));
            for item in items {
                let item = json_to_value(realm, item)?;
                realm.heap_mut().array_push(array, item)?;
            }
            JsValue::Object(array)
        }
        Value::Object(fields) => {
            let object = realm.create_object();
            for (key, field) in fields {
                let field = json_to_value(realm, field)?;
                realm.heap_mut().define_property(
                    object,
                    PropertyKey::from(key.as_str()),
                    PropertyDescriptor::data(field),
                )?;
            }
            JsValue::Object(object)
        }
    })
}

// ---------------------------------------------------------------------------
// Reconstructor
// ---------------------------------------------------------------------------

struct Reconstructor<'a> {
    realm: &'a mut Realm,
    payload: &'a ComplexPayload,
    log: &'a mut EventLog,
    /// `None` marks a callable whose source could not be rebuilt.
    shells: Vec<Option<ObjectHandle>>,
    /// Fresh symbols, created on first use of each table index.
    symbols: Vec<Option<SymbolId>>,
}

impl<'a> Reconstructor<'a> {
    fn new(realm: &'a mut Realm, payload: &'a ComplexPayload, log: &'a mut EventLog) -> Self {
        Self {
            realm,
            payload,
            log,
            shells: Vec::with_capacity(payload.objects.len()),
            symbols: vec![None; payload.symbols.len()],
        }
    }

    fn run(mut self) -> Result<JsValue, CodecError> {
        let payload = self.payload;
        for (index, entry) in payload.objects.iter().enumerate() {
            let shell = match entry {
                ObjectEntry::WellKnown(registry_index) => {
                    Some(resolve_well_known(self.realm, *registry_index)?)
                }
                ObjectEntry::Record(record) => self.allocate(index, record)?,
            };
            self.shells.push(shell);
        }

        for (index, entry) in payload.objects.iter().enumerate() {
            let (ObjectEntry::Record(record), Some(Some(handle))) =
                (entry, self.shells.get(index).copied())
            else {
                continue;
            };
            self.wire(index, handle, record)?;
        }

        Ok(match self.shells.first().copied().flatten() {
            Some(root) => JsValue::Object(root),
            None => JsValue::Null,
        })
    }

    // -- pass 1 -----------------------------------------------------------

    fn allocate(
        &mut self,
        index: usize,
        record: &ObjectRecord,
    ) -> Result<Option<ObjectHandle>, CodecError> {
        let kind = match record.kind {
            RecordKind::Plain => ObjectKind::Ordinary,
            RecordKind::Array => ObjectKind::Array,
            RecordKind::Opaque => {
                let text = record.payload.as_deref().ok_or_else(|| {
                    malformed(format!("object {index}: opaque record without payload"))
                })?;
                ObjectKind::Opaque(payload::from_data_url(text)?)
            }
            RecordKind::Function | RecordKind::Class => {
                let source = record.payload.as_deref().ok_or_else(|| {
                    malformed(format!("object {index}: callable record without source"))
                })?;
                return match callable::reconstruct(self.realm, source) {
                    Ok(handle) => Ok(Some(handle)),
                    Err(err) => {
                        self.log.record(
                            CodecPhase::Decode,
                            CodecEventKind::CallableUnparsable,
                            Some(index),
                            err.to_string(),
                        );
                        Ok(None)
                    }
                };
            }
        };
        Ok(Some(self.realm.heap_mut().alloc(kind, None)))
    }

    // -- pass 2 -----------------------------------------------------------

    fn wire(
        &mut self,
        index: usize,
        handle: ObjectHandle,
        record: &ObjectRecord,
    ) -> Result<(), CodecError> {
        for property in &record.properties {
            let key = self.resolve_key(&property.key)?;
            let descriptor = self.descriptor(property)?;
            let detail = key.to_string();
            if !self.realm.heap_mut().define_property(handle, key, descriptor)? {
                self.log.record(
                    CodecPhase::Decode,
                    CodecEventKind::NonConfigurableSkipped,
                    Some(index),
                    detail,
                );
            }
        }

        let parent = match record.delegation {
            None => None,
            Some(link) if link.well_known => Some(resolve_well_known(self.realm, link.index)?),
            Some(link) => self.local(link.index as i64)?,
        };
        if !self.realm.heap_mut().set_prototype_of(handle, parent)? {
            return Err(malformed(format!("object {index}: delegation link rejected")));
        }
        if !record.extensible {
            self.realm.heap_mut().prevent_extensions(handle)?;
        }
        Ok(())
    }

    /// Shell at a local index; `None` for an unparsable callable.
    fn local(&self, index: i64) -> Result<Option<ObjectHandle>, CodecError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.shells.get(i).copied())
            .ok_or(CodecError::DanglingReference {
                index,
                len: self.payload.objects.len(),
            })
    }

    fn custom_symbol(&mut self, index: usize) -> Result<SymbolId, CodecError> {
        let Some(slot) = self.symbols.get(index).copied() else {
            return Err(CodecError::UnresolvableSymbolicKey {
                detail: format!(
                    "symbol table index {index} out of range ({} symbols)",
                    self.symbols.len()
                ),
            });
        };
        if let Some(id) = slot {
            return Ok(id);
        }
        let description = self.payload.symbols.get(index).cloned().flatten();
        let id = self.realm.symbols_mut().create(description);
        self.symbols[index] = Some(id);
        Ok(id)
    }

    fn resolve_symbol(&mut self, key: &KeyRecord) -> Result<SymbolId, CodecError> {
        match key {
            KeyRecord::WellKnownSymbol(name) => well_known_symbol(name),
            KeyRecord::CustomSymbol(index) => self.custom_symbol(*index),
            KeyRecord::RegisteredSymbol(key) => Ok(self.realm.symbols_mut().symbol_for(key)),
            KeyRecord::String(name) => Err(CodecError::UnresolvableSymbolicKey {
                detail: format!("string `{name}` used as a symbol value"),
            }),
        }
    }

    fn resolve_key(&mut self, key: &KeyRecord) -> Result<PropertyKey, CodecError> {
        match key {
            KeyRecord::String(name) => Ok(PropertyKey::String(name.clone())),
            symbolic => self.resolve_symbol(symbolic).map(PropertyKey::Symbol),
        }
    }

    fn accessor_slot(&self, index: i64) -> Result<Option<ObjectHandle>, CodecError> {
        if index == NO_ACCESSOR {
            return Ok(None);
        }
        self.local(index)
    }

    fn descriptor(&mut self, property: &PropertyRecord) -> Result<PropertyDescriptor, CodecError> {
        let record = &property.descriptor;
        if record.is_accessor() {
            return Ok(PropertyDescriptor::Accessor {
                get: self.accessor_slot(record.getter)?,
                set: self.accessor_slot(record.setter)?,
                enumerable: record.enumerable,
                configurable: record.configurable,
            });
        }
        Ok(PropertyDescriptor::Data {
            value: self.slot_value(property.value_type, &record.value)?,
            writable: record.writable,
            enumerable: record.enumerable,
            configurable: record.configurable,
        })
    }

    fn slot_value(&mut self, tag: ValueTag, value: &Value) -> Result<JsValue, CodecError> {
        let index_of = |value: &Value| {
            value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| malformed(format!("expected an index, found {value}")))
        };
        Ok(match tag {
            ValueTag::JsonReady => json_to_value(self.realm, value)?,
            ValueTag::Complex => {
                let index = value
                    .as_i64()
                    .ok_or_else(|| malformed(format!("expected a local index, found {value}")))?;
                self.local(index)?.map_or(JsValue::Null, JsValue::Object)
            }
            ValueTag::WellKnown => {
                JsValue::Object(resolve_well_known(self.realm, index_of(value)?)?)
            }
            ValueTag::BigInt => {
                let digits = value.as_str().ok_or_else(|| {
                    malformed(format!("big_int value must be a string, found {value}"))
                })?;
                JsValue::BigInt(parse_big_int(digits)?)
            }
            ValueTag::Symbol => {
                let key: KeyRecord = serde_json::from_value(value.clone())
                    .map_err(|err| malformed(format!("symbol value: {err}")))?;
                JsValue::Symbol(self.resolve_symbol(&key)?)
            }
            ValueTag::Undefined => JsValue::Undefined,
            ValueTag::NonFiniteNumber => {
                let n: NonFiniteNumber = serde_json::from_value(value.clone())
                    .map_err(|err| malformed(format!("non_finite value: {err}")))?;
                JsValue::Number(n.to_f64())
            }
        })
    }
}
