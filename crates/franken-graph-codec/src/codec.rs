//! Codec facade: configuration, error taxonomy, structured events and the
//! `encode`/`decode` entry points.
//!
//! [`GraphCodec`] owns the event stream. Every call builds its identity and
//! symbol tables from scratch and drops them on return, so a failed call
//! leaves nothing behind except the events it already recorded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decoder;
use crate::encoder;
use crate::envelope::Envelope;
use crate::object_model::{JsValue, ObjectError};
use crate::payload::{InlineOnly, PayloadError, PayloadReader};
use crate::realm::Realm;

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CodecError {
    #[error("malformed envelope: {detail}")]
    MalformedEnvelope { detail: String },
    #[error("unknown type tag `{tag}`")]
    UnknownTypeTag { tag: String },
    #[error("unknown object kind `{kind}`")]
    UnknownObjectKind { kind: String },
    #[error("unresolvable symbolic key: {detail}")]
    UnresolvableSymbolicKey { detail: String },
    #[error("local index {index} is outside the identity table ({len} objects)")]
    DanglingReference { index: i64, len: usize },
    #[error("well-known index {index} does not exist in this realm")]
    UnknownWellKnownIndex { index: usize },
    #[error("object {object_index} has a symbol key without a description")]
    UnnamedSymbolKey { object_index: usize },
    #[error("object graph exceeds the limit of {limit} objects")]
    ObjectLimitExceeded { limit: usize },
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("object error: {0}")]
    Object(#[from] ObjectError),
}

impl CodecError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::UnknownTypeTag { .. } => "unknown_type_tag",
            Self::UnknownObjectKind { .. } => "unknown_object_kind",
            Self::UnresolvableSymbolicKey { .. } => "unresolvable_symbolic_key",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::UnknownWellKnownIndex { .. } => "unknown_well_known_index",
            Self::UnnamedSymbolKey { .. } => "unnamed_symbol_key",
            Self::ObjectLimitExceeded { .. } => "object_limit_exceeded",
            Self::Payload(_) => "payload_error",
            Self::Object(_) => "object_error",
        }
    }
}

// ---------------------------------------------------------------------------
// CodecConfig
// ---------------------------------------------------------------------------

/// What the encoder does with a symbol key that has no description and is
/// neither well-known nor registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnnamedSymbolPolicy {
    /// Drop the property silently.
    Drop,
    /// Drop the property and record a `SymbolKeyDropped` event.
    #[default]
    Warn,
    /// Fail the encode with `UnnamedSymbolKey`.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub unnamed_symbol_policy: UnnamedSymbolPolicy,
    /// Upper bound on identity-table entries per encode.
    pub max_objects: usize,
    /// Pretty-print the wire text.
    pub pretty: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            unnamed_symbol_policy: UnnamedSymbolPolicy::default(),
            max_objects: 1_000_000,
            pretty: false,
        }
    }
}

impl CodecConfig {
    /// Configuration that refuses to lose data silently.
    pub fn strict() -> Self {
        Self {
            unnamed_symbol_policy: UnnamedSymbolPolicy::Reject,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// CodecEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecPhase {
    Encode,
    Decode,
}

impl fmt::Display for CodecPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => f.write_str("encode"),
            Self::Decode => f.write_str("decode"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecEventKind {
    EncodeCompleted,
    DecodeCompleted,
    SymbolKeyDropped,
    RegistryAppended,
    PayloadExtracted,
    NonConfigurableSkipped,
    CallableUnparsable,
}

/// Structured event recorded by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecEvent {
    /// Monotonic per codec instance.
    pub sequence: u64,
    /// `encoder` or `decoder`.
    pub component: String,
    pub phase: CodecPhase,
    pub kind: CodecEventKind,
    /// Identity-table index the event concerns, if any.
    pub object_index: Option<usize>,
    pub detail: String,
}

/// Append-only event sink shared by the encoder and decoder.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog {
    pub(crate) events: Vec<CodecEvent>,
    next_sequence: u64,
}

impl EventLog {
    pub(crate) fn record(
        &mut self,
        phase: CodecPhase,
        kind: CodecEventKind,
        object_index: Option<usize>,
        detail: impl Into<String>,
    ) {
        let component = match phase {
            CodecPhase::Encode => "encoder",
            CodecPhase::Decode => "decoder",
        };
        self.events.push(CodecEvent {
            sequence: self.next_sequence,
            component: component.to_string(),
            phase,
            kind,
            object_index,
            detail: detail.into(),
        });
        self.next_sequence += 1;
    }
}

// ---------------------------------------------------------------------------
// GraphCodec
// ---------------------------------------------------------------------------

/// Deep object-graph codec bound to a configuration.
#[derive(Debug, Clone, Default)]
pub struct GraphCodec {
    config: CodecConfig,
    log: EventLog,
}

impl GraphCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            log: EventLog::default(),
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> &[CodecEvent] {
        &self.log.events
    }

    /// Take the recorded events. Sequence numbers keep counting.
    pub fn drain_events(&mut self) -> Vec<CodecEvent> {
        std::mem::take(&mut self.log.events)
    }

    /// Encode `value` to wire text. External blob payloads are unavailable.
    pub fn encode(&mut self, realm: &Realm, value: &JsValue) -> Result<String, CodecError> {
        self.encode_with_reader(realm, value, &mut InlineOnly)
    }

    /// Encode `value`, reading external blob payloads through `reader`.
    pub fn encode_with_reader(
        &mut self,
        realm: &Realm,
        value: &JsValue,
        reader: &mut dyn PayloadReader,
    ) -> Result<String, CodecError> {
        let envelope = self.encode_envelope(realm, value, reader)?;
        Ok(envelope.to_text(self.config.pretty))
    }

    pub fn encode_envelope(
        &mut self,
        realm: &Realm,
        value: &JsValue,
        reader: &mut dyn PayloadReader,
    ) -> Result<Envelope, CodecError> {
        encoder::encode_value(realm, value, &self.config, &mut self.log, reader)
    }

    /// Decode wire text into a value living in `realm`.
    pub fn decode(&mut self, realm: &mut Realm, text: &str) -> Result<JsValue, CodecError> {
        let envelope = Envelope::from_text(text)?;
        self.decode_envelope(realm, &envelope)
    }

    pub fn decode_envelope(
        &mut self,
        realm: &mut Realm,
        envelope: &Envelope,
    ) -> Result<JsValue, CodecError> {
        decoder::decode_envelope(realm, envelope, &mut self.log)
    }
}

/// Encode with the default configuration.
pub fn encode(realm: &Realm, value: &JsValue) -> Result<String, CodecError> {
    GraphCodec::default().encode(realm, value)
}

/// Decode with the default configuration.
pub fn decode(realm: &mut Realm, text: &str) -> Result<JsValue, CodecError> {
    GraphCodec::default().decode(realm, text)
}
