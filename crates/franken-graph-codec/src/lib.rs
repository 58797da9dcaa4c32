#![forbid(unsafe_code)]
//! Deep object-graph codec.
//!
//! Converts a runtime value (primitives, records, arrays, functions and
//! classes, symbol-keyed properties, cyclic and shared graphs) into portable
//! JSON text and rebuilds a structurally equivalent value from it. Shared
//! sub-objects decode to one object, accessors stay accessors, and
//! delegation links are reattached, including links to realm singletons.
//!
//! ```
//! use frankenengine_graph_codec::{JsValue, Realm, decode, encode};
//!
//! let mut realm = Realm::new();
//! let a = realm.create_object();
//! realm.set(a, "a".into(), JsValue::Object(a)).unwrap();
//!
//! let text = encode(&realm, &JsValue::Object(a)).unwrap();
//! let copy = decode(&mut realm, &text).unwrap().as_object().unwrap();
//! assert_eq!(realm.get(copy, &"a".into()).unwrap(), JsValue::Object(copy));
//! ```

pub mod ast;
pub mod callable;
pub mod classify;
pub mod codec;
mod decoder;
mod encoder;
pub mod envelope;
pub mod interpreter;
pub mod object_model;
pub mod parser;
pub mod payload;
pub mod realm;
pub mod well_known;

pub use classify::{ValueTag, classify};
pub use codec::{
    CodecConfig, CodecError, CodecEvent, CodecEventKind, CodecPhase, GraphCodec,
    UnnamedSymbolPolicy, decode, encode,
};
pub use envelope::Envelope;
pub use interpreter::{RuntimeError, RuntimeResult};
pub use object_model::{
    BigIntValue, JsValue, ObjectError, ObjectHandle, PropertyDescriptor, PropertyKey, SymbolId,
    WellKnownSymbol,
};
pub use payload::{InlineOnly, OpaqueData, PayloadError, PayloadReader};
pub use realm::{Realm, RealmConfig};
pub use well_known::WellKnownRegistry;
