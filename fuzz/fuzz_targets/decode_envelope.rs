#![no_main]

use frankenengine_graph_codec::{GraphCodec, JsValue, Realm};
use libfuzzer_sys::fuzz_target;

const MAX_INPUT_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > MAX_INPUT_BYTES {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut realm = Realm::new();
    let mut codec = GraphCodec::default();
    let Ok(value) = codec.decode(&mut realm, text) else {
        return;
    };

    // Whatever decodes must encode again, and the second trip is stable.
    let encoded = match codec.encode(&realm, &value) {
        Ok(text) => text,
        Err(err) => panic!("re-encode of decoded value failed: {err}"),
    };
    if !matches!(value, JsValue::Object(_)) {
        let again = codec.decode(&mut realm, &encoded).ok();
        assert!(again.is_some(), "primitive failed to decode twice");
    }
});
