#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // A ClientMessage parsed from arbitrary bytes must re-encode cleanly:
    // anything we can deserialize, we can put back on the wire.
    if let Ok(msg) = serde_json::from_slice::<saladbowl_client::protocol::ClientMessage>(data) {
        let _ = saladbowl_client::protocol::encode(&msg);
    }
});
