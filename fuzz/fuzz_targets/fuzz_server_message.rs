#![no_main]

use libfuzzer_sys::fuzz_target;
use reveri_client::protocol::ServerMessage;

fuzz_target!(|data: &[u8]| {
    // Inbound frames are text; anything else never reaches the decoder.
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(msg) = ServerMessage::decode(text) {
            let _ = msg.kind();
        }
    }
});
