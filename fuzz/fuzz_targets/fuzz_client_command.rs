#![no_main]

use libfuzzer_sys::fuzz_target;
use reveri_client::protocol::ClientCommand;

fuzz_target!(|data: &[u8]| {
    // Anything that parses as a command must encode back without error.
    if let Ok(command) = serde_json::from_slice::<ClientCommand>(data) {
        let encoded = command.encode().expect("decoded command must encode");
        let again: ClientCommand = serde_json::from_str(&encoded).expect("encoded command must parse");
        assert_eq!(command, again);
    }
});
