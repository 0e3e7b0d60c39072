#![no_main]

//! Fuzzes the client-side frame decoder. Retargeted from the teacher's
//! fuzz target (which fuzzed server-side handshake acceptance, out of
//! scope for a client-only engine) to `codec::decode_frame`, the one
//! function that parses untrusted bytes straight off the wire in this
//! crate.

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use tokio::runtime::Runtime;
use ws_client_engine::codec::decode_frame;

fuzz_target!(|data: &[u8]| {
    let runtime = Runtime::new().unwrap();
    let mut cursor = Cursor::new(data.to_vec());
    runtime.block_on(async move {
        // Any outcome other than a panic/hang is fine: malformed input
        // should always come back as an `Err`, never a crash.
        let _ = decode_frame(&mut cursor, 16 << 20).await;
    });
});
