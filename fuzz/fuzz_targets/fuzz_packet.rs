#![no_main]
use libfuzzer_sys::fuzz_target;

use amf_client::context::SerializationContext;

fuzz_target!(|data: &[u8]| {
    let _ = SerializationContext::default().packet_decoder().parse(data);
});
