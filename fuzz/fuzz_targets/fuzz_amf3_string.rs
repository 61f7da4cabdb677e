#![no_main]
use libfuzzer_sys::fuzz_target;

use amf_client::amf3::read::AMF3Decoder;

fuzz_target!(|data: &[u8]| {
    let _ = AMF3Decoder::default().fuzz_parse_string(data);
});
