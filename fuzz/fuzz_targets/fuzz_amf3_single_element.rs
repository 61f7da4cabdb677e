//! Values as they appear in responses, with the flex decoders registered
#![no_main]
use libfuzzer_sys::fuzz_target;

use amf_client::amf3::read::AMF3Decoder;
use amf_client::extra::flex;

fuzz_target!(|data: &[u8]| {
    let mut decoder = AMF3Decoder::default();
    flex::read::register_decoders(&mut decoder.external_decoders);
    let _ = decoder.parse_single_element(data);
});
