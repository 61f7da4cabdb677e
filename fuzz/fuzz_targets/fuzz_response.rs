//! Whole responses, as classified for the first call of a session
#![no_main]
use libfuzzer_sys::fuzz_target;

use amf_client::alias::TypeAliasRegistry;
use amf_client::client::envelope::{HttpResponseInfo, decode_response};
use amf_client::context::SerializationContext;

fuzz_target!(|data: &[u8]| {
    let _ = decode_response(
        data,
        "/1",
        HttpResponseInfo::new(200, "OK"),
        &SerializationContext::default(),
        Some(TypeAliasRegistry::global()),
    );
});
