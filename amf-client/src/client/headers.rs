//! Headers sent with every call of a session
use crate::packet::Header;
use crate::types::Value;
use std::rc::Rc;

/// The AMF headers and HTTP request headers of a session
///
/// Names are unique within each set, adding a name again replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct HeaderRegistry {
    amf_headers: Vec<Header>,
    http_headers: Vec<(String, String)>,
}

impl HeaderRegistry {
    /// Add an AMF header the broker may ignore
    pub fn add_amf_header(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.add_amf_header_with(name, false, value);
    }

    /// Add an AMF header
    pub fn add_amf_header_with(
        &mut self,
        name: impl Into<String>,
        must_understand: bool,
        value: impl Into<Value>,
    ) {
        self.insert_amf_header(Header {
            name: name.into(),
            must_understand,
            value: Rc::new(value.into()),
        });
    }

    pub(crate) fn insert_amf_header(&mut self, header: Header) {
        match self.amf_headers.iter_mut().find(|h| h.name == header.name) {
            Some(existing) => *existing = header,
            None => self.amf_headers.push(header),
        }
    }

    /// Remove an AMF header, returns whether it existed
    pub fn remove_amf_header(&mut self, name: &str) -> bool {
        let before = self.amf_headers.len();
        self.amf_headers.retain(|h| h.name != name);
        self.amf_headers.len() != before
    }

    /// Remove every AMF header
    pub fn remove_all_amf_headers(&mut self) {
        self.amf_headers.clear();
    }

    /// The AMF headers, in the order they were first added
    pub fn amf_headers(&self) -> &[Header] {
        &self.amf_headers
    }

    /// Add an HTTP request header, names are compared case insensitively
    pub fn add_http_request_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self
            .http_headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(existing) => *existing = (name, value),
            None => self.http_headers.push((name, value)),
        }
    }

    /// Remove an HTTP request header, returns whether it existed
    pub fn remove_http_request_header(&mut self, name: &str) -> bool {
        let before = self.http_headers.len();
        self.http_headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.http_headers.len() != before
    }

    /// Remove every HTTP request header
    pub fn remove_all_http_request_headers(&mut self) {
        self.http_headers.clear();
    }

    /// The HTTP request headers, in the order they were first added
    pub fn http_request_headers(&self) -> &[(String, String)] {
        &self.http_headers
    }

    /// Remove every header of both sets
    pub fn clear(&mut self) {
        self.remove_all_amf_headers();
        self.remove_all_http_request_headers();
    }
}
