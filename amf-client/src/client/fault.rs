//! Classification of failed calls
//!
//! A call fails either locally ([`ClientFault`]), before a usable answer came back from the
//! broker, or remotely ([`ServerFault`]), when the broker answered with a status message.
use crate::client::envelope::HttpResponseInfo;
use crate::extra::flex;
use crate::types::Value;
use std::rc::Rc;
use thiserror::Error;

/// Code of a call that failed on the client
pub const CALL_FAILED: &str = "AMFConnection.Call.Failed";

/// Code of a connection that could not be established
pub const CONNECT_FAILED: &str = "AMFConnection.Connect.Failed";

/// The kind of a local failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientFaultKind {
    /// The url given to `connect` is unusable
    ConnectFailed,

    /// The request could not be sent, or no usable HTTP response came back
    CallFailed,

    /// A response arrived but could not be decoded
    DecodeFailed,
}

impl ClientFaultKind {
    /// The fault code reported for this kind
    ///
    /// Decode failures report the code of a failed call.
    pub fn code(&self) -> &'static str {
        match self {
            ClientFaultKind::ConnectFailed => CONNECT_FAILED,
            ClientFaultKind::CallFailed | ClientFaultKind::DecodeFailed => CALL_FAILED,
        }
    }
}

/// A failure raised on the client side of a call
#[derive(Error, Debug)]
#[error("{}: {message}", .kind.code())]
pub struct ClientFault {
    /// What failed
    pub kind: ClientFaultKind,

    /// A description of the failure
    pub message: String,

    /// The HTTP response, when one was received
    pub http: Option<HttpResponseInfo>,

    /// The underlying error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ClientFault {
    /// A fault without HTTP information or cause
    pub fn new(kind: ClientFaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http: None,
            source: None,
        }
    }

    /// Attach the HTTP response that led to this fault
    pub fn with_http(mut self, http: HttpResponseInfo) -> Self {
        self.http = Some(http);
        self
    }

    /// Attach the error that caused this fault
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The fault code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// A fault decoded from a status message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultRecord {
    /// The fault code, such as `Server.Resource.Unavailable`
    pub code: String,

    /// A human readable description
    pub description: String,

    /// Additional detail, a server side stack trace or a nested object such as a root cause
    pub detail: Option<Rc<Value>>,
}

impl FaultRecord {
    /// Read a fault from a status payload
    ///
    /// Flex error messages use `faultCode`, `faultString` and `faultDetail`, plain status
    /// objects use `code`, `description` and `details`. Missing members read as empty. When
    /// the detail member is missing or empty, `rootCause` and then `extendedData` are used.
    pub fn from_payload(payload: &Value) -> Self {
        let text = |name: &str| {
            payload
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        let (code, description, detail) = if flex::is_error_message(payload) {
            ("faultCode", "faultString", "faultDetail")
        } else {
            ("code", "description", "details")
        };

        let detail = [detail, "rootCause", "extendedData"]
            .into_iter()
            .filter_map(|name| payload.get(name))
            .map(|v| v.unwrap_amf3())
            .find(|v| {
                !matches!(v.as_ref(), Value::Null | Value::Undefined) && v.as_str() != Some("")
            });

        Self {
            code: text(code).unwrap_or_default(),
            description: text(description).unwrap_or_default(),
            detail,
        }
    }

    /// The detail, when it is plain text
    pub fn detail_str(&self) -> Option<&str> {
        self.detail.as_deref().and_then(Value::as_str)
    }
}

/// A failure reported by the broker
#[derive(Error, Debug, Clone)]
#[error("{}: {}", .record.code, .record.description)]
pub struct ServerFault {
    /// The decoded fault
    pub record: FaultRecord,

    /// The whole status payload
    pub data: Rc<Value>,

    /// The HTTP response that carried the fault
    pub http: HttpResponseInfo,
}

impl ServerFault {
    /// Build a fault from a status payload
    pub fn from_payload(data: Rc<Value>, http: HttpResponseInfo) -> Self {
        Self {
            record: FaultRecord::from_payload(&data),
            data,
            http,
        }
    }

    /// The remote fault code
    pub fn code(&self) -> &str {
        &self.record.code
    }

    /// The remote fault description
    pub fn description(&self) -> &str {
        &self.record.description
    }

    /// The remote fault detail, when it is plain text
    pub fn detail(&self) -> Option<&str> {
        self.record.detail_str()
    }

    /// The remote fault detail, whatever its shape
    pub fn detail_value(&self) -> Option<&Rc<Value>> {
        self.record.detail.as_ref()
    }
}

/// The failure of a call
#[derive(Error, Debug)]
pub enum Fault {
    /// Raised on the client
    #[error(transparent)]
    Client(#[from] ClientFault),

    /// Reported by the broker
    #[error(transparent)]
    Server(#[from] ServerFault),
}

impl Fault {
    /// The fault code
    pub fn code(&self) -> &str {
        match self {
            Fault::Client(fault) => fault.code(),
            Fault::Server(fault) => fault.code(),
        }
    }

    /// The HTTP response that carried the fault, if there was one
    pub fn http(&self) -> Option<&HttpResponseInfo> {
        match self {
            Fault::Client(fault) => fault.http.as_ref(),
            Fault::Server(fault) => Some(&fault.http),
        }
    }

    /// The kind of a client fault
    pub fn client_kind(&self) -> Option<ClientFaultKind> {
        match self {
            Fault::Client(fault) => Some(fault.kind),
            Fault::Server(_) => None,
        }
    }
}
