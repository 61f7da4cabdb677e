use amf_client::client::AmfConnection;
use amf_client::client::fault::Fault;
use amf_client::client::trace::AmfTrace;
use amf_client::client::transport::ProxyConfig;
use amf_client::types::{AMFVersion, Element, Value};
use clap::{Arg, ArgAction, Command};
use log::debug;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let matched = Command::new("Call an operation on an AMF gateway")
        .version("1.0")
        .author("CUB3D <callumthom11@gmail.com>")
        .arg(Arg::new("URL").help("The gateway url").required(true))
        .arg(
            Arg::new("OPERATION")
                .help("The operation to call, as destination.method")
                .required(true),
        )
        .arg(
            Arg::new("ARGS")
                .help("Arguments of the call, as JSON")
                .num_args(0..),
        )
        .arg(
            Arg::new("amf0")
                .long("amf0")
                .help("Encode the request with AMF0")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .help("An AMF header to send, as name=json")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("proxy")
                .long("proxy")
                .help("An HTTP proxy, as host:port"),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .help("Dump the exchanged packets to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut connection = AmfConnection::new();
    if matched.get_flag("amf0") {
        connection.set_object_encoding(AMFVersion::AMF0);
    }

    let trace = AmfTrace::new();
    if matched.get_flag("trace") {
        connection.set_amf_trace(trace.clone());
    }

    if let Some(proxy) = matched.get_one::<String>("proxy") {
        match proxy.rsplit_once(':').and_then(|(h, p)| Some((h, p.parse().ok()?))) {
            Some((host, port)) => connection.set_proxy(Some(ProxyConfig::new(host, port))),
            None => {
                eprintln!("Invalid proxy {proxy}, expected host:port");
                return ExitCode::FAILURE;
            }
        }
    }

    for header in matched.get_many::<String>("header").into_iter().flatten() {
        let Some((name, json)) = header.split_once('=') else {
            eprintln!("Invalid header {header}, expected name=json");
            return ExitCode::FAILURE;
        };
        match parse_json(json) {
            Some(value) => connection.add_amf_header(name, value),
            None => return ExitCode::FAILURE,
        }
    }

    let mut arguments = Vec::new();
    for json in matched.get_many::<String>("ARGS").into_iter().flatten() {
        match parse_json(json) {
            Some(value) => arguments.push(value),
            None => return ExitCode::FAILURE,
        }
    }

    let Some(url) = matched.get_one::<String>("URL") else {
        return ExitCode::FAILURE;
    };
    if let Err(e) = connection.connect(url) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let operation = matched
        .get_one::<String>("OPERATION")
        .map(String::as_str)
        .unwrap_or_default();
    debug!("Calling {} with {} arguments", operation, arguments.len());
    let result = connection.call(operation, arguments);
    if !trace.is_empty() {
        eprint!("{}", trace.contents());
    }

    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Unable to encode the result as json: {e}");
                ExitCode::FAILURE
            }
        },
        Err(Fault::Server(fault)) => {
            eprintln!("{fault}");
            if let Ok(json) = serde_json::to_string_pretty(&fault.data) {
                eprintln!("{json}");
            }
            ExitCode::FAILURE
        }
        Err(fault) => {
            eprintln!("{fault}");
            ExitCode::FAILURE
        }
    }
}

fn parse_json(json: &str) -> Option<Value> {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(value) => Some(from_json(value)),
        Err(e) => {
            eprintln!("Invalid json {json}: {e}");
            None
        }
    }
}

/// Build an AMF value from JSON, objects become anonymous objects
fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
            Some(i) => Value::from(i),
            None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(values) => Value::array(values.into_iter().map(from_json)),
        serde_json::Value::Object(members) => Value::object(
            members
                .into_iter()
                .map(|(name, value)| Element::new(name, from_json(value)))
                .collect(),
        ),
    }
}
