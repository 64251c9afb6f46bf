// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Load balancer access log parsing.
//!
//! Two families of lines are understood:
//!
//! - **classic** (ELB): the line starts with the request timestamp and has a
//!   fixed number of fields.
//! - **application** (ALB): the line starts with a request type marker such as
//!   `https` or `h2`. Newer releases of the format appended fields over time,
//!   so the number of fields decides which trailing fields are present.
//!
//! Every known layout is a row in [`LAYOUTS`]. A line is classified into a
//! family by its first token, then matched against the longest layout of that
//! family whose arity its token count satisfies.

use crate::error::MalformedLineError;
use crate::event::{EventBuilder, LogEvent, ParsedBatch};
use crate::tokenizer::tokenize;
use chrono::DateTime;
use serde_json::Value;
use tracing::debug;

/// Request type markers that open an application load balancer line.
const REQUEST_TYPE_MARKERS: &[&str] = &["http", "https", "h2", "ws", "wss", "grpcs"];

/// Marker for a value that does not apply to the request.
const SENTINEL: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Classic,
    Application,
}

/// How one positional token becomes event fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    /// Copied as a string, escapes included.
    Text(&'static str),
    /// `ip:port`, split into two string fields.
    Endpoint {
        address: &'static str,
        port: &'static str,
    },
    /// Seconds as a float; `-1` stays `-1`.
    Duration(&'static str),
    /// HTTP status, kept as a string.
    Status(&'static str),
    Bytes(&'static str),
    /// `METHOD URL PROTOCOL`, split into method, url and query string.
    Request,
}

/// One known line layout: its family, the fields every line of that family
/// carries, and the trailing fields this particular layout adds.
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    name: &'static str,
    family: Family,
    fields: &'static [Field],
    trailing: &'static [Field],
}

impl Layout {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn arity(&self) -> usize {
        self.fields.len() + self.trailing.len()
    }

    /// Names of the fields produced by the trailing tokens of this layout.
    pub fn trailing_field_names(&self) -> Vec<&'static str> {
        self.trailing.iter().flat_map(|field| field.names()).collect()
    }
}

impl Field {
    fn names(&self) -> Vec<&'static str> {
        match *self {
            Field::Text(name) | Field::Duration(name) | Field::Status(name) | Field::Bytes(name) => {
                vec![name]
            }
            Field::Endpoint { address, port } => vec![address, port],
            Field::Request => vec!["request_method", "request_url", "request_query_params"],
        }
    }

    fn apply(&self, token: &str, event: &mut EventBuilder, line: &str) -> Result<(), MalformedLineError> {
        match *self {
            Field::Text(name) => event.insert(name, token),
            Field::Status(name) => event.insert(name, token),
            Field::Endpoint { address, port } => {
                let (host, port_value) = split_endpoint(token);
                event.insert(address, host);
                event.insert(port, port_value);
            }
            Field::Duration(name) => {
                let seconds = token
                    .parse::<f64>()
                    .ok()
                    .filter(|seconds| seconds.is_finite())
                    .ok_or_else(|| {
                        MalformedLineError::new(line, format!("{name} is not a number: {token}"))
                    })?;
                event.insert(name, seconds);
            }
            Field::Bytes(name) => {
                let bytes = token.parse::<i64>().map_err(|_| {
                    MalformedLineError::new(line, format!("{name} is not an integer: {token}"))
                })?;
                event.insert(name, bytes);
            }
            Field::Request => {
                let (method, url, query) = split_request(token);
                event.insert("request_method", method);
                event.insert("request_url", url);
                event.insert("request_query_params", query);
            }
        }
        Ok(())
    }
}

const CLASSIC_FIELDS: &[Field] = &[
    Field::Text("timestamp"),
    Field::Text("elb"),
    Field::Endpoint {
        address: "client_ip",
        port: "client_port",
    },
    Field::Endpoint {
        address: "backend",
        port: "backend_port",
    },
    Field::Duration("request_processing_time"),
    Field::Duration("backend_processing_time"),
    Field::Duration("response_processing_time"),
    Field::Status("elb_status_code"),
    Field::Status("backend_status_code"),
    Field::Bytes("received_bytes"),
    Field::Bytes("sent_bytes"),
    Field::Request,
    Field::Text("user_agent"),
    Field::Text("ssl_cipher"),
    Field::Text("ssl_protocol"),
];

const APPLICATION_FIELDS: &[Field] = &[
    Field::Text("type"),
    Field::Text("timestamp"),
    Field::Text("elb"),
    Field::Endpoint {
        address: "client_ip",
        port: "client_port",
    },
    Field::Endpoint {
        address: "target",
        port: "target_port",
    },
    Field::Duration("request_processing_time"),
    Field::Duration("target_processing_time"),
    Field::Duration("response_processing_time"),
    Field::Status("elb_status_code"),
    Field::Status("target_status_code"),
    Field::Bytes("received_bytes"),
    Field::Bytes("sent_bytes"),
    Field::Request,
    Field::Text("user_agent"),
    Field::Text("ssl_cipher"),
    Field::Text("ssl_protocol"),
];

const APPLICATION_TRACE_FIELDS: &[Field] = &[Field::Text("target_group_arn"), Field::Text("trace_id")];

const APPLICATION_TLS_HOST_FIELDS: &[Field] = &[
    Field::Text("target_group_arn"),
    Field::Text("trace_id"),
    Field::Text("domain_name"),
    Field::Text("chosen_cert_arn"),
];

/// All known layouts. Within a family, longer layouts come first.
pub static LAYOUTS: &[Layout] = &[
    Layout {
        name: "classic",
        family: Family::Classic,
        fields: CLASSIC_FIELDS,
        trailing: &[],
    },
    Layout {
        name: "application-tls-host",
        family: Family::Application,
        fields: APPLICATION_FIELDS,
        trailing: APPLICATION_TLS_HOST_FIELDS,
    },
    Layout {
        name: "application-trace",
        family: Family::Application,
        fields: APPLICATION_FIELDS,
        trailing: APPLICATION_TRACE_FIELDS,
    },
    Layout {
        name: "application",
        family: Family::Application,
        fields: APPLICATION_FIELDS,
        trailing: &[],
    },
];

/// Decides which family a line belongs to from its first token.
fn classify_family(first: &str) -> Option<Family> {
    if REQUEST_TYPE_MARKERS.contains(&first) {
        Some(Family::Application)
    } else if DateTime::parse_from_rfc3339(first).is_ok() {
        Some(Family::Classic)
    } else {
        None
    }
}

/// Picks the layout for an already tokenized line.
pub fn classify(tokens: &[&str]) -> Option<&'static Layout> {
    let family = classify_family(tokens.first()?)?;
    LAYOUTS
        .iter()
        .filter(|layout| layout.family == family)
        .find(|layout| layout.arity() <= tokens.len())
}

/// Parses one access log line into an event.
pub fn parse_line(line: &str) -> Result<LogEvent, MalformedLineError> {
    let tokens = tokenize(line);
    let Some(first) = tokens.first() else {
        return Err(MalformedLineError::new(line, "empty line"));
    };
    let Some(family) = classify_family(first) else {
        return Err(MalformedLineError::new(
            line,
            format!("unrecognized leading token {first}"),
        ));
    };
    let Some(layout) = classify(&tokens) else {
        let min_arity = LAYOUTS
            .iter()
            .filter(|layout| layout.family == family)
            .map(Layout::arity)
            .min()
            .unwrap_or_default();
        return Err(MalformedLineError::new(
            line,
            format!("expected at least {min_arity} fields, found {}", tokens.len()),
        ));
    };

    let mut event = EventBuilder::new();
    let fields = layout.fields.iter().chain(layout.trailing.iter());
    for (field, token) in fields.zip(tokens.iter()) {
        field.apply(token, &mut event, line)?;
    }
    Ok(event.build())
}

/// Parses every non-blank line of an access log object.
///
/// The first malformed line fails the whole object.
pub fn parse_access_log(text: &str) -> Result<ParsedBatch, MalformedLineError> {
    let events = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect::<Result<Vec<_>, _>>()?;
    debug!("Parsed {} access log lines", events.len());
    Ok(ParsedBatch::new(events))
}

/// Splits `ip:port` at the last colon. Tokens without a port (including the
/// `-` sentinel) keep the whole token as address and get a `-` port.
fn split_endpoint(token: &str) -> (&str, &str) {
    match token.rsplit_once(':') {
        Some((address, port)) => (address, port),
        None => (token, SENTINEL),
    }
}

fn split_request(request: &str) -> (&str, &str, &str) {
    let mut parts = request.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let (url, query) = target.split_once('?').unwrap_or((target, ""));
    (method, url, query)
}

/// Value of a field in the event, for callers that want the typed numbers back.
pub fn field_as_f64(event: &LogEvent, field: &str) -> Option<f64> {
    event.get(field).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const CLASSIC_LINE: &str = r#"2017-04-04T23:55:14.676898Z api-cms 54.93.222.213:55494 10.2.120.187:80 0.000024 0.027673 0.000021 200 200 82 78 "GET https://api.scrivito.com:443/tenants/86f1f1e2d836ca377960c1753403d83d/workspaces/published/changes HTTP/1.1" "scrivito_sdk-1.8.1" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2"#;

    const APPLICATION_LINE: &str = r#"https 2017-04-04T08:15:14.497261Z app/scrivito-backend-beta/9dce4a619ba727ed 35.158.77.50:47048 10.2.110.21:80 0.000 0.020 0.000 200 200 572 608 "GET https://beta-api.scrivito.com:443/tenants/infopark23444378/workspaces/published/changes HTTP/1.1" "scrivito_sdk-1.9.0.rc1" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2"#;

    fn as_value(event: &LogEvent) -> Value {
        event.clone().into()
    }

    #[test]
    fn test_parse_classic_line() {
        let event = parse_line(CLASSIC_LINE).unwrap();
        assert_eq!(
            as_value(&event),
            json!({
                "timestamp": "2017-04-04T23:55:14.676898Z",
                "elb": "api-cms",
                "client_ip": "54.93.222.213",
                "client_port": "55494",
                "backend": "10.2.120.187",
                "backend_port": "80",
                "request_processing_time": 0.000024,
                "backend_processing_time": 0.027673,
                "response_processing_time": 0.000021,
                "elb_status_code": "200",
                "backend_status_code": "200",
                "received_bytes": 82,
                "sent_bytes": 78,
                "request_method": "GET",
                "request_url": "https://api.scrivito.com:443/tenants/86f1f1e2d836ca377960c1753403d83d/workspaces/published/changes",
                "request_query_params": "",
                "user_agent": "scrivito_sdk-1.8.1",
                "ssl_cipher": "ECDHE-RSA-AES128-GCM-SHA256",
                "ssl_protocol": "TLSv1.2",
            })
        );
    }

    #[test]
    fn test_parse_classic_line_fields_in_line_order() {
        let event = parse_line(CLASSIC_LINE).unwrap();
        let names: Vec<&str> = event.fields().map(|(name, _)| name.as_str()).collect();
        assert_eq!(&names[..4], &["timestamp", "elb", "client_ip", "client_port"]);
        assert_eq!(names.last(), Some(&"ssl_protocol"));
    }

    #[test]
    fn test_backend_without_port() {
        let line = r#"2017-04-04T23:55:14.780171Z api-cms 54.77.78.212:34632 oops 0.000022 0.01221 0.000019 200 200 82 81 "GET https://api.scrivito.com:443/tenants/trox/workspaces/published/changes?req=uest&pa=rams HTTP/1.1" "scrivito_sdk-1.4.3" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2"#;
        let event = parse_line(line).unwrap();
        assert_eq!(event.get_str("backend"), Some("oops"));
        assert_eq!(event.get_str("backend_port"), Some("-"));
        assert_eq!(
            event.get_str("request_url"),
            Some("https://api.scrivito.com:443/tenants/trox/workspaces/published/changes")
        );
        assert_eq!(event.get_str("request_query_params"), Some("req=uest&pa=rams"));
    }

    #[test]
    fn test_sentinel_backend_and_negative_durations() {
        let line = r#"2017-04-04T23:55:14.780171Z api-cms 54.77.78.212:34632 - -1 -1 -1 504 0 0 0 "GET https://example.com:443/ HTTP/1.1" "curl/7.46.0" - -"#;
        let event = parse_line(line).unwrap();
        assert_eq!(event.get_str("backend"), Some("-"));
        assert_eq!(event.get_str("backend_port"), Some("-"));
        assert_eq!(field_as_f64(&event, "request_processing_time"), Some(-1.0));
        assert_eq!(field_as_f64(&event, "backend_processing_time"), Some(-1.0));
        assert_eq!(field_as_f64(&event, "response_processing_time"), Some(-1.0));
        assert_eq!(event.get_str("backend_status_code"), Some("0"));
    }

    #[test]
    fn test_user_agent_keeps_escapes() {
        let line = r#"  2017-04-04T23:55:14.789044Z api-cms    54.147.58.162:48491 10.2.130.135:80 0.000021 0.01036 0.000017 200 200 82 81 "GET https://api.scrivito.com:443/tenants/8e692ce327983776c63ffbd47040a3d8/workspaces/published/changes HTTP/1.1" "scrivito fake \"1.4\\3\"" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2"#;
        let event = parse_line(line).unwrap();
        assert_eq!(event.get_str("user_agent"), Some(r#"scrivito fake \"1.4\\3\""#));
        assert_eq!(event.get_str("client_ip"), Some("54.147.58.162"));
    }

    #[test]
    fn test_parse_application_line_with_trace() {
        let line = format!(
            "{APPLICATION_LINE} arn:aws:elasticloadbalancing:eu-west-1:115379056088:targetgroup/scrivito-backend-beta/5d440ca6b68ffef6 \"Root=1-58e35612-51b49fad053f4b773cd44b0e\""
        );
        let event = parse_line(&line).unwrap();
        assert_eq!(
            as_value(&event),
            json!({
                "type": "https",
                "timestamp": "2017-04-04T08:15:14.497261Z",
                "elb": "app/scrivito-backend-beta/9dce4a619ba727ed",
                "client_ip": "35.158.77.50",
                "client_port": "47048",
                "target": "10.2.110.21",
                "target_port": "80",
                "request_processing_time": 0.0,
                "target_processing_time": 0.02,
                "response_processing_time": 0.0,
                "elb_status_code": "200",
                "target_status_code": "200",
                "received_bytes": 572,
                "sent_bytes": 608,
                "request_method": "GET",
                "request_url": "https://beta-api.scrivito.com:443/tenants/infopark23444378/workspaces/published/changes",
                "request_query_params": "",
                "user_agent": "scrivito_sdk-1.9.0.rc1",
                "ssl_cipher": "ECDHE-RSA-AES128-GCM-SHA256",
                "ssl_protocol": "TLSv1.2",
                "target_group_arn": "arn:aws:elasticloadbalancing:eu-west-1:115379056088:targetgroup/scrivito-backend-beta/5d440ca6b68ffef6",
                "trace_id": "Root=1-58e35612-51b49fad053f4b773cd44b0e",
            })
        );
    }

    #[test]
    fn test_optional_trailing_fields_follow_token_count() {
        let base = parse_line(APPLICATION_LINE).unwrap();
        let with_trace = parse_line(&format!("{APPLICATION_LINE} arn:tg \"Root=1-abc\"")).unwrap();
        let with_host =
            parse_line(&format!("{APPLICATION_LINE} arn:tg \"Root=1-abc\" \"example.com\" \"arn:cert\""))
                .unwrap();

        assert_eq!(base.len(), 20);
        assert!(!base.contains("target_group_arn"));
        assert!(!base.contains("trace_id"));

        assert_eq!(with_trace.len(), 22);
        assert_eq!(with_trace.get_str("trace_id"), Some("Root=1-abc"));
        assert!(!with_trace.contains("domain_name"));

        assert_eq!(with_host.len(), 24);
        assert_eq!(with_host.get_str("domain_name"), Some("example.com"));
        assert_eq!(with_host.get_str("chosen_cert_arn"), Some("arn:cert"));
    }

    #[test]
    fn test_classify_selects_distinct_layouts() {
        let tokens = tokenize(APPLICATION_LINE);
        let mut longer = tokens.clone();
        assert_eq!(classify(&longer).map(Layout::name), Some("application"));
        longer.extend(["arn:tg", "Root=1"]);
        assert_eq!(classify(&longer).map(Layout::name), Some("application-trace"));
        longer.extend(["example.com", "arn:cert"]);
        assert_eq!(classify(&longer).map(Layout::name), Some("application-tls-host"));
        assert_eq!(
            classify(&longer).map(Layout::trailing_field_names),
            Some(vec!["target_group_arn", "trace_id", "domain_name", "chosen_cert_arn"])
        );

        assert_eq!(classify(&tokenize(CLASSIC_LINE)).map(Layout::name), Some("classic"));
    }

    #[test]
    fn test_layout_arities() {
        let arities: Vec<(&str, usize)> = LAYOUTS.iter().map(|l| (l.name(), l.arity())).collect();
        assert_eq!(
            arities,
            vec![
                ("classic", 15),
                ("application-tls-host", 20),
                ("application-trace", 18),
                ("application", 16),
            ]
        );
    }

    #[test]
    fn test_h2_request_with_method_and_query() {
        let line = APPLICATION_LINE
            .replacen("https ", "h2 ", 1)
            .replace("\"GET https://beta-api.scrivito.com:443/tenants/infopark23444378/workspaces/published/changes HTTP/1.1\"", "\"PUT https://beta-api.scrivito.com:443/tenants/scrival/perform?x=1 HTTP/2.0\"");
        let event = parse_line(&line).unwrap();
        assert_eq!(event.get_str("type"), Some("h2"));
        assert_eq!(event.get_str("request_method"), Some("PUT"));
        assert_eq!(
            event.get_str("request_url"),
            Some("https://beta-api.scrivito.com:443/tenants/scrival/perform")
        );
        assert_eq!(event.get_str("request_query_params"), Some("x=1"));
    }

    #[test]
    fn test_grpcs_request_is_an_application_line() {
        let line = APPLICATION_LINE.replacen("https ", "grpcs ", 1);
        assert_eq!(classify(&tokenize(&line)).map(Layout::name), Some("application"));

        let event = parse_line(&line).unwrap();
        assert_eq!(event.get_str("type"), Some("grpcs"));
        assert_eq!(event.get_str("request_method"), Some("GET"));
    }

    #[test]
    fn test_unknown_leading_token_is_malformed() {
        let err = parse_line("garbage 1 2 3").unwrap_err();
        assert_eq!(err.line, "garbage 1 2 3");
        assert!(err.reason.contains("garbage"));
    }

    #[test]
    fn test_too_few_fields_is_malformed() {
        let err = parse_line("2017-04-04T23:55:14.676898Z api-cms 1.2.3.4:5").unwrap_err();
        assert_eq!(err.reason, "expected at least 15 fields, found 3");

        let err = parse_line("https 2017-04-04T08:15:14.497261Z").unwrap_err();
        assert_eq!(err.reason, "expected at least 16 fields, found 2");
    }

    #[test]
    fn test_non_numeric_fields_are_malformed() {
        let line = CLASSIC_LINE.replace(" 82 78 ", " 82 lots ");
        assert!(parse_line(&line).unwrap_err().reason.contains("sent_bytes"));

        let line = CLASSIC_LINE.replace("0.000024", "soon");
        assert!(parse_line(&line)
            .unwrap_err()
            .reason
            .contains("request_processing_time"));
    }

    #[test]
    fn test_parse_access_log_skips_blank_lines() {
        let text = format!("{CLASSIC_LINE}\n\n   \n{APPLICATION_LINE}\n");
        let batch = parse_access_log(&text).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.events()[0].get_str("elb"), Some("api-cms"));
        assert_eq!(batch.events()[1].get_str("type"), Some("https"));
    }

    #[test]
    fn test_parse_access_log_fails_on_first_malformed_line() {
        let text = format!("{CLASSIC_LINE}\nnot a log line\n{CLASSIC_LINE}\n");
        let err = parse_access_log(&text).unwrap_err();
        assert_eq!(err.line, "not a log line");
    }

    #[test]
    fn test_parse_access_log_empty() {
        assert!(parse_access_log("").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_classic_values_round_trip(
            elb in "[a-z][a-z0-9-]{0,20}",
            client_port in 1u16..,
            backend_port in 1u16..,
            durations in prop::array::uniform3(prop_oneof![Just(-1.0f64), 0.0f64..100.0]),
            elb_status in 100u16..600,
            received in 0i64..1_000_000_000,
            sent in 0i64..1_000_000_000,
            path in "/[a-z0-9/]{0,30}",
            query in prop::option::of("[a-z]{1,5}=[a-z0-9]{1,5}"),
            user_agent in "[a-zA-Z0-9 ./()-]{0,40}",
        ) {
            let url = format!("https://example.com:443{path}");
            let target = match &query {
                Some(query) => format!("{url}?{query}"),
                None => url.clone(),
            };
            let line = format!(
                "2017-04-04T23:55:14.676898Z {elb} 10.0.0.1:{client_port} 10.0.0.2:{backend_port} {} {} {} {elb_status} - {received} {sent} \"GET {target} HTTP/1.1\" \"{user_agent}\" - -",
                durations[0], durations[1], durations[2],
            );

            let event = parse_line(&line).unwrap();

            prop_assert_eq!(event.get_str("elb"), Some(elb.as_str()));
            let client_port = client_port.to_string();
            let backend_port = backend_port.to_string();
            prop_assert_eq!(event.get_str("client_port"), Some(client_port.as_str()));
            prop_assert_eq!(event.get_str("backend_port"), Some(backend_port.as_str()));
            prop_assert_eq!(field_as_f64(&event, "request_processing_time"), Some(durations[0]));
            prop_assert_eq!(field_as_f64(&event, "backend_processing_time"), Some(durations[1]));
            prop_assert_eq!(field_as_f64(&event, "response_processing_time"), Some(durations[2]));
            let elb_status = elb_status.to_string();
            prop_assert_eq!(event.get_str("elb_status_code"), Some(elb_status.as_str()));
            prop_assert_eq!(event.get_str("backend_status_code"), Some("-"));
            prop_assert_eq!(event.get("received_bytes").and_then(Value::as_i64), Some(received));
            prop_assert_eq!(event.get("sent_bytes").and_then(Value::as_i64), Some(sent));
            prop_assert_eq!(event.get_str("request_url"), Some(url.as_str()));
            prop_assert_eq!(event.get_str("request_query_params"), Some(query.as_deref().unwrap_or("")));
            prop_assert_eq!(event.get_str("user_agent"), Some(user_agent.as_str()));
        }
    }
}
