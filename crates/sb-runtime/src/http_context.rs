use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{Dynamic, Engine, Map, INT};
use sb_core::SbValue;

use crate::bridge::dynamic_to_json;

/// Type name scripts see for the response handle.
pub const RESPONSE_TYPE_NAME: &str = "http_response";

/// An inbound request handed to a script as the global `request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Script view of the request; a missing body is `()`.
    pub fn to_value(&self) -> SbValue {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), SbValue::String(value.clone())))
            .collect();
        let mut fields = BTreeMap::new();
        fields.insert("method".to_string(), SbValue::String(self.method.clone()));
        fields.insert("url".to_string(), SbValue::String(self.url.clone()));
        fields.insert("headers".to_string(), SbValue::Map(headers));
        fields.insert(
            "body".to_string(),
            self.body.clone().map(SbValue::String).unwrap_or_default(),
        );
        SbValue::Map(fields)
    }
}

#[derive(Debug)]
struct ResponseData {
    status: i64,
    headers: BTreeMap<String, String>,
    body: String,
}

impl Default for ResponseData {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }
}

/// The response a script fills in. Clones share one response, so the host
/// reads whatever the script wrote after the run.
#[derive(Clone, Default)]
pub struct HttpResponse {
    data: Arc<Mutex<ResponseData>>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> i64 {
        self.data.lock().status
    }

    pub fn headers(&self) -> BTreeMap<String, String> {
        self.data.lock().headers.clone()
    }

    pub fn body(&self) -> String {
        self.data.lock().body.clone()
    }

    fn set_json(&self, value: Dynamic) {
        let body = dynamic_to_json(value).to_string();
        let mut data = self.data.lock();
        data.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        data.body = body;
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(status={})", RESPONSE_TYPE_NAME, self.status())
    }
}

pub(crate) fn register_response_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<HttpResponse>(RESPONSE_TYPE_NAME)
        .register_get_set(
            "status",
            |response: &mut HttpResponse| response.status() as INT,
            |response: &mut HttpResponse, status: INT| response.data.lock().status = status as i64,
        )
        .register_get_set(
            "body",
            |response: &mut HttpResponse| response.body(),
            |response: &mut HttpResponse, body: String| {
                response.data.lock().body = body.to_string()
            },
        )
        .register_get("headers", |response: &mut HttpResponse| {
            response
                .headers()
                .into_iter()
                .map(|(name, value)| (name.into(), Dynamic::from(value)))
                .collect::<Map>()
        })
        .register_fn(
            "add_header",
            |response: &mut HttpResponse, name: &str, value: &str| {
                response
                    .data
                    .lock()
                    .headers
                    .insert(name.to_string(), value.to_string());
            },
        )
        .register_fn("set_json", |response: &mut HttpResponse, value: Dynamic| {
            response.set_json(value)
        })
        .register_fn("to_string", |response: &mut HttpResponse| {
            format!("{:?}", response)
        });
}
