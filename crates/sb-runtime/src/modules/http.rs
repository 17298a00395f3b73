use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use rhai::{Dynamic, EvalAltResult, ImmutableString, Map, Module, FLOAT, INT};

use crate::deadline::{terminated, Deadline};

/// Request timeout used when no run deadline is armed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn http_error(error: impl std::fmt::Display) -> Box<EvalAltResult> {
    format!("http: {}", error).into()
}

struct HttpModule {
    client: Client,
    deadline: Deadline,
}

impl HttpModule {
    fn timeout(&self) -> Result<Duration, Box<EvalAltResult>> {
        match self.deadline.remaining() {
            Some(remaining) if remaining.is_zero() => Err(terminated()),
            Some(remaining) => Ok(remaining.min(DEFAULT_TIMEOUT)),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }

    fn send(&self, request: RequestBuilder, headers: &Map) -> Result<Dynamic, Box<EvalAltResult>> {
        let mut request = request.timeout(self.timeout()?);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.to_string());
        }
        let response = request.send().map_err(|error| {
            if error.is_timeout() && self.deadline.expired() {
                terminated()
            } else {
                http_error(error)
            }
        })?;

        let mut response_headers = Map::new();
        for (name, value) in response.headers() {
            response_headers.insert(
                name.as_str().into(),
                Dynamic::from(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            );
        }
        let status = INT::from(response.status().as_u16());
        let body = response.text().map_err(http_error)?;

        let mut out = Map::new();
        out.insert("status".into(), Dynamic::from_int(status));
        out.insert("headers".into(), Dynamic::from_map(response_headers));
        out.insert("body".into(), Dynamic::from(body));
        Ok(Dynamic::from_map(out))
    }
}

pub(crate) fn module(deadline: &Deadline) -> Result<Module, sb_core::BoxError> {
    let client = Client::builder()
        .user_agent(concat!("scriptbox/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| sb_core::BoxError::new("BOX_MODULE_LOAD", format!("http: {}", error)))?;
    let http = std::sync::Arc::new(HttpModule {
        client,
        deadline: deadline.clone(),
    });

    let mut module = Module::new();
    module.set_var("default_timeout", DEFAULT_TIMEOUT.as_secs_f64() as FLOAT);

    let get = http.clone();
    module.set_native_fn("get", move |url: ImmutableString| {
        get.send(get.client.get(url.as_str()), &Map::new())
    });
    let get = http.clone();
    module.set_native_fn("get", move |url: ImmutableString, headers: Map| {
        get.send(get.client.get(url.as_str()), &headers)
    });
    let post = http.clone();
    module.set_native_fn("post", move |url: ImmutableString, body: ImmutableString| {
        post.send(
            post.client.post(url.as_str()).body(body.to_string()),
            &Map::new(),
        )
    });
    let post = http;
    module.set_native_fn(
        "post",
        move |url: ImmutableString, body: ImmutableString, headers: Map| {
            post.send(post.client.post(url.as_str()).body(body.to_string()), &headers)
        },
    );
    module.build_index();
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Engine;

    #[test]
    fn exposes_default_timeout() {
        let module = module(&Deadline::new()).expect("client");
        let mut engine = Engine::new();
        engine.register_static_module("http", module.into());
        let timeout = engine
            .eval::<FLOAT>("http::default_timeout")
            .expect("eval");
        assert_eq!(timeout, 30.0);
    }

    #[test]
    fn invalid_urls_are_script_errors() {
        let module = module(&Deadline::new()).expect("client");
        let mut engine = Engine::new();
        engine.register_static_module("http", module.into());
        let error = engine
            .run(r#"http::get("not a url");"#)
            .expect_err("invalid url");
        assert!(error.to_string().contains("http:"));
    }

    #[test]
    fn expired_deadline_refuses_requests() {
        let deadline = Deadline::new();
        deadline.arm(Duration::ZERO);
        let module = module(&deadline).expect("client");
        let mut engine = Engine::new();
        engine.register_static_module("http", module.into());
        let error = engine
            .run(r#"http::get("http://127.0.0.1:9/");"#)
            .expect_err("deadline");
        assert!(matches!(*error, EvalAltResult::ErrorTerminated(..)));
    }
}
