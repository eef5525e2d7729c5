//! Raw HTTP requests for test code (`httpReq`).
//!
//! Redirects are not followed; the response reports the redirect target
//! as its final URL. The remote-control backend enables the session
//! cookie jar so authenticated flows survive across requests.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};

const SUPPORTED_METHODS: [&str; 6] = ["get", "head", "post", "put", "delete", "options"];

/// Response surface consumed by test code.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Final URL: the `Location` target when the response is a redirect,
    /// otherwise the request URL.
    pub url: String,
}

/// Request body. A string is sent verbatim as a form payload; structured
/// data is serialized as JSON.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Form(String),
    Json(Value),
}

impl From<&str> for RequestBody {
    fn from(v: &str) -> Self {
        RequestBody::Form(v.to_string())
    }
}

impl From<Value> for RequestBody {
    fn from(v: Value) -> Self {
        RequestBody::Json(v)
    }
}

/// Session cookie jar: name -> value, updated from every `Set-Cookie`
/// header. An empty or `deleted` value removes the cookie.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
}

impl CookieJar {
    /// Merge one `Set-Cookie` header value into the jar.
    pub fn apply(&mut self, set_cookie: &str) {
        let Some((name, value)) = parse_set_cookie(set_cookie) else {
            return;
        };

        if value.is_empty() || value == "deleted" {
            self.cookies.remove(&name);
        } else {
            self.cookies.insert(name, value);
        }
    }

    /// Render the jar as a `Cookie` header value, `None` when empty.
    pub fn header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Split the leading `name=value` pair off a `Set-Cookie` header,
/// ignoring attributes after the first `;`.
fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    Some((name.trim().to_string(), value.trim().to_string()))
}

/// HTTP client shared by both backends.
pub struct HttpClient {
    client: reqwest::Client,
    jar: Option<Mutex<CookieJar>>,
}

impl HttpClient {
    /// Client without cookie tracking (in-process backend: the embedded
    /// page context owns its own cookies).
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            jar: None,
        })
    }

    /// Client with a session cookie jar (remote-control backend).
    pub fn with_cookie_jar() -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            jar: Some(Mutex::new(CookieJar::default())),
        })
    }

    /// Perform a request. Methods outside GET/HEAD/POST/PUT/DELETE/OPTIONS
    /// are rejected before any network activity.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        data: Option<RequestBody>,
        headers: &[(String, String)],
    ) -> Result<HttpResponse> {
        let lmethod = method.to_lowercase();
        if !SUPPORTED_METHODS.contains(&lmethod.as_str()) {
            return Err(Error::Config(format!("Unexpected method {lmethod}")));
        }

        let method = reqwest::Method::from_bytes(lmethod.to_uppercase().as_bytes())
            .map_err(|e| Error::Config(format!("Invalid method: {e}")))?;

        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        if let Some(jar) = &self.jar {
            if let Some(cookie_header) = jar.lock().header() {
                request = request.header(reqwest::header::COOKIE, cookie_header);
            }
        }

        if lmethod == "post" {
            if let Some(body) = data {
                request = match body {
                    RequestBody::Form(text) => request
                        .header(
                            reqwest::header::CONTENT_TYPE,
                            "application/x-www-form-urlencoded",
                        )
                        .body(text),
                    RequestBody::Json(value) => request
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(serde_json::to_string(&value)?),
                };
            }
        }

        trace!(url, "http request");
        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if let Some(jar) = &self.jar {
            let mut jar = jar.lock();
            for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
                if let Ok(value) = value.to_str() {
                    jar.apply(value);
                }
            }
        }

        let status = response.status().as_u16();
        let final_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| url.to_string());

        let mut header_map = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                header_map.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers: header_map,
            body,
            url: final_url,
        })
    }

    /// Current value of a session cookie, for assertions in tests.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar
            .as_ref()
            .and_then(|jar| jar.lock().get(name).map(str::to_string))
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| Error::Http(e.to_string()))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
