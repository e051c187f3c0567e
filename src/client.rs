use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::EnvProfile;
use crate::errors::{self, RequestError, SUCCESS_CODE};
use crate::images::is_absolute_url;
use crate::routes::Route;
use crate::session;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

const JSON_CONTENT_TYPE: &str = "application/json";
const INVALID_REQUEST_CODE: &str = "INVALID_REQUEST";

/// Notified after the pipeline has cleared a session the server reported as expired.
pub trait ExpiryObserver: Send + Sync {
    fn session_expired(&self, code: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExpired {
    pub code: String,
}

impl ExpiryObserver for Sender<SessionExpired> {
    fn session_expired(&self, code: &str) {
        let _ = self.send(SessionExpired {
            code: code.to_string(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl From<&EnvProfile> for ClientConfig {
    fn from(profile: &EnvProfile) -> Self {
        Self {
            base_url: profile.base_url.clone(),
            timeout: profile.timeout,
        }
    }
}

/// One call description. `auth_required` defaults to true.
#[derive(Debug, Clone)]
pub struct ApiRequest<B = ()> {
    pub url: String,
    pub method: Method,
    pub body: Option<B>,
    pub auth_required: bool,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest<()> {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            auth_required: true,
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Request for a route with no path parameters.
    pub fn route(route: &Route) -> Self {
        Self::route_with(route, &[])
    }

    pub fn route_with(route: &Route, params: &[(&str, &str)]) -> Self {
        Self::new(route.method, route.path(params)).auth(route.auth_required)
    }
}

impl<B> ApiRequest<B> {
    pub fn body<N>(self, body: N) -> ApiRequest<N> {
        ApiRequest {
            url: self.url,
            method: self.method,
            body: Some(body),
            auth_required: self.auth_required,
            headers: self.headers,
        }
    }

    pub fn auth(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// The request pipeline: URL resolution, auth headers, envelope unwrapping,
/// error mapping and session invalidation on expiry.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<session::Store>,
    base_url: String,
    timeout: Duration,
    expiry_observer: Option<Arc<dyn ExpiryObserver>>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<session::Store>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            session,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            timeout: config.timeout,
            expiry_observer: None,
        }
    }

    pub fn with_expiry_observer(mut self, observer: Arc<dyn ExpiryObserver>) -> Self {
        self.expiry_observer = Some(observer);
        self
    }

    pub fn session(&self) -> &Arc<session::Store> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resolve_url(&self, url: &str) -> String {
        if is_absolute_url(url) {
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    pub fn call<T, B>(&self, request: ApiRequest<B>) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let method = request.method;
        let url = request.url.clone();
        let response = self.send(request)?;
        let data = self.unwrap_envelope(method, &url, response)?;
        serde_json::from_value(data).map_err(|err| {
            tracing::warn!(%url, error = %err, "api: response data did not match the expected shape");
            RequestError::invalid_response()
        })
    }

    /// Issues the request without envelope handling; used for binary endpoints.
    pub fn fetch_raw<B: Serialize>(&self, request: ApiRequest<B>) -> Result<HttpResponse, RequestError> {
        self.send(request)
    }

    fn send<B: Serialize>(&self, request: ApiRequest<B>) -> Result<HttpResponse, RequestError> {
        let http = self.build(request)?;
        tracing::debug!(method = http.method.as_str(), url = %http.url, "api: request");
        self.transport.execute(http).map_err(|err| {
            tracing::warn!(error = %err, "api: transport failure");
            RequestError::Network
        })
    }

    fn build<B: Serialize>(&self, request: ApiRequest<B>) -> Result<HttpRequest, RequestError> {
        let mut headers = vec![("content-type".to_string(), JSON_CONTENT_TYPE.to_string())];
        if request.auth_required {
            let auth = self.session.auth_headers();
            if auth.is_complete() {
                headers.push(("username".to_string(), auth.username));
                headers.push(("token".to_string(), auth.token));
            }
        }
        for (name, value) in request.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
            headers.push((name, value));
        }

        let payload = match request.body {
            Some(body) => Some(serde_json::to_value(&body).map_err(|err| {
                tracing::error!(url = %request.url, error = %err, "api: payload serialization failed");
                RequestError::Domain {
                    code: INVALID_REQUEST_CODE.to_string(),
                    message: errors::GENERIC_FAILURE_MESSAGE.to_string(),
                }
            })?),
            None => None,
        };
        let (query, body) = match payload {
            Some(payload) if request.method.sends_query() => (query_pairs(&payload), None),
            other => (Vec::new(), other),
        };

        Ok(HttpRequest {
            method: request.method,
            url: self.resolve_url(&request.url),
            query,
            headers,
            body,
            timeout: self.timeout,
        })
    }

    fn unwrap_envelope(
        &self,
        method: Method,
        url: &str,
        response: HttpResponse,
    ) -> Result<Value, RequestError> {
        if response.body.iter().all(u8::is_ascii_whitespace) {
            if response.status == 401 {
                return Err(self.expire(errors::SESSION_EXPIRED_CODE, None));
            }
            return Err(RequestError::empty_response());
        }
        let payload: Value = match serde_json::from_slice(&response.body) {
            Ok(Value::Null) => return Err(RequestError::empty_response()),
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(%url, status = response.status, error = %err, "api: body is not JSON");
                if response.status == 401 {
                    return Err(self.expire(errors::SESSION_EXPIRED_CODE, None));
                }
                return Err(RequestError::invalid_response());
            }
        };

        let Some(code) = payload.get("code").and_then(Value::as_str) else {
            tracing::warn!(%url, status = response.status, "api: envelope code missing or not a string");
            return Err(RequestError::invalid_response());
        };
        if code == SUCCESS_CODE {
            return Ok(payload.get("data").cloned().unwrap_or(Value::Null));
        }

        let server_message = payload.get("message").and_then(Value::as_str);
        let err = RequestError::from_envelope(code, server_message);
        if err.is_auth_expired() {
            return Err(self.expire(code, server_message));
        }
        tracing::info!(method = method.as_str(), %url, code, "api: request rejected");
        Err(err)
    }

    fn expire(&self, code: &str, server_message: Option<&str>) -> RequestError {
        tracing::warn!(code, "api: session expired, clearing credentials");
        if let Err(err) = self.session.clear_auth() {
            tracing::error!(error = %err, "api: failed to clear expired session");
        }
        if let Some(observer) = &self.expiry_observer {
            observer.session_expired(code);
        }
        RequestError::from_envelope(errors::SESSION_EXPIRED_CODE, server_message)
    }
}

/// Flattens an object payload into query pairs. `null` members are omitted.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = payload else {
        tracing::warn!("api: non-object query payload ignored");
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(text) => text.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthPayload;
    use crate::storage::MemoryStore;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    fn setup() -> (Arc<ScriptedTransport>, Arc<session::Store>, ApiClient) {
        let transport = Arc::new(ScriptedTransport::new());
        let session = Arc::new(session::Store::new(Arc::new(MemoryStore::new())));
        let client = ApiClient::new(
            transport.clone(),
            session.clone(),
            ClientConfig {
                base_url: "https://api.test/".into(),
                timeout: Duration::from_secs(5),
            },
        );
        (transport, session, client)
    }

    fn sign_in(session: &session::Store) {
        session
            .set_auth(AuthPayload {
                username: "alice".into(),
                token: "tok".into(),
                user_type: None,
            })
            .unwrap();
    }

    #[test]
    fn success_envelope_yields_data() {
        let (transport, _session, client) = setup();
        transport.push_ok(json!({ "token": "abc" }));
        let result: crate::models::LoginResult =
            client.call(ApiRequest::get("/x").auth(false)).unwrap();
        assert_eq!(result.token, "abc");

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "https://api.test/x");
        assert_eq!(sent.timeout, Duration::from_secs(5));
        assert_eq!(sent.header("content-type"), Some("application/json"));
    }

    #[test]
    fn absolute_urls_bypass_base() {
        let (_transport, _session, client) = setup();
        assert_eq!(client.resolve_url("http://other/y"), "http://other/y");
        assert_eq!(client.resolve_url("y"), "https://api.test/y");
    }

    #[test]
    fn auth_headers_only_when_required_and_present() {
        let (transport, session, client) = setup();
        transport.push_ok(json!(null)).push_ok(json!(null)).push_ok(json!(null));

        client.call::<(), ()>(ApiRequest::get("/a")).unwrap();
        assert_eq!(transport.last_request().unwrap().header("token"), None);

        sign_in(&session);
        client.call::<(), ()>(ApiRequest::get("/b")).unwrap();
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.header("username"), Some("alice"));
        assert_eq!(sent.header("token"), Some("tok"));

        client.call::<(), ()>(ApiRequest::get("/c").auth(false)).unwrap();
        assert_eq!(transport.last_request().unwrap().header("token"), None);
    }

    #[test]
    fn explicit_headers_override_defaults() {
        let (transport, _session, client) = setup();
        transport.push_ok(json!(null));
        client
            .call::<(), ()>(
                ApiRequest::get("/a")
                    .header("Content-Type", "text/plain")
                    .header("Cookie", "sid=1"),
            )
            .unwrap();
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.header("content-type"), Some("text/plain"));
        assert_eq!(sent.header("cookie"), Some("sid=1"));
    }

    #[test]
    fn get_payload_goes_to_query_without_nulls() {
        let (transport, _session, client) = setup();
        transport.push_ok(json!(null));
        client
            .call::<(), _>(ApiRequest::get("/q").body(json!({
                "current": 1,
                "keyword": null,
                "type": "like"
            })))
            .unwrap();
        let sent = transport.last_request().unwrap();
        assert!(sent.body.is_none());
        assert_eq!(sent.query_value("current"), Some("1"));
        assert_eq!(sent.query_value("type"), Some("like"));
        assert_eq!(sent.query_value("keyword"), None);
    }

    #[test]
    fn post_payload_goes_to_body() {
        let (transport, _session, client) = setup();
        transport.push_ok(json!(null));
        client
            .call::<(), _>(ApiRequest::new(Method::Post, "/p").body(json!({ "id": 3 })))
            .unwrap();
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.body, Some(json!({ "id": 3 })));
        assert!(sent.query.is_empty());
    }

    #[test]
    fn transport_failure_is_network_error() {
        let (transport, _session, client) = setup();
        transport.push_transport_error("connection refused");
        let err = client.call::<(), ()>(ApiRequest::get("/a")).unwrap_err();
        assert_eq!(err, RequestError::Network);
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        let (transport, _session, client) = setup();
        transport
            .push(HttpResponse::default())
            .push(HttpResponse::json(json!({ "code": 0, "data": {} })))
            .push(HttpResponse::json(json!({ "data": {} })));
        for expected in [
            errors::EMPTY_RESPONSE_CODE,
            errors::INVALID_RESPONSE_CODE,
            errors::INVALID_RESPONSE_CODE,
        ] {
            let err = client.call::<Value, ()>(ApiRequest::get("/a")).unwrap_err();
            assert_eq!(err.code(), expected);
        }
    }

    #[test]
    fn domain_error_uses_mapped_message() {
        let (transport, session, client) = setup();
        sign_in(&session);
        transport
            .push_failure("C000101", Some("question missing"))
            .push_failure("X1", Some("custom text"));
        let err = client.call::<(), ()>(ApiRequest::get("/a")).unwrap_err();
        assert_eq!(err.message(), "问题不存在");
        let err = client.call::<(), ()>(ApiRequest::get("/a")).unwrap_err();
        assert_eq!(err.message(), "custom text");
        assert!(session.current().is_logged_in);
    }

    #[test]
    fn expiry_clears_session_and_notifies() {
        let (transport, session, client) = setup();
        let (tx, rx) = crossbeam_channel::unbounded();
        let client = client.with_expiry_observer(Arc::new(tx));
        sign_in(&session);
        transport.push_failure(errors::SESSION_EXPIRED_CODE, None);

        let err = client.call::<(), ()>(ApiRequest::get("/a")).unwrap_err();
        assert!(err.is_auth_expired());
        assert_eq!(err.message(), "登录状态失效，请重新登录");
        assert!(!session.current().is_logged_in);
        assert!(!session.hydrate().unwrap().is_logged_in);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionExpired {
                code: "A000204".into()
            }
        );
    }

    #[test]
    fn bare_http_401_is_treated_as_expiry() {
        let (transport, session, client) = setup();
        sign_in(&session);
        transport.push(HttpResponse {
            status: 401,
            headers: vec![],
            body: b"Unauthorized".to_vec(),
        });
        let err = client.call::<(), ()>(ApiRequest::get("/a")).unwrap_err();
        assert!(err.is_auth_expired());
        assert!(!session.current().is_logged_in);
    }
}
