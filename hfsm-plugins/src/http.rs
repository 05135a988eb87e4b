use std::time::Duration;

use async_trait::async_trait;
use hfsm_core::{CompletionSink, InvocationHandle, Outcome, Plugin};
use hfsm_value::Value;
use tracing::{debug, instrument};

/// Outbound HTTP binding. The endpoint payload names the request:
///
/// ```text
/// { url: "https://...", method: "POST", headers: {...}, body: {...} }
/// ```
///
/// `method` defaults to `GET`; `headers` and `body` are optional. On
/// completion, `{ status, headers, body }` is united into the invoke
/// state's output under `result`. A transport failure or non-2xx/3xx
/// status is reported as [`Outcome::Error`].
pub struct HttpPlugin {
    client: reqwest::Client,
}

impl HttpPlugin {
    pub fn new() -> Self {
        HttpPlugin {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("default reqwest client configuration is valid"),
        }
    }
}

impl Default for HttpPlugin {
    fn default() -> Self {
        HttpPlugin::new()
    }
}

#[async_trait]
impl Plugin for HttpPlugin {
    fn binding(&self) -> &str {
        "HTTP"
    }

    #[instrument(skip_all)]
    async fn invoke(&self, endpoint: Value, _input: Value, on_complete: CompletionSink) {
        match self.execute(&endpoint).await {
            Ok(result) => {
                let wrapped = Value::object();
                let _ = wrapped.insert_field("result", result);
                on_complete.complete(Outcome::Success(Some(wrapped)));
            }
            Err(message) => on_complete.complete(Outcome::Error(message)),
        }
    }

    async fn cancel(&self, _handle: &InvocationHandle) {
        // in-flight requests run to completion; the engine already suppresses
        // a completion reported against a cancelled handle.
    }
}

impl HttpPlugin {
    async fn execute(&self, endpoint: &Value) -> Result<Value, String> {
        let url = endpoint
            .field("url")
            .and_then(|v| v.as_str().ok())
            .ok_or_else(|| "endpoint is missing a url field".to_string())?;
        let method = endpoint
            .field("method")
            .and_then(|v| v.as_str().ok())
            .unwrap_or_else(|| "GET".to_string());
        let method: reqwest::Method = method.parse().map_err(|_| format!("invalid HTTP method: {method}"))?;

        let mut request = self.client.request(method, url.as_str());
        if let Some(headers) = endpoint.field("headers") {
            if headers.is_object() {
                let json = hfsm_value::json::to_json(&headers).map_err(|e| e.to_string())?;
                if let serde_json::Value::Object(map) = json {
                    for (key, value) in map {
                        if let Some(value) = value.as_str() {
                            request = request.header(key.as_str(), value);
                        }
                    }
                }
            }
        }
        if let Some(body) = endpoint.field("body") {
            let json = hfsm_value::json::to_json(&body).map_err(|e| e.to_string())?;
            request = request.json(&json);
        }

        debug!(%url, "dispatching http invocation");
        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        if !(200..400).contains(&status) {
            return Err(format!("http request to {url} failed with status {status}"));
        }
        let headers = Value::object();
        for (key, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .insert_field(key.as_str(), Value::string(value))
                    .map_err(|e| e.to_string())?;
            }
        }
        let body_text = response.text().await.map_err(|e| e.to_string())?;
        let body = if body_text.is_empty() {
            Value::null()
        } else {
            serde_json::from_str::<serde_json::Value>(&body_text)
                .map(|j| hfsm_value::json::from_json(&j))
                .unwrap_or_else(|_| Value::string(body_text))
        };

        let result = Value::object();
        result.insert_field("status", Value::integer(status as i64)).map_err(|e| e.to_string())?;
        result.insert_field("headers", headers).map_err(|e| e.to_string())?;
        result.insert_field("body", body).map_err(|e| e.to_string())?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_name_is_http() {
        assert_eq!(HttpPlugin::new().binding(), "HTTP");
    }

    #[tokio::test]
    async fn missing_url_is_reported_as_error() {
        let plugin = HttpPlugin::new();
        let err = plugin.execute(&Value::object()).await.unwrap_err();
        assert!(err.contains("url"));
    }
}
