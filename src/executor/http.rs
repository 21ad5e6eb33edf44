//! HTTP executor for the Nacelle GraphQL endpoint.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{QueryExecutor, QueryRequest};
use crate::error::{Error, Result};

/// Header carrying the space identifier.
pub const SPACE_ID_HEADER: &str = "x-nacelle-space-id";

/// Header carrying the space access token.
pub const SPACE_TOKEN_HEADER: &str = "x-nacelle-space-token";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes operations with authenticated POST requests.
pub struct HttpExecutor {
    client: reqwest::Client,
    endpoint: String,
    space_id: String,
    access_token: String,
}

impl HttpExecutor {
    /// Create an executor for `endpoint`, authenticated as the given space.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: &str, space_id: &str, access_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, endpoint, space_id, access_token))
    }

    /// Create an executor on an already configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: &str, space_id: &str, access_token: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            space_id: space_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Pull `data` out of a response body, surfacing remote errors verbatim.
fn extract_data(operation: &str, body: Value) -> Result<Value> {
    let response: GraphqlResponse = serde_json::from_value(body)
        .map_err(|e| Error::Transport(format!("{operation} returned an invalid response: {e}")))?;

    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(Error::Transport(messages.join("; ")));
    }

    match response.data {
        Some(Value::Null) | None => Err(Error::Transport(format!("{operation} returned no data"))),
        Some(data) => Ok(data),
    }
}

impl QueryExecutor for HttpExecutor {
    async fn execute(&self, request: &QueryRequest) -> Result<Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(SPACE_ID_HEADER, &self.space_id)
            .header(SPACE_TOKEN_HEADER, &self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} request failed: {e}", request.operation_name)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "{} failed with HTTP {status}: {body}",
                request.operation_name
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            Error::Transport(format!(
                "Failed to parse {} response: {e}",
                request.operation_name
            ))
        })?;

        extract_data(&request.operation_name, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer it with `status` and `body`, and hand
    /// back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/graphql", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8(raw).unwrap()
        });

        (endpoint, server)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= head_end + 4 + length
    }

    fn local_executor(endpoint: &str) -> HttpExecutor {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpExecutor::with_client(client, endpoint, "space-1", "secret-token")
    }

    #[tokio::test]
    async fn test_execute_posts_authenticated_request() {
        let (endpoint, server) = serve_once("200 OK", r#"{"data":{"getSpace":{"id":"s1"}}}"#).await;
        let executor = local_executor(&endpoint);
        let request = QueryRequest::new("NODE_SPACE", "query NODE_SPACE { getSpace { id } }", Map::new());

        let data = executor.execute(&request).await.unwrap();
        assert_eq!(data, json!({"getSpace": {"id": "s1"}}));

        let raw = server.await.unwrap();
        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("POST /graphql HTTP/1.1\r\n"));
        let head = head.to_ascii_lowercase();
        assert!(head.contains(&format!("{SPACE_ID_HEADER}: space-1")));
        assert!(head.contains(&format!("{SPACE_TOKEN_HEADER}: secret-token")));
        assert!(head.contains("content-type: application/json"));

        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body, serde_json::to_value(&request).unwrap());
    }

    #[tokio::test]
    async fn test_execute_non_success_status_is_transport_error() {
        let (endpoint, server) = serve_once("401 Unauthorized", "invalid space token").await;
        let executor = local_executor(&endpoint);
        let request = QueryRequest::new("LIST_PRODUCTS", "query LIST_PRODUCTS { x }", Map::new());

        let err = executor.execute(&request).await.unwrap_err();
        server.await.unwrap();

        let Error::Transport(message) = &err else {
            panic!("expected a transport error, got {err:?}");
        };
        assert!(message.starts_with("LIST_PRODUCTS failed with HTTP 401"));
        assert!(message.ends_with("invalid space token"));
    }

    #[test]
    fn test_request_body_shape() {
        let mut variables = serde_json::Map::new();
        variables.insert("first".to_string(), json!(100));
        let request = QueryRequest::new("LIST_PRODUCTS", "query LIST_PRODUCTS { x }", variables);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["operationName"], "LIST_PRODUCTS");
        assert_eq!(body["variables"]["first"], 100);
        assert!(body["query"].as_str().unwrap().starts_with("query"));
    }

    #[test]
    fn test_extract_data() {
        let data = extract_data("NODE_SPACE", json!({"data": {"getSpace": {"id": "s1"}}})).unwrap();
        assert_eq!(data["getSpace"]["id"], "s1");
    }

    #[test]
    fn test_extract_errors_verbatim() {
        let err = extract_data(
            "LIST_PRODUCTS",
            json!({"data": null, "errors": [{"message": "Unauthorized space"}, {"message": "again"}]}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized space; again");
    }

    #[test]
    fn test_extract_missing_data() {
        let err = extract_data("NODE_SPACE", json!({})).unwrap_err();
        assert!(matches!(err, Error::Transport(msg) if msg.contains("no data")));
    }

    #[test]
    fn test_executor_creation() {
        let executor = HttpExecutor::new("https://example.test/graphql", "space", "token").unwrap();
        assert_eq!(executor.endpoint(), "https://example.test/graphql");
    }
}
