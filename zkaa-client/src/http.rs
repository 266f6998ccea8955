use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use zkaa_common::{api::ErrorBody, ZkaaError};

use crate::error::ClientError;

/// HTTP client with timeouts and a user agent applied. Idempotent reads go
/// through [`Request::send_idempotent`], which retries transient failures;
/// everything else is sent exactly once.
#[derive(Clone)]
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: usize,
}

impl Request {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_retries: 3, // total attempts = 4
        }
    }

    pub(crate) fn req(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("zkaa-client/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    pub(crate) async fn send_once(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, ClientError> {
        execute_request_builder(request_builder, false)
            .await
            .map_err(Into::into)
    }

    pub(crate) async fn send_idempotent(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, ClientError> {
        let Some(template) = request_builder.try_clone() else {
            return self.send_once(request_builder).await;
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(
                    "<unknown>".to_string(),
                    None,
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute_request_builder(request_builder, true).await
        })
        .retry(backoff)
        .when(|err: &RequestHandleError| err.is_retryable())
        .notify(|err: &RequestHandleError, delay: Duration| {
            tracing::debug!(url = %err.url, ?delay, "retrying request: {}", err.error);
        })
        .await
        .map_err(Into::into)
    }
}

/// Decodes a success body as `T` and an error body as
/// [`ClientError::Rejected`].
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let url = response.url().to_string();
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ClientError::Network {
            url: url.clone(),
            status: Some(status.as_u16()),
            error: format!("failed to read body: {err}"),
        })?;

    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(|err| ClientError::UnexpectedResponse {
            url,
            error: format!("invalid body: {err}"),
        });
    }

    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => Err(ClientError::Rejected {
            kind: body.code,
            message: body.error,
        }),
        Err(_) => Err(ClientError::UnexpectedResponse {
            url,
            error: format!(
                "status {status}: {}",
                String::from_utf8_lossy(&bytes).trim()
            ),
        }),
    }
}

#[derive(Debug)]
struct RequestHandleError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl RequestHandleError {
    fn retryable(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: true,
        }
    }

    fn permanent(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: false,
        }
    }

    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<RequestHandleError> for ClientError {
    fn from(value: RequestHandleError) -> Self {
        ClientError::Network {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}

/// Sends one attempt. With `retry_status`, 429 and 5xx responses become
/// retryable errors instead of being returned for decoding.
async fn execute_request_builder(
    request_builder: RequestBuilder,
    retry_status: bool,
) -> Result<Response, RequestHandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(
            err.url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            None,
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if retry_status && (status == 429 || (500..600).contains(&status)) {
                return Err(RequestHandleError::retryable(
                    url,
                    Some(status),
                    format!("request error with bad status code {status}"),
                ));
            }
            Ok(resp)
        }
        Err(err) => {
            if err.is_timeout() || err.is_connect() {
                return Err(RequestHandleError::retryable(
                    url,
                    None,
                    format!("request timeout/connect error: {err}"),
                ));
            }

            Err(RequestHandleError::permanent(
                url,
                None,
                format!("request failed: {err}"),
            ))
        }
    }
}

/// Appends path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            ClientError::Local(ZkaaError::InvalidInput(format!(
                "{base} cannot be used as a base URL"
            )))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    Url::parse(base_url).map_err(|err| {
        ClientError::Local(ZkaaError::InvalidInput(format!(
            "invalid URL {base_url}: {err}"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = parse_base_url("http://localhost:3000").unwrap();
        let url = endpoint(&base, &["accounts", "ab", "my salt/x", "balance"]).unwrap();
        assert_eq!(url.path(), "/accounts/ab/my%20salt%2Fx/balance");

        let nested = parse_base_url("http://localhost:3000/api/").unwrap();
        let url = endpoint(&nested, &["health"]).unwrap();
        assert_eq!(url.path(), "/api/health");
    }

    #[test]
    fn test_bad_base_url() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ClientError::Local(ZkaaError::InvalidInput(_)))
        ));
        let base = parse_base_url("mailto:user@example.com").unwrap();
        assert!(endpoint(&base, &["x"]).is_err());
    }

    #[tokio::test]
    async fn test_reads_retry_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(503)
            .expect(4)
            .create_async()
            .await;

        let request = Request::new(Duration::from_secs(5));
        let url = endpoint(&parse_base_url(&server.url()).unwrap(), &["health"]).unwrap();
        let result = request.send_idempotent(request.get(url)).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(ClientError::Network {
                status: Some(503),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_writes_are_sent_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transfers")
            .with_status(500)
            .with_body(r#"{"error":"ledger error: down","code":"LEDGER_ERROR"}"#)
            .expect(1)
            .create_async()
            .await;

        let request = Request::new(Duration::from_secs(5));
        let url = endpoint(&parse_base_url(&server.url()).unwrap(), &["transfers"]).unwrap();
        let response = request.send_once(request.post(url)).await.unwrap();
        let result = decode::<serde_json::Value>(response).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(ClientError::Rejected {
                kind: zkaa_common::ErrorKind::Ledger,
                ..
            })
        ));
    }
}
