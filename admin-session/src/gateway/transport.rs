use async_trait::async_trait;
use std::fmt::Display;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Request/response as seen by a transport
//--------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not reach the server: {0}")]
    Connect(String),

    #[error("the request timed out")]
    TimedOut,

    #[error("transport failure: {0}")]
    Other(String),
}

//--------------------------------------------------------------------------------------------------
// Transport trait
//--------------------------------------------------------------------------------------------------

/// One network round trip. No retries, no timeout: the gateway owns both decisions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

//--------------------------------------------------------------------------------------------------
// reqwest transport
//--------------------------------------------------------------------------------------------------

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::{Transport, TransportError, TransportRequest, TransportResponse};
    use async_trait::async_trait;
    use reqwest::cookie::Jar;
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Cookies from `jar` are sent with every request, including cross-origin ones.
        pub fn new(jar: Arc<Jar>) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .cookie_provider(jar)
                .build()
                .map_err(|err| TransportError::Other(err.to_string()))?;
            Ok(Self { client })
        }

        pub fn from_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::TimedOut
        } else if err.is_connect() || err.is_request() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
                .map_err(|err| TransportError::Other(err.to_string()))?;

            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(classify)?;

            Ok(TransportResponse {
                status,
                body: body.to_vec(),
            })
        }
    }
}
