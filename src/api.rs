use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{AuthToken, FileId};
use crate::error::GdcError;

pub const DEFAULT_API_URL: &str = "https://api.gdc.cancer.gov";
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Body of `POST /files`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub filters: Value,
    pub fields: String,
    pub size: u32,
    pub format: String,
}

/// Body of `POST /data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRequest {
    pub ids: Vec<FileId>,
}

/// Status, disposition header and full body of a GDC response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-success response into [`GdcError::Status`].
    pub fn error_for_status(self) -> Result<Self, GdcError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = String::from_utf8_lossy(&self.body).trim().to_string();
        let message = if message.is_empty() {
            "GDC request failed".to_string()
        } else {
            message
        };
        Err(GdcError::Status {
            status: self.status,
            message,
        })
    }
}

/// Transport for the two GDC endpoints this crate talks to.
///
/// Implementations return `Ok` for any HTTP response, successful or not, and
/// `Err(GdcError::Http)` only when no response was received.
pub trait GdcApi: Send + Sync {
    fn search_files(
        &self,
        request: &SearchRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError>;

    fn download_data(
        &self,
        request: &DataRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError>;
}

impl<T: GdcApi + ?Sized> GdcApi for &T {
    fn search_files(
        &self,
        request: &SearchRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        (**self).search_files(request, token)
    }

    fn download_data(
        &self,
        request: &DataRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        (**self).download_data(request, token)
    }
}

impl<T: GdcApi + ?Sized> GdcApi for Arc<T> {
    fn search_files(
        &self,
        request: &SearchRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        (**self).search_files(request, token)
    }

    fn download_data(
        &self,
        request: &DataRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        (**self).download_data(request, token)
    }
}

#[derive(Clone)]
pub struct GdcHttpClient {
    client: Client,
    base_url: String,
}

impl GdcHttpClient {
    pub fn new() -> Result<Self, GdcError> {
        Self::with_options(DEFAULT_API_URL, Some(Duration::from_secs(60)))
    }

    /// `timeout` of `None` lets requests block for as long as the server does.
    pub fn with_options(base_url: &str, timeout: Option<Duration>) -> Result<Self, GdcError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gdc/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GdcError::Http(err.to_string()))?,
        );
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| GdcError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }

    pub fn data_url(&self) -> String {
        format!("{}/data", self.base_url)
    }

    fn post<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = token {
            let value =
                HeaderValue::from_str(token.expose()).map_err(|_| GdcError::InvalidToken)?;
            request = request.header(AUTH_HEADER, value);
        }
        tracing::debug!(url, "POST");
        let response = request
            .send()
            .map_err(|err| GdcError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .map_err(|err| GdcError::Http(err.to_string()))?
            .to_vec();
        tracing::debug!(url, status, bytes = body.len(), "response");
        Ok(ApiResponse {
            status,
            content_disposition,
            body,
        })
    }
}

impl GdcApi for GdcHttpClient {
    fn search_files(
        &self,
        request: &SearchRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        self.post(&self.files_url(), request, token)
    }

    fn download_data(
        &self,
        request: &DataRequest,
        token: Option<&AuthToken>,
    ) -> Result<ApiResponse, GdcError> {
        self.post(&self.data_url(), request, token)
    }
}
