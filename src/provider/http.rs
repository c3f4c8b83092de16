//! reqwest-backed HTTP transport

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::debug;

use crate::Result;
use crate::collaborator::{HttpResponse, TokenHttpClient};

/// Default [`TokenHttpClient`] built on [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Build a client identifying itself as this crate
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("oauth2-grant/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn into_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl TokenHttpClient for ReqwestHttpClient {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        debug!(url = %url, "POST token request");
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        Self::into_response(response).await
    }

    async fn get_authorized(&self, url: &str, authorization: &str) -> Result<HttpResponse> {
        debug!(url = %url, "GET resource owner details");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;
        Self::into_response(response).await
    }
}
