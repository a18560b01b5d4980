//! Shared HTTP plumbing for the model clients.

use super::types::ModelError;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct HttpClientBase {
    pub id: &'static str,
    pub endpoint: String,
    pub api_key: String,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(id: &'static str, endpoint: String, api_key: String) -> Self {
        Self {
            id,
            endpoint,
            api_key,
            http: Client::new(),
        }
    }

    pub fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub async fn post_with_bearer<Req, Res>(&self, url: &str, body: &Req) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        self.post_with_headers(url, &[("Authorization", format!("Bearer {}", self.api_key))], body)
            .await
    }

    pub async fn post_with_headers<Req, Res>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &Req,
    ) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let mut request = self.http.post(url).header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        request
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::network(self.id, e))?
            .error_for_status()
            .map_err(|e| ModelError::network(self.id, e))?
            .json()
            .await
            .map_err(|e| ModelError::network(self.id, e))
    }
}
