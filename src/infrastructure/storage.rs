use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::errors::DomainError;
use crate::domain::ports::{ObjectStorage, SignedUpload};

/// Object storage over a Supabase-style storage REST API.
pub struct RestStorage {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct SignedUploadResponse {
    url: String,
    #[serde(default)]
    token: Option<String>,
}

impl RestStorage {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn object_url(&self, kind: &str, bucket: &str, path: &str) -> String {
        format!("{}/object/{kind}{bucket}/{path}", self.base_url)
    }
}

/// The signed URL comes back relative (`/object/upload/sign/...?token=...`).
fn token_from_url(url: &str) -> Option<String> {
    url.split_once("token=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest).to_string())
}

#[async_trait]
impl ObjectStorage for RestStorage {
    async fn create_signed_upload(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<SignedUpload, DomainError> {
        let response = self
            .http
            .post(self.object_url("upload/sign/", bucket, path))
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::Upstream(format!(
                "Storage refused signed upload ({status}): {body}"
            )));
        }

        let signed: SignedUploadResponse = response.json().await?;
        let token = signed
            .token
            .or_else(|| token_from_url(&signed.url))
            .unwrap_or_default();
        let signed_url = if signed.url.starts_with("http") {
            signed.url
        } else {
            format!("{}{}", self.base_url, signed.url)
        };

        Ok(SignedUpload {
            signed_url,
            token,
            path: path.to_string(),
        })
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), DomainError> {
        let response = self
            .http
            .post(self.object_url("", bucket, path))
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::Upstream(format!(
                "Storage upload failed ({status}): {body}"
            )));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.object_url("public/", bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_object_urls() {
        let storage = RestStorage::new(reqwest::Client::new(), "https://x.test/storage/v1/", "key");

        assert_eq!(
            storage.public_url("proof-of-delivery", "abc/1-pod.jpg"),
            "https://x.test/storage/v1/object/public/proof-of-delivery/abc/1-pod.jpg"
        );
        assert_eq!(
            storage.object_url("upload/sign/", "invoices", "INV-1.html"),
            "https://x.test/storage/v1/object/upload/sign/invoices/INV-1.html"
        );
    }

    #[test]
    fn extracts_token_from_signed_url() {
        assert_eq!(
            token_from_url("/object/upload/sign/b/p.jpg?token=abc.def"),
            Some("abc.def".to_string())
        );
        assert_eq!(token_from_url("/object/upload/sign/b/p.jpg"), None);
    }
}
