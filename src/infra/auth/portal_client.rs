use crate::core::verification::{CredentialCheck, CredentialChecker, ProfileField, VerificationError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// HTTP client for the external academic credential API.
///
/// The API accepts `POST {base_url}/authenticate` with a JSON body of
/// `{username, password, profile}` and answers with `status: bool` plus an
/// optional `profile` object of string fields.
pub struct PortalAuthClient {
    client: Client,
    base_url: String,
}

impl PortalAuthClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CredentialChecker for PortalAuthClient {
    async fn check(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CredentialCheck, VerificationError> {
        let url = format!("{}/authenticate", self.base_url);

        let payload = json!({
            "username": username,
            "password": password,
            "profile": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| VerificationError::CredentialApiError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(VerificationError::CredentialApiError(format!(
                "authentication endpoint returned {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VerificationError::CredentialApiError(e.to_string()))?;

        let valid = body["status"].as_bool().unwrap_or(false);

        let profile = body["profile"]
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(key, value)| ProfileField {
                        label: key.clone(),
                        // Strings render bare; anything else keeps its JSON form
                        value: value
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| value.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(CredentialCheck { valid, profile })
    }
}
