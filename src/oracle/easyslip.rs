use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::config::OracleConfig;
use crate::domain::{SlipResponse, SlipVerificationResult};

use super::{OracleError, SlipVerifier};

/// HTTP client for the EasySlip verification API.
///
/// Missing credentials are only reported when a slip is actually verified,
/// so the rest of the ledger keeps working without an oracle configured.
#[derive(Clone)]
pub struct EasySlipClient {
    http: reqwest::Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl EasySlipClient {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone().filter(|s| !s.is_empty()),
            token: config.token.clone().filter(|s| !s.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.token.is_some()
    }

    fn verify_url(base_url: &str) -> String {
        format!("{}/verify", base_url.trim_end_matches('/'))
    }
}

impl SlipVerifier for EasySlipClient {
    async fn verify_slip(
        &self,
        image: &[u8],
        filename: &str,
    ) -> Result<SlipVerificationResult, OracleError> {
        let (Some(base_url), Some(token)) = (&self.base_url, &self.token) else {
            return Err(OracleError::ConfigNotSet);
        };

        let form = Form::new()
            .part(
                "file",
                Part::bytes(image.to_vec()).file_name(filename.to_string()),
            )
            .text("checkDuplicate", "false");

        let url = Self::verify_url(base_url);
        debug!(%url, bytes = image.len(), "Sending slip to oracle");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: SlipResponse = serde_json::from_slice(&body)?;
        Ok(SlipVerificationResult::from_response(&parsed, body.to_vec()))
    }
}
