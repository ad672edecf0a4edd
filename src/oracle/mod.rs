//! Remote slip verification.
//!
//! The ledger never reads slip images itself. It hands them to a
//! [`SlipVerifier`] and works only with the structured result.

mod easyslip;

pub use easyslip::*;

use std::future::Future;

use thiserror::Error;

use crate::domain::SlipVerificationResult;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Slip oracle is not configured (base URL and token are required)")]
    ConfigNotSet,

    #[error("Slip oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Slip oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid slip oracle response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Something that can inspect a slip image and report what it says.
pub trait SlipVerifier: Send + Sync {
    fn verify_slip(
        &self,
        image: &[u8],
        filename: &str,
    ) -> impl Future<Output = Result<SlipVerificationResult, OracleError>> + Send;
}
