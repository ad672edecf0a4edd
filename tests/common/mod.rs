// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use subshare::application::{LedgerService, NewGroup};
use subshare::domain::{Group, PaymentAccount, PaymentMethod, SlipVerificationResult};
use subshare::oracle::{OracleError, SlipVerifier};
use subshare::storage::Repository;
use tempfile::TempDir;

pub const OWNER: &str = "owner";
pub const RECEIVER_ACCOUNT: &str = "081-234-5678";

/// Slip oracle stand-in that replays a scripted answer and counts calls.
#[derive(Clone, Default)]
pub struct FakeVerifier {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    answer: Option<SlipVerificationResult>,
    calls: usize,
}

impl FakeVerifier {
    /// Answer every following call with `result`.
    pub fn respond(&self, result: SlipVerificationResult) {
        self.state.lock().unwrap().answer = Some(result);
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

impl SlipVerifier for FakeVerifier {
    async fn verify_slip(
        &self,
        _image: &[u8],
        _filename: &str,
    ) -> Result<SlipVerificationResult, OracleError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.answer.clone().ok_or(OracleError::ConfigNotSet)
    }
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService<FakeVerifier>, FakeVerifier, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap());
    let repo = Repository::init(&db_url).await?;

    let verifier = FakeVerifier::default();
    let service = LedgerService::new(repo, verifier.clone(), "THB");
    Ok((service, verifier, temp_dir))
}

/// A slip paid by PromptPay into `account`.
pub fn slip(is_valid: bool, amount: f64, account: &str) -> SlipVerificationResult {
    SlipVerificationResult {
        is_valid,
        matched_amount: amount,
        method: PaymentMethod::PromptPay,
        account: account.to_string(),
        raw_response: format!(r#"{{"status":200,"data":{{"amount":{{"amount":{}}}}}}}"#, amount)
            .into_bytes(),
    }
}

pub fn new_group(name: &str, amount: i64, due_day: u32) -> NewGroup {
    NewGroup {
        name: name.to_string(),
        amount,
        due_day,
        discord_guild_id: "guild-1".to_string(),
        owner_id: OWNER.to_string(),
        payment_account: PaymentAccount::new(PaymentMethod::PromptPay, RECEIVER_ACCOUNT),
    }
}

/// Create a group and bring `members` in as active members next to the owner.
pub async fn group_with_members(
    service: &LedgerService<FakeVerifier>,
    amount: i64,
    due_day: u32,
    members: &[&str],
) -> Result<Group> {
    let group = service
        .create_group(new_group("Streaming", amount, due_day))
        .await?;
    if members.is_empty() {
        return Ok(group);
    }

    let ids: Vec<String> = members.iter().map(|m| m.to_string()).collect();
    service.invite_members(group.id, OWNER, &ids).await?;
    for member in members {
        service.accept_invite(group.id, member).await?;
    }
    Ok(service.get_group(group.id).await?)
}
