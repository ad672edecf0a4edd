use serde::{Deserialize, Serialize};

use super::{PaymentAccount, PaymentMethod};

/// What the slip oracle reported about one transfer receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlipVerificationResult {
    /// The oracle accepted the slip as a genuine, unique transaction.
    pub is_valid: bool,
    /// Amount read off the slip, in major units.
    pub matched_amount: f64,
    pub method: PaymentMethod,
    /// Receiving account as read by the oracle (may be masked).
    pub account: String,
    /// Untouched response body, kept for audit.
    pub raw_response: Vec<u8>,
}

impl SlipVerificationResult {
    /// Build a result from a decoded oracle response and its raw body.
    pub fn from_response(response: &SlipResponse, raw_response: Vec<u8>) -> Self {
        let receiver = response.data.receiver.account.receiving_account();
        Self {
            is_valid: response.status == 200,
            matched_amount: response.data.amount.amount,
            method: receiver.method,
            account: receiver.account,
            raw_response,
        }
    }

    pub fn raw_response_text(&self) -> Option<String> {
        if self.raw_response.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.raw_response).into_owned())
        }
    }

    /// True when the slip paid into `account`: same method, same last four digits.
    pub fn matches_receiver(&self, account: &PaymentAccount) -> bool {
        self.method == account.method
            && last4(&digits_only(&self.account)) == last4(&digits_only(&account.account))
    }
}

/// Oracle response body. Only the fields the ledger reads are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlipResponse {
    pub status: u16,
    pub data: SlipData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlipData {
    pub trans_ref: String,
    pub date: String,
    pub amount: SlipAmount,
    pub receiver: SlipParty,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlipAmount {
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlipParty {
    pub account: SlipAccount,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlipAccount {
    pub bank: Option<SlipAccountRef>,
    /// PromptPay proxy: phone, national id, e-wallet, email or biller id.
    pub proxy: Option<SlipAccountRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlipAccountRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub account: String,
}

impl SlipAccount {
    /// Bank record wins over proxy. With neither present the result is a
    /// bank account with an empty number, which never matches a real account.
    pub fn receiving_account(&self) -> PaymentAccount {
        match (&self.bank, &self.proxy) {
            (Some(bank), _) => PaymentAccount::new(PaymentMethod::BankAccount, bank.account.clone()),
            (None, Some(proxy)) => {
                PaymentAccount::new(PaymentMethod::PromptPay, proxy.account.clone())
            }
            (None, None) => PaymentAccount::new(PaymentMethod::BankAccount, String::new()),
        }
    }
}

/// Keep only ASCII digits: "xxx-x-x1234-x" -> "1234".
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Last four characters of `s`, or all of it when shorter.
pub fn last4(s: &str) -> &str {
    let count = s.chars().count();
    if count <= 4 {
        return s;
    }
    let start = s.char_indices().nth(count - 4).map(|(i, _)| i).unwrap_or(0);
    &s[start..]
}
