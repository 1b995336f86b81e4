//! OBD-II trouble code API and helpers.

use serde_json::Value;

use crate::classify::ApiResult;
use crate::client::{RequestOptions, ShopClient};
use crate::types::Obd2LookupRequest;

/// Whether `bytes[at..at + 5]` is a trouble code: one of `P B C U` in either
/// case followed by four ASCII digits.
fn code_at(bytes: &[u8], at: usize) -> bool {
    let Some(window) = bytes.get(at..at + 5) else {
        return false;
    };
    matches!(window[0].to_ascii_uppercase(), b'P' | b'B' | b'C' | b'U')
        && window[1..].iter().all(u8::is_ascii_digit)
}

/// Whether `code` is exactly one trouble code, ignoring case.
pub fn validate_code(code: &str) -> bool {
    code.len() == 5 && code_at(code.as_bytes(), 0)
}

/// Extract trouble codes from free text, uppercased and de-duplicated in
/// first-seen order.
pub fn parse_codes(input: &str) -> Vec<String> {
    let bytes = input.as_bytes();
    let mut codes: Vec<String> = Vec::new();
    let mut at = 0;
    while at < bytes.len() {
        if code_at(bytes, at) {
            let code = input[at..at + 5].to_ascii_uppercase();
            if !codes.contains(&code) {
                codes.push(code);
            }
            at += 5;
        } else {
            at += 1;
        }
    }
    codes
}

/// OBD-II API client.
pub struct Obd2Api {
    client: ShopClient,
}

impl Obd2Api {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self { client }
    }

    /// Look up code descriptions. Not queued offline.
    pub async fn lookup(&self, request: &Obd2LookupRequest) -> ApiResult<Value> {
        let options = RequestOptions::new().json(request)?.no_queue();
        self.client.post("/api/obd2/lookup", options).await?.completed()
    }

    /// Parse codes out of `input` and look them up.
    pub async fn lookup_text(&self, input: &str) -> ApiResult<Value> {
        self.lookup(&Obd2LookupRequest {
            codes: parse_codes(input),
            vehicle: None,
        })
        .await
    }

    pub fn validate_code(&self, code: &str) -> bool {
        validate_code(code)
    }

    pub fn parse_codes(&self, input: &str) -> Vec<String> {
        parse_codes(input)
    }
}
