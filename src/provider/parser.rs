//! JSON token response parsing (RFC 6749 section 5)

use serde_json::{Map, Value};

use crate::collaborator::{HttpResponse, TokenResponseParser};
use crate::token::AccessToken;
use crate::{Error, Result};

/// Default [`TokenResponseParser`] for JSON token endpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTokenParser;

impl TokenResponseParser for JsonTokenParser {
    fn parse(&self, response: &HttpResponse) -> Result<AccessToken> {
        let parsed = serde_json::from_slice::<Map<String, Value>>(&response.body);

        // Some servers answer 200 with an error body
        if let Ok(body) = &parsed {
            if let Some(error) = body.get("error").and_then(Value::as_str) {
                let description = body
                    .get("error_description")
                    .and_then(Value::as_str)
                    .map(String::from);
                return Err(Error::token_endpoint(error, description));
            }
        }

        if !response.is_success() {
            let text = String::from_utf8_lossy(&response.body).trim().to_string();
            return Err(Error::token_endpoint(
                format!("HTTP {}", response.status),
                (!text.is_empty()).then_some(text),
            ));
        }

        let mut body = parsed?;

        let access_token = match body.remove("access_token") {
            Some(Value::String(token)) => token,
            _ => {
                return Err(Error::token_endpoint(
                    "invalid_response",
                    Some("Response is missing access_token".to_string()),
                ));
            }
        };

        let token_type = take_string(&mut body, "token_type");
        let refresh_token = take_string(&mut body, "refresh_token");
        let scope = take_string(&mut body, "scope");
        let expires_in = body.remove("expires_in").and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            // Some servers send the lifetime as a string
            Value::String(s) => s.parse().ok(),
            _ => None,
        });

        Ok(
            AccessToken::from_response(access_token, token_type, refresh_token, expires_in, scope)
                .with_values(body),
        )
    }
}

fn take_string(body: &mut Map<String, Value>, key: &str) -> Option<String> {
    match body.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
