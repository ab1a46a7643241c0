//! Inbound webhook request: headers and raw body, one per invocation.

use std::collections::HashMap;

/// Headers as delivered plus the raw body. Verification needs the exact body bytes,
/// so the body is kept as received (not even UTF-8 checked) and decoded only after
/// verification succeeds.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl InboundRequest {
    pub fn new(headers: HashMap<String, String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Header value by name. Exact key first, then ASCII case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = InboundRequest::default().with_header("X-Slack-Signature", "v0=abc");
        assert_eq!(req.header("x-slack-signature"), Some("v0=abc"));
        assert_eq!(req.header("X-Slack-Signature"), Some("v0=abc"));
        assert_eq!(req.header("x-slack-request-timestamp"), None);
    }
}
