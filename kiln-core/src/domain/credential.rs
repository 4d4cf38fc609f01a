//! Deploy key records
//!
//! A credential payload, whether it comes from the local store or the secret
//! vault, is a JSON list of `{source_url, private_key}` records. Only the key
//! whose `source_url` matches the job's repository is ever used.

use serde::Deserialize;
use std::fmt;

#[derive(Clone, Deserialize)]
pub struct DeployKey {
    pub source_url: String,
    pub private_key: String,
}

impl fmt::Debug for DeployKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployKey")
            .field("source_url", &self.source_url)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Parses a serialized list of deploy keys
pub fn parse_deploy_keys(payload: &str) -> serde_json::Result<Vec<DeployKey>> {
    serde_json::from_str(payload)
}

/// Returns the private key registered for exactly `source_url`
///
/// If several records match, the last one wins.
pub fn find_private_key<'a>(keys: &'a [DeployKey], source_url: &str) -> Option<&'a str> {
    keys.iter()
        .rev()
        .find(|key| key.source_url == source_url)
        .map(|key| key.private_key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"[
        {"source_url": "https://example.com/a.git", "private_key": "KEY-A"},
        {"source_url": "https://example.com/b.git", "private_key": "KEY-B"}
    ]"#;

    #[test]
    fn test_find_exact_match() {
        let keys = parse_deploy_keys(PAYLOAD).unwrap();
        assert_eq!(find_private_key(&keys, "https://example.com/b.git"), Some("KEY-B"));
    }

    #[test]
    fn test_no_prefix_matching() {
        let keys = parse_deploy_keys(PAYLOAD).unwrap();
        assert_eq!(find_private_key(&keys, "https://example.com/a"), None);
        assert_eq!(find_private_key(&keys, "https://example.com/a.git/"), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let keys = parse_deploy_keys(PAYLOAD).unwrap();
        assert!(!format!("{:?}", keys).contains("KEY-A"));
    }
}
