//! Agent identifiers
//!
//! Ids have the shape `agent-<unix millis>-<base36 suffix>`, so the gateway
//! can reject garbage before touching any session state.

use chrono::Utc;
use rand::Rng;

use crate::error::{Error, Result};

/// Literal prefix every agent id carries
pub const AGENT_ID_PREFIX: &str = "agent-";

const SUFFIX_LEN: usize = 11;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mint a fresh agent id
pub fn generate_agent_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!(
        "{}{}-{}",
        AGENT_ID_PREFIX,
        Utc::now().timestamp_millis(),
        suffix
    )
}

/// Whether `id` is `agent-<digits>-<lowercase base36>`
pub fn is_valid_agent_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix(AGENT_ID_PREFIX) else {
        return false;
    };
    let Some((ts, suffix)) = rest.split_once('-') else {
        return false;
    };
    !ts.is_empty()
        && ts.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// Validate an id, failing with `InvalidAgentId`
pub fn validate_agent_id(id: &str) -> Result<&str> {
    if is_valid_agent_id(id) {
        Ok(id)
    } else {
        Err(Error::InvalidAgentId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid_and_distinct() {
        let a = generate_agent_id();
        let b = generate_agent_id();
        assert!(is_valid_agent_id(&a), "{a}");
        assert!(is_valid_agent_id(&b), "{b}");
        assert_ne!(a, b);
        assert!(a.starts_with("agent-"));
    }

    #[test]
    fn test_rejects_malformed_ids() {
        for id in [
            "",
            "agent-",
            "agent-123",
            "agent-123-",
            "agent--abc",
            "agent-12a-abc",
            "agent-123-ABC",
            "agent-123-ab/c",
            "bot-123-abc",
            "123-abc",
            "agent-123-abc-def",
        ] {
            assert!(!is_valid_agent_id(id), "{id:?} should be rejected");
        }
    }

    #[test]
    fn test_accepts_known_shape() {
        assert!(is_valid_agent_id("agent-1717171717171-k3j9x0a1b2c"));
        assert_eq!(validate_agent_id("agent-1-a").unwrap(), "agent-1-a");
        assert!(matches!(
            validate_agent_id("nope"),
            Err(Error::InvalidAgentId(_))
        ));
    }
}
