//! Server configuration from the environment.

use canvasboard_core::elements::UserId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const ADDR_VAR: &str = "CANVASBOARD_ADDR";
pub const TOKENS_VAR: &str = "CANVASBOARD_TOKENS";
pub const DATA_DIR_VAR: &str = "CANVASBOARD_DATA_DIR";
pub const HISTORY_LIMIT_VAR: &str = "CANVASBOARD_HISTORY_LIMIT";

const DEFAULT_ADDR: &str = "0.0.0.0:3030";
/// Default `limit` of the history endpoint.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secret: {0}")]
    MissingSecret(&'static str),
    #[error("invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Bearer token to user id.
    pub tokens: HashMap<String, UserId>,
    /// Enables on-disk persistence when set.
    pub data_dir: Option<PathBuf>,
    pub history_limit: u32,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = lookup(ADDR_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr.trim().parse().map_err(|e| ConfigError::Invalid {
            var: ADDR_VAR,
            message: format!("{addr}: {e}"),
        })?;

        let tokens = parse_tokens(&lookup(TOKENS_VAR).unwrap_or_default())?;

        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let history_limit = match lookup(HISTORY_LIMIT_VAR).filter(|v| !v.trim().is_empty()) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: HISTORY_LIMIT_VAR,
                        message: format!("expected a positive integer, got {raw}"),
                    });
                }
            },
            None => DEFAULT_HISTORY_LIMIT,
        };

        Ok(Self {
            addr,
            tokens,
            data_dir,
            history_limit,
        })
    }
}

/// Parse `token=user,token=user`.
fn parse_tokens(raw: &str) -> Result<HashMap<String, UserId>, ConfigError> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (token, user) = pair
            .split_once('=')
            .map(|(t, u)| (t.trim(), u.trim()))
            .filter(|(t, u)| !t.is_empty() && !u.is_empty())
            .ok_or_else(|| ConfigError::Invalid {
                var: TOKENS_VAR,
                message: format!("expected token=user_id, got {pair:?}"),
            })?;
        tokens.insert(token.to_string(), user.to_string());
    }
    if tokens.is_empty() {
        return Err(ConfigError::MissingSecret(TOKENS_VAR));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[(TOKENS_VAR, "secret=alice")])).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3030".parse().unwrap());
        assert_eq!(config.tokens.get("secret").map(String::as_str), Some("alice"));
        assert!(config.data_dir.is_none());
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_tokens_are_required() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[])),
            Err(ConfigError::MissingSecret(TOKENS_VAR))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(TOKENS_VAR, " , ")])),
            Err(ConfigError::MissingSecret(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(TOKENS_VAR, "no-user")])),
            Err(ConfigError::Invalid { var: TOKENS_VAR, .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (TOKENS_VAR, "a=alice, b = bob"),
            (ADDR_VAR, "127.0.0.1:8080"),
            (DATA_DIR_VAR, "/var/lib/canvasboard"),
            (HISTORY_LIMIT_VAR, "20"),
        ]))
        .unwrap();
        assert_eq!(config.tokens.len(), 2);
        assert_eq!(config.tokens["b"], "bob");
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/canvasboard")));
        assert_eq!(config.history_limit, 20);
    }

    #[test]
    fn test_invalid_values() {
        let bad_addr =
            ServerConfig::from_lookup(lookup(&[(TOKENS_VAR, "a=b"), (ADDR_VAR, "nowhere")]));
        assert!(matches!(bad_addr, Err(ConfigError::Invalid { var: ADDR_VAR, .. })));
        let bad_limit =
            ServerConfig::from_lookup(lookup(&[(TOKENS_VAR, "a=b"), (HISTORY_LIMIT_VAR, "0")]));
        assert!(matches!(bad_limit, Err(ConfigError::Invalid { var: HISTORY_LIMIT_VAR, .. })));
    }
}
