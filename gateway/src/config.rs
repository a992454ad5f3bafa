//! Configuration module for environment variable parsing.
//!
//! All settings come from the environment and are fixed after start-up.

use std::env;
use tracing::warn;

use crate::crypto::MessageCrypt;
use crate::error::Result;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token shared with the platform, used for every signature
    pub token: String,

    /// Account app id, embedded in every encrypted envelope
    pub app_id: String,

    /// 43-character EncodingAESKey; only needed for safe mode
    pub encoding_aes_key: Option<String>,

    /// Skip query signature validation (trusted callers, local testing)
    pub skip_signature: bool,

    /// Route the platform calls for verification and messages
    pub callback_path: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Prefix for the echo handler's text replies
    pub reply_text_prefix: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            token: String::new(),
            app_id: String::new(),
            encoding_aes_key: None,
            skip_signature: false,
            callback_path: "/wechat".to_string(),
            port: 8080,
            reply_text_prefix: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            token: env::var("WECHAT_TOKEN").unwrap_or(defaults.token),

            app_id: env::var("WECHAT_APP_ID").unwrap_or(defaults.app_id),

            encoding_aes_key: parse_optional("WECHAT_ENCODING_AES_KEY"),

            skip_signature: parse_bool("WECHAT_SKIP_SIGNATURE", defaults.skip_signature),

            callback_path: parse_optional("WECHAT_CALLBACK_PATH")
                .map(|p| normalize_path(&p))
                .unwrap_or(defaults.callback_path),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),

            reply_text_prefix: parse_optional("REPLY_TEXT_PREFIX"),
        }
    }

    /// Credentials for signing and envelope encryption.
    pub fn message_crypt(&self) -> Result<MessageCrypt> {
        MessageCrypt::new(&self.token, &self.app_id, self.encoding_aes_key.as_deref())
    }
}

/// Read a variable, treating blank values as unset.
fn parse_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean flag like "true", "1", "yes".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
