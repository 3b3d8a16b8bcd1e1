//! Deployer private key parsing.

use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;

/// Environment variable read when the key is given as `env`.
pub const PRIVATE_KEY_ENV: &str = "DEPLOYER_PRIVKEY";

/// Parse a deployer key: 64 hex characters with an optional `0x` prefix, or the literal
/// `env` to read it from [`PRIVATE_KEY_ENV`].
pub fn parse_private_key(input: &str) -> anyhow::Result<PrivateKeySigner> {
    let input = input.trim();
    if input == "env" {
        let key = std::env::var(PRIVATE_KEY_ENV).with_context(|| {
            format!("Private key requested from the environment but {PRIVATE_KEY_ENV} is not set")
        })?;
        return parse_hex_key(&key);
    }
    parse_hex_key(input)
}

fn parse_hex_key(key: &str) -> anyhow::Result<PrivateKeySigner> {
    let key = key.trim();
    let hex = key.strip_prefix("0x").unwrap_or(key);
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid private key, expected 64 hex characters");
    }

    hex.parse::<PrivateKeySigner>()
        .context("Invalid private key")
}
