use anyhow::Context;

/// Where we store secrets in the OS keyring.
///
/// This is intentionally constant so upgrades don't orphan secrets.
const SERVICE: &str = "clipwright";

/// Checked in order before the keyring.
pub const API_KEY_ENV_VARS: [&str; 2] = ["CLIPWRIGHT_API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    ProviderApiKey,
}

impl SecretKey {
    fn user(self) -> &'static str {
        match self {
            SecretKey::ProviderApiKey => "provider_api_key",
        }
    }
}

fn entry(key: SecretKey) -> anyhow::Result<keyring::Entry> {
    keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")
}

pub fn set_secret(key: SecretKey, value: &str) -> anyhow::Result<()> {
    entry(key)?.set_password(value).context("set secret")
}

pub fn get_secret(key: SecretKey) -> anyhow::Result<Option<String>> {
    match entry(key)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
    }
}

pub fn delete_secret(key: SecretKey) -> anyhow::Result<()> {
    match entry(key)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)).context("delete secret"),
    }
}

fn first_non_blank(values: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    values
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Environment first, then the keyring. A keyring that cannot be reached
/// (headless session, no secret service) counts as "no key".
pub fn resolve_api_key() -> Option<String> {
    let from_env = first_non_blank(API_KEY_ENV_VARS.iter().map(|v| std::env::var(v).ok()));
    if from_env.is_some() {
        return from_env;
    }

    match get_secret(SecretKey::ProviderApiKey) {
        Ok(v) => first_non_blank([v]),
        Err(e) => {
            log::warn!("keyring unavailable: {e:#}");
            None
        }
    }
}
