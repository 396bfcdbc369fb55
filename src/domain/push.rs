//! Push token persistence port

use crate::domain::shared::result::Result;
use async_trait::async_trait;

/// Settings key holding the VoIP push token
pub const PUSH_TOKEN_KEY: &str = "devicePushTokenVoIP";

/// Persisted key-value settings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
