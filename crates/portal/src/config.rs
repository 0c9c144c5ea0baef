//! Portal settings read from Rocket's figment (the `[default.portal]` table of
//! `Rocket.toml`, or `ROCKET_PORTAL={...}` in the environment).

use std::{path::PathBuf, sync::Arc};

use payments::{
    gateway::{DEFAULT_API_BASE, DEFAULT_CHECKOUT_SCRIPT},
    HostedGateway, OfflineGateway, PaymentGateway,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Absolute URL the portal is reachable at, without a trailing slash.
    pub base_url: String,
    pub upload_dir: PathBuf,
    pub currency: String,
    pub payments: PaymentsConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            currency: "INR".to_string(),
            payments: PaymentsConfig::default(),
        }
    }
}

impl PortalConfig {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    /// Payments are confirmed on a page served by the portal itself.
    Offline,
    Gateway,
}

/// Signing secret used when none is configured. Only good for offline mode.
const OFFLINE_SECRET: &str = "offline-development-secret";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    pub mode: PaymentMode,
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
    pub checkout_script: String,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("mode", &self.mode)
            .field("key_id", &self.key_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            mode: PaymentMode::Offline,
            key_id: String::new(),
            key_secret: OFFLINE_SECRET.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            checkout_script: DEFAULT_CHECKOUT_SCRIPT.to_string(),
        }
    }
}

impl PaymentsConfig {
    pub fn gateway(&self) -> Result<Arc<dyn PaymentGateway>, &'static str> {
        match self.mode {
            PaymentMode::Offline => {
                tracing::warn!("payments are in offline mode; no money will be collected");
                Ok(Arc::new(OfflineGateway::new(self.key_secret.clone())))
            }
            PaymentMode::Gateway => {
                if self.key_id.trim().is_empty() {
                    return Err("gateway payments need a key_id");
                }
                if self.key_secret.trim().is_empty()
                    || self.key_secret == OFFLINE_SECRET
                {
                    return Err("gateway payments need a key_secret");
                }
                Ok(Arc::new(HostedGateway::new(
                    &self.api_base,
                    self.key_id.clone(),
                    self.key_secret.clone(),
                    self.checkout_script.clone(),
                )))
            }
        }
    }
}

/// The gateway payments are made through, as managed state.
pub type Gateway = Arc<dyn PaymentGateway>;
