//! Portal credential lookup.
//!
//! Credential storage and decryption belong to the surrounding deployment;
//! the cycle only needs a way to ask for a company's portal login and a
//! failure mode that fails that company alone.

use anyhow::{Context, Result};
use vdx_portal::PortalCredentials;

use crate::store::Company;

/// Source of portal credentials for a company.
pub trait CredentialSource: Send + Sync {
    fn credentials_for(&self, company: &Company) -> Result<PortalCredentials>;
}

/// Environment-backed source: one portal account for the whole deployment,
/// read from `VDX_PORTAL_USERNAME` / `VDX_PORTAL_PASSWORD`.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    pub const ENV_USERNAME: &'static str = "VDX_PORTAL_USERNAME";
    pub const ENV_PASSWORD: &'static str = "VDX_PORTAL_PASSWORD";
}

impl CredentialSource for EnvCredentials {
    fn credentials_for(&self, _company: &Company) -> Result<PortalCredentials> {
        let username = std::env::var(Self::ENV_USERNAME)
            .with_context(|| format!("missing env var {}", Self::ENV_USERNAME))?;
        let password = std::env::var(Self::ENV_PASSWORD)
            .with_context(|| format!("missing env var {}", Self::ENV_PASSWORD))?;
        Ok(PortalCredentials { username, password })
    }
}
