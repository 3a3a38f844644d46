//! vdx-portal
//!
//! Upstream portal boundary. This crate owns the client abstraction and the
//! concrete Cantaloupe-backed client. It does **not** parse DEX documents or
//! write to the DB; the collector fetches raw text here and hands it to
//! vdx-dex / vdx-db.
//!
//! The upstream API is undocumented and observed, not specified: the
//! concrete client is deliberately thin, and everything above it programs
//! against [`PortalClient`] so cycles are testable without a network.

pub mod cantaloupe;

use std::fmt;

use async_trait::async_trait;
use vdx_schemas::UpstreamDexRecord;

pub use cantaloupe::CantaloupeClient;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Portal login credentials. Read from env by callers; never logged.
#[derive(Clone)]
pub struct PortalCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("username", &self.username)
            .field("password", &"REDACTED")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`PortalClient`] implementation may return.
///
/// The collector maps these onto its failure-isolation rules: `Auth` fails
/// the whole company, everything else skips just the affected record.
#[derive(Debug)]
pub enum PortalError {
    /// Network or transport failure.
    Transport(String),
    /// The upstream portal returned an application-level error.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// Login failed or the session expired.
    Auth(String),
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalError::Transport(msg) => write!(f, "transport error: {msg}"),
            PortalError::Api { status, message } => {
                write!(f, "portal api error status={status}: {message}")
            }
            PortalError::Decode(msg) => write!(f, "decode error: {msg}"),
            PortalError::Auth(msg) => write!(f, "auth error: {msg}"),
        }
    }
}

impl std::error::Error for PortalError {}

impl PortalError {
    /// Auth failures abort the company's cycle; the rest skip one record.
    pub fn is_fatal_for_company(&self) -> bool {
        matches!(self, PortalError::Auth(_))
    }
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Upstream portal contract.
///
/// Object-safe so callers can hold a `Box<dyn PortalClient>`; `Send + Sync`
/// so clients cross async task boundaries.
#[async_trait]
pub trait PortalClient: Send + Sync {
    /// Human-readable name identifying this portal (e.g. `"cantaloupe"`).
    fn name(&self) -> &'static str;

    /// Establish a session. Must be called before the fetch methods.
    async fn login(&self, credentials: &PortalCredentials) -> Result<(), PortalError>;

    /// Fetch the portal's full DEX metadata listing for the account.
    ///
    /// Returns records in the order supplied upstream; the selector decides
    /// which are worth fetching.
    async fn fetch_dex_metadata(&self) -> Result<Vec<UpstreamDexRecord>, PortalError>;

    /// Fetch one raw DEX document by upstream id.
    async fn fetch_raw_dex(&self, dex_id: i64) -> Result<String, PortalError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
