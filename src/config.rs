//! Client configuration: credentials, retry/timeout knobs, and service defaults.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{default_transient_error_codes, Error, Result};

/// `x-ms-version` sent with every request.
pub const DEFAULT_VERSION: &str = "2014-02-14";
/// Table-only `dataserviceversion` header.
pub const DEFAULT_DATA_SERVICE_VERSION: &str = "3.0";
/// `x-ms-client-request-id` sent when the caller doesn't override it.
pub const DEFAULT_CLIENT_ID: &str = "fast-azure-storage";

const DEFAULT_TIMEOUT_SECS: u32 = 30;
const DEFAULT_RETRIES: u32 = 5;
const DEFAULT_DELAY_FACTOR_MS: u64 = 100;
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.25;
const DEFAULT_MIN_SAS_AUTH_EXPIRY_MS: i64 = 900_000;
/// Extra milliseconds added on top of the server-side `timeout` to derive the
/// client-side deadline for the arrival of response headers.
const DEFAULT_CLIENT_TIMEOUT_DELAY_MS: u64 = 500;

/// OData metadata verbosity requested from the Table service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataLevel {
    NoMetadata,
    MinimalMetadata,
    FullMetadata,
}

impl MetadataLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            MetadataLevel::NoMetadata => "nometadata",
            MetadataLevel::MinimalMetadata => "minimalmetadata",
            MetadataLevel::FullMetadata => "fullmetadata",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "nometadata" => Ok(MetadataLevel::NoMetadata),
            "minimalmetadata" => Ok(MetadataLevel::MinimalMetadata),
            "fullmetadata" => Ok(MetadataLevel::FullMetadata),
            other => Err(Error::usage(format!("invalid metadata level: {other}"))),
        }
    }
}

impl Default for MetadataLevel {
    fn default() -> Self {
        MetadataLevel::FullMetadata
    }
}

/// Produces a fresh SAS query string on demand. Implementors typically call
/// out to a token broker; the client collapses concurrent calls into one
/// in-flight invocation (see [`crate::auth::sas`]).
#[async_trait]
pub trait SasProducer: Send + Sync {
    async fn produce(&self) -> Result<String>;
}

#[async_trait]
impl<F, Fut> SasProducer for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<String>> + Send,
{
    async fn produce(&self) -> Result<String> {
        (self)().await
    }
}

/// The one authentication mode installed on a client. Exactly one of these
/// is ever active; there is no dynamic rebinding at request time (§4.1, §9).
pub enum Credentials {
    /// Shared Key: account name plus base64-encoded account key.
    SharedKey { account: String, key: Vec<u8> },
    /// A pre-signed, static SAS query string appended verbatim to every URL.
    StaticSas { account: String, sas: String },
    /// A SAS whose lifecycle is driven by a producer callback.
    RefreshableSas {
        account: String,
        producer: Arc<dyn SasProducer>,
    },
}

impl Credentials {
    pub fn account(&self) -> &str {
        match self {
            Credentials::SharedKey { account, .. } => account,
            Credentials::StaticSas { account, .. } => account,
            Credentials::RefreshableSas { account, .. } => account,
        }
    }
}

impl std::fmt::Debug for Credentials {
    /// Never print the raw key or SAS signature; only the account and mode.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::SharedKey { account, .. } => {
                f.debug_struct("SharedKey").field("account", account).field("key", &"<redacted>").finish()
            }
            Credentials::StaticSas { account, .. } => {
                f.debug_struct("StaticSas").field("account", account).field("sas", &"<redacted>").finish()
            }
            Credentials::RefreshableSas { account, .. } => {
                f.debug_struct("RefreshableSas").field("account", account).finish()
            }
        }
    }
}

/// Called when an asynchronous SAS refresh fails, since there is no
/// synchronous call site to return the error to (§4.1, §7, §9).
pub type SasErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;

/// Immutable configuration for one service client, built with
/// [`ClientOptionsBuilder`].
pub struct ClientOptions {
    pub credentials: Credentials,
    pub version: String,
    pub data_service_version: String,
    pub metadata: MetadataLevel,
    pub client_id: String,
    pub timeout_secs: u32,
    pub client_timeout_delay_ms: u64,
    pub retries: u32,
    pub delay_factor_ms: u64,
    pub max_delay_ms: u64,
    pub randomization_factor: f64,
    pub transient_error_codes: HashSet<String>,
    pub min_sas_auth_expiry_ms: i64,
    pub on_sas_refresh_error: Option<SasErrorHandler>,
}

impl ClientOptions {
    pub fn builder(credentials: Credentials) -> ClientOptionsBuilder {
        ClientOptionsBuilder::new(credentials)
    }

    /// Client-side deadline, in ms, for the arrival of response headers
    /// (§9 open question, resolved as `timeout*1000 + clientTimeoutDelay`).
    pub fn client_timeout_ms(&self) -> u64 {
        u64::from(self.timeout_secs) * 1000 + self.client_timeout_delay_ms
    }
}

/// Builder for [`ClientOptions`]; mirrors the option table in the data model.
pub struct ClientOptionsBuilder {
    credentials: Credentials,
    version: String,
    data_service_version: String,
    metadata: MetadataLevel,
    client_id: String,
    timeout_secs: u32,
    client_timeout_delay_ms: u64,
    retries: u32,
    delay_factor_ms: u64,
    max_delay_ms: u64,
    randomization_factor: f64,
    transient_error_codes: Option<HashSet<String>>,
    min_sas_auth_expiry_ms: i64,
    on_sas_refresh_error: Option<SasErrorHandler>,
}

impl ClientOptionsBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            version: DEFAULT_VERSION.to_string(),
            data_service_version: DEFAULT_DATA_SERVICE_VERSION.to_string(),
            metadata: MetadataLevel::FullMetadata,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            client_timeout_delay_ms: DEFAULT_CLIENT_TIMEOUT_DELAY_MS,
            retries: DEFAULT_RETRIES,
            delay_factor_ms: DEFAULT_DELAY_FACTOR_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            transient_error_codes: None,
            min_sas_auth_expiry_ms: DEFAULT_MIN_SAS_AUTH_EXPIRY_MS,
            on_sas_refresh_error: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn metadata(mut self, level: MetadataLevel) -> Self {
        self.metadata = level;
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn client_timeout_delay_ms(mut self, ms: u64) -> Self {
        self.client_timeout_delay_ms = ms;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn delay_factor_ms(mut self, ms: u64) -> Self {
        self.delay_factor_ms = ms;
        self
    }

    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    pub fn transient_error_codes(mut self, codes: HashSet<String>) -> Self {
        self.transient_error_codes = Some(codes);
        self
    }

    pub fn min_sas_auth_expiry_ms(mut self, ms: i64) -> Self {
        self.min_sas_auth_expiry_ms = ms;
        self
    }

    pub fn on_sas_refresh_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.on_sas_refresh_error = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<ClientOptions> {
        if self.randomization_factor < 0.0 || self.randomization_factor > 1.0 {
            return Err(Error::usage("randomizationFactor must be in [0, 1]"));
        }
        Ok(ClientOptions {
            credentials: self.credentials,
            version: self.version,
            data_service_version: self.data_service_version,
            metadata: self.metadata,
            client_id: self.client_id,
            timeout_secs: self.timeout_secs,
            client_timeout_delay_ms: self.client_timeout_delay_ms,
            retries: self.retries,
            delay_factor_ms: self.delay_factor_ms,
            max_delay_ms: self.max_delay_ms,
            randomization_factor: self.randomization_factor,
            transient_error_codes: self.transient_error_codes.unwrap_or_else(default_transient_error_codes),
            min_sas_auth_expiry_ms: self.min_sas_auth_expiry_ms,
            on_sas_refresh_error: self.on_sas_refresh_error,
        })
    }
}
