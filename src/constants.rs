// -
// API bases

pub(crate) const NODE_API_BASE: &str = "x-nmos/node/v1.0";
pub(crate) const REGISTRATION_API_BASE: &str = "x-nmos/registration/v1.0";
pub(crate) const QUERY_API_BASE: &str = "x-nmos/query/v1.0";
pub(crate) const API_VERSION: &str = "v1.0";

// -
// Discovery

/// DNS-SD service types, fully qualified for mDNS
pub const NODE_SERVICE: &str = "_nmos-node._tcp.local.";
pub const REGISTRATION_SERVICE: &str = "_nmos-registration._tcp.local.";
pub const QUERY_SERVICE: &str = "_nmos-query._tcp.local.";

/// TXT record keys
pub(crate) const TXT_PRIORITY: &str = "pri";
pub(crate) const TXT_API_VERSION: &str = "api_ver";
pub(crate) const TXT_API_PROTO: &str = "api_proto";

// -
// Lifecycle timings (milliseconds)

pub(crate) const DEFAULT_SETTLE_WINDOW_MS: u64 = 5_000;
pub(crate) const DEFAULT_WATCHDOG_MS: u64 = 10_000;
pub(crate) const DEFAULT_RESET_DELAY_MS: u64 = 5_000;
pub(crate) const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5_000;
pub(crate) const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 4_000;
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 4_000;
pub(crate) const DEFAULT_HEALTH_EXPIRY_MS: u64 = 12_000;
pub(crate) const DEFAULT_REAP_INTERVAL_MS: u64 = 1_000;
pub(crate) const DEFAULT_PRIORITY: i64 = 100;

// -
// Grains

pub(crate) const GRAIN_TYPE_EVENT: &str = "event";
pub(crate) const GRAIN_PAYLOAD_TYPE: &str = "urn:x-nmos:format:data.event";
