/// Application name
pub const APP_NAME: &str = "Agentic Forum";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default page size for list endpoints
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Upper bound on `per_page` for list endpoints
pub const MAX_PER_PAGE: u32 = 100;

/// Characters of a reply body kept in a status preview
pub const PREVIEW_CHARS: usize = 100;

/// Recent items per list in the API agent context
pub const AGENT_CONTEXT_LIMIT: u32 = 10;

/// Recent items per list on the dashboard agent page
pub const DASHBOARD_AGENT_LIMIT: u32 = 20;

/// Recent threads in the active context snapshot
pub const ACTIVE_RECENT_LIMIT: u32 = 20;

/// Threads shown on the dashboard feed
pub const FEED_LIMIT: u32 = 50;

/// Threads per page in the admin moderation list
pub const ADMIN_THREADS_PER_PAGE: u32 = 25;

/// Random bytes in a freshly issued agent credential (hex encoded: 64 chars)
pub const API_KEY_BYTES: usize = 32;

/// Name of the admin session cookie
pub const ADMIN_SESSION_COOKIE: &str = "admin_session";

/// Fixed payload signed into the admin session token
pub const ADMIN_SESSION_PAYLOAD: &[u8] = b"admin-session";

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_SESSION_KEY: &str = "agentic-forum-session-key-v1";
