// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const WS_PATH: &str = "ws";
pub const HEALTH_PATH: &str = "health";

// Admission control
pub const DEFAULT_RATE_PER_SECOND: f64 = 100.0;
pub const DEFAULT_BURST_LIMIT: f64 = 100.0;
pub const DEFAULT_BLOCK_SECS: u64 = 60;
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
// Upper bound for every configured duration
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

// Connection keep-alive
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4096;

// Session cookie carrying the signed token
pub const SESSION_COOKIE: &str = "sessionID";

// Shown in place of a last message for users who never talked
pub const NO_MESSAGES_PLACEHOLDER: &str = "Say hi 👋";
