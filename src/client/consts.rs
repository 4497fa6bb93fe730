pub const HUME_API_KEY: &str = "HUME_API_KEY";

pub const BASE_URL: &str = "https://api.hume.ai";
pub const WEBSOCKET_URL: &str = "wss://api.hume.ai";

pub const API_KEY_HEADER: &str = "X-Hume-Api-Key";

pub const CHAT_PATH: &str = "/v0/evi/chat";
pub const STREAM_PATH: &str = "/v0/stream/models";
pub const BATCH_JOBS_PATH: &str = "/v0/batch/jobs";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
