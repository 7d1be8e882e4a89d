/// Constants module to avoid magic numbers in the codebase

// Document Languages
pub const DETECTED_LANGUAGES: &[&str] = &[
    "javascript",
    "javascriptreact",
    "typescript",
    "typescriptreact",
];

// Cache Persistence
pub const CACHE_FILE_NAME: &str = "cache.bin";
pub const CACHE_RECORD_LEN: usize = 20; // 8 key + 4 last-used + 4 original + 4 compressed
pub const PERSIST_DEBOUNCE_MS: u64 = 30_000;
pub const CACHE_RETENTION_DAYS: u64 = 14;

// Timeouts
pub const SERIALIZE_SETTLE_TIMEOUT_SECS: u64 = 5;

// Bundler
pub const ESBUILD_PACKAGE_JSON: &str = r#"{"dependencies":{"esbuild":"latest"}}"#;
