use std::env;
use std::str::FromStr;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the dev identity bypass and log format.
    pub env: Env,
    // Which `Repository` implementation backs the gateway.
    pub store_backend: StoreBackend,
    // Database connection string (Postgres). Empty when the memory backend is used.
    pub db_url: String,
    // S3-compatible storage endpoint URL (MinIO locally).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // Bucket holding notes, homework files, submissions and videos.
    pub s3_bucket: String,
    // Secret used to sign and verify access/refresh JWTs.
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    // External identity service that checks email/password pairs.
    pub identity_url: String,
    pub identity_api_key: String,
    pub bind_addr: String,
    // Allowed CORS origin. `None` allows any origin.
    pub cors_origin: Option<String>,
}

/// Env
///
/// Runtime context: local development (MinIO, header identity bypass, pretty logs)
/// or production (hardened auth, JSON logs).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// Safe, non-panicking configuration for tests. Uses the in-memory store.
    fn default() -> Self {
        Self {
            env: Env::Local,
            store_backend: StoreBackend::Memory,
            db_url: String::new(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "classroom-test".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            identity_url: "http://localhost:9999".to_string(),
            identity_api_key: "local-identity-key".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            cors_origin: None,
        }
    }
}

/// Reads a numeric variable, falling back to `default` when unset or unparsable.
fn env_number<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable numeric setting");
            default
        }),
        Err(_) => default,
    }
}

fn required(key: &str, env: &Env) -> String {
    env::var(key).unwrap_or_else(|_| panic!("FATAL: {key} must be set in {env:?} mode."))
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables at startup.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing. In
    /// production that is every infrastructure secret; locally only `DATABASE_URL`,
    /// and only when the Postgres backend is selected.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let access_token_ttl_secs = env_number("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS);
        let refresh_token_ttl_secs =
            env_number("REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let cors_origin = env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty());

        match env {
            Env::Local => {
                let store_backend = match env::var("STORE_BACKEND").as_deref() {
                    Ok("memory") => StoreBackend::Memory,
                    _ => StoreBackend::Postgres,
                };
                let db_url = match store_backend {
                    StoreBackend::Postgres => required("DATABASE_URL", &env),
                    StoreBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
                };

                Self {
                    env: Env::Local,
                    store_backend,
                    db_url,
                    // Local storage (MinIO) uses known default credentials.
                    s3_endpoint: "http://localhost:9000".to_string(),
                    s3_region: "us-east-1".to_string(),
                    s3_key: "admin".to_string(),
                    s3_secret: "password".to_string(),
                    s3_bucket: "classroom-uploads".to_string(),
                    jwt_secret: env::var("JWT_SECRET")
                        .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                    access_token_ttl_secs,
                    refresh_token_ttl_secs,
                    identity_url: env::var("IDENTITY_URL")
                        .unwrap_or_else(|_| "http://localhost:9999".to_string()),
                    identity_api_key: env::var("IDENTITY_API_KEY")
                        .unwrap_or_else(|_| "local-identity-key".to_string()),
                    bind_addr,
                    cors_origin,
                }
            }
            Env::Production => Self {
                db_url: required("DATABASE_URL", &env),
                s3_endpoint: required("S3_ENDPOINT", &env),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_key: required("S3_ACCESS_KEY", &env),
                s3_secret: required("S3_SECRET_KEY", &env),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "classroom-uploads".to_string()),
                jwt_secret: required("JWT_SECRET", &env),
                identity_url: required("IDENTITY_URL", &env),
                identity_api_key: required("IDENTITY_API_KEY", &env),
                // Production always persists to Postgres.
                store_backend: StoreBackend::Postgres,
                env: Env::Production,
                access_token_ttl_secs,
                refresh_token_ttl_secs,
                bind_addr,
                cors_origin,
            },
        }
    }
}
