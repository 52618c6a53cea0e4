//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig::default()  (or ::with_env(EnvSnapshot::capture()))
//!     → caller overrides fields / loader.rs merges a TOML overlay
//!     → validation.rs (semantic checks, at construction)
//!     → ServerConfig (validated)
//!     → consumed by the assembler, shared pieces move into AppState
//! ```
//!
//! # Design Decisions
//! - The environment is read once into an [`EnvSnapshot`] and injected;
//!   nothing else in the crate touches process environment variables
//! - All fields have defaults so a zero-config server works
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::EnvSnapshot;
pub use loader::{load_config, load_config_with_env};
pub use schema::{
    BasicAuthConfig, CacheControlConfig, CacheRule, CompressConfig, CorsConfig, CspConfig,
    FaviconConfig, HelmetConfig, I18nConfig, JsonConfig, MetaEntry, MethodOverrideSource,
    ObservabilityConfig, PassportConfig, Protocol, RateLimitConfig, RedirectLoopConfig,
    ResponseCacheConfig, RouterHook, SameSitePolicy, ServerConfig, SessionConfig, SidGenerator,
    SslConfig, StaticConfig, TimeoutConfig, UserLoader, ViewsConfig,
};
pub use validation::{validate_config, ValidationError};
