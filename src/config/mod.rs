//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env fallbacks)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to the trace layer and clients at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the sampler and exclusion list are
//!   built from it exactly once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AppConfig, GoogleConfig, ListenerConfig, ObservabilityConfig, PubSubConfig, ReportMode,
    SamplerConfig, SamplerKind, SpeechConfig, TimeoutConfig, TraceConfig,
};
pub use validation::{validate_config, ValidationError};
