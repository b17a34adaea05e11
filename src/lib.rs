// SaoDB - A federated query engine for semantic aggregate objects
// Root library module

pub mod builders;
pub mod chain;
pub mod config;
pub mod errors;
pub mod http_types;
pub mod metrics;
pub mod observability;
pub mod operators;
pub mod optimizer;
pub mod parser;
pub mod poller;
pub mod render;
pub mod runtime;
pub mod store;
pub mod types;
pub mod value;

// Re-export key types
pub use observability::{init_logging, init_logging_with_level, with_trace_id};

pub use errors::QueryError;

// Re-export the value model
pub use value::{GroupKey, KeyPart, LinkRef, ObjectGrouping, Sao, Value};

// Re-export validated types
pub use types::{ValidatedObjectId, ValidatedSourceName, ValidatedTypeList};

// Re-export the query surface
pub use chain::{Chain, LiteralValue, Span, Step, StepKind};
pub use parser::parse_query;
pub use runtime::{lookup_operator, run_query, Arity, Evaluator, QueryOptions};

// Re-export the store
pub use store::{ObjectStore, ProviderState, ProviderStatus, StoreSnapshot};

// Re-export the poller and configuration
pub use config::{default_config_path, load_or_init, parse_providers, ProviderEntry};
pub use http_types::{parse_sao_payload, HelloResponse, ProviderMode};
pub use poller::{spawn_pollers, PollerSet};

// Re-export builders
pub use builders::SaoBuilder;

// Re-export rendering and profiling
pub use metrics::{ProfileLine, ProfileReport, QueryProfiler};
pub use render::render_value;
