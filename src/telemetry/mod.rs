//! Process-wide observability: a `LazyLock<Metrics>` singleton and the
//! dedicated `/metrics` listener it is served from (spec §A.6).

pub mod registry;
pub mod server;

pub use registry::Metrics;
pub use server::start_metrics_server;
