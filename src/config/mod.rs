pub mod schema;

pub use schema::{ActionEndpointConfig, Config, ObservabilityConfig, StubConfig, ValidationConfig};
