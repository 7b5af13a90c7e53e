mod core;
mod endpoint;
mod observability;
mod stubs;
mod validation;

pub use self::core::Config;
pub use endpoint::ActionEndpointConfig;
pub use observability::ObservabilityConfig;
pub use stubs::StubConfig;
pub use validation::ValidationConfig;
