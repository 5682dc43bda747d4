pub mod gateway;
pub mod metrics;
pub mod providers;

pub use gateway::{AiGateway, GatewayError, GatewayErrorKind};
