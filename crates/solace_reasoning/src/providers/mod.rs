pub mod mock;
pub mod openai;
pub(crate) mod sse;

pub use mock::MockProvider;
pub use openai::GatewayClient;
