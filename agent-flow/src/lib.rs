pub mod error;
pub mod gateway;
pub mod storage;

// Re-export commonly used types
pub use error::{FlowError, Result};
pub use gateway::{
    AgentGateway, CallPolicy, GatewayError, GenerateOptions, ResponseShape, extract_json,
    generate_with_policy,
};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};
