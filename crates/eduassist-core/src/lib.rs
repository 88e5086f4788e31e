pub mod config;
pub mod gateway;
pub mod session;
pub mod signing;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use config::{Config, ConfigError, Credentials, GatewayConfig};
pub use gateway::{Completion, CompletionError, CompletionGateway, CompletionRequest, INSTRUCTION_PREFIX};
pub use session::{reply_text, PendingCompletion, Session};
pub use state::{Role, Turn};
pub use transcript::Transcript;
