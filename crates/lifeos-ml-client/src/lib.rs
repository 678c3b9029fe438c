//! Thin, retrying clients for the external AI services.

pub mod error;
pub mod openai;
pub mod twelvelabs;

pub use error::{MlError, MlResult};
pub use openai::{ChatMessage, OpenAiClient, OpenAiConfig};
pub use twelvelabs::{TaskState, TwelveLabsClient, TwelveLabsConfig};
