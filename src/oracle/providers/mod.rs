pub mod chat_completion;
pub mod detect_endpoint;

pub use chat_completion::ChatCompletionOracle;
pub use detect_endpoint::DetectEndpointOracle;
