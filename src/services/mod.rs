pub mod aggregator; // Concurrent fan-out over providers
pub mod diffusion; // Local Stable Diffusion
pub mod extractor;
pub mod food_info;
pub mod gateway;
pub mod gemini; // Google Gemini (text + image)
pub mod media;
pub mod openai; // OpenAI chat completions

pub use diffusion::DiffusionGateway;
pub use gateway::ProviderGateway;
pub use gemini::GeminiGateway;
pub use media::MediaPersister;
pub use openai::OpenAiGateway;
