mod chat;
mod claude;
mod message;
mod opencode;
mod output;
mod spawner;
mod traits;

pub use chat::{ChatCompletionsGenerator, DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL};
pub use claude::ClaudeCodeGenerator;
pub use message::{flatten_messages, ChatMessage, Role};
pub use opencode::OpenCodeGenerator;
pub use output::ProcessOutput;
pub use spawner::ProcessSpawner;
pub use traits::{Backend, Generator, GeneratorConfig, GeneratorError};

/// Create a generator by backend
pub fn create_generator(backend: Backend, config: GeneratorConfig) -> Box<dyn Generator> {
    match backend {
        Backend::ChatCompletions => Box::new(ChatCompletionsGenerator::from_config(config)),
        Backend::ClaudeCode => Box::new(ClaudeCodeGenerator::new(config)),
        Backend::OpenCode => Box::new(OpenCodeGenerator::new(config)),
    }
}
