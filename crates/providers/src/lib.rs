pub mod openai;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use openai::OpenAiAssistants;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedProvider;
pub use traits::{
    AssistantSpec, AssistantsApi, ContentPart, FileUpload, OutgoingMessage, ProviderMessage,
    ProviderRun, RunError, RunStatus, TextValue, TitleSummarizer,
};
pub use util::resolve_api_key;
