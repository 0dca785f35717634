pub mod files;
pub mod openai;
pub mod traits;

pub use files::AudioFileStore;
pub use openai::OpenAiSpeech;
pub use traits::{SpeechRenderer, VoiceInfo};
