pub mod describe;
pub mod gemini;
pub mod generate;
pub mod media;
pub mod prompt;
pub mod shopping;
