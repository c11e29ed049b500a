pub mod config;
pub mod prompt_loader;
pub mod speech;
pub mod transcript_input;
