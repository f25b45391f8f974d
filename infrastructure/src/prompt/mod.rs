//! Prompt building adapters

pub mod builder;

pub use builder::ReconsiderationPromptBuilder;
