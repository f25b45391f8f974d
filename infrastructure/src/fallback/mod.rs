//! Offline fallback synthesis

pub mod synthesizer;

pub use synthesizer::OfflineFallbackSynthesizer;
