//! Concrete AI backends.

mod gemini;

pub use gemini::{GeminiBackend, KEY_COOLDOWN, KeyPool};
