//! Persona and greeting text sent to the upstream model.

use anyhow::Context;
use std::{fs, path::Path};
use tracing::debug;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Vidya. Listen effectively. When the user speaks, they may interrupt you. If you hear them speak, stop immediately and address them. Make sure to speak in a tone in which the user is speaking with you. Your output must be concise. IMPORTANT: Detect the language the user is speaking and respond in that EXACT SAME language. If the user speaks Hindi, speak Hindi. If the user speaks Spanish, speak Spanish. Do not default to English.";

pub const DEFAULT_GREETING: &str =
    "Hello! Greet the user enthusiastically to start the conversation.";

#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub system_instruction: String,
    pub greeting: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl Prompts {
    /// Loads overrides from `system_instruction.md` and `greeting.md` in the
    /// given directory. Missing or blank files keep the built-in text.
    pub fn load(prompts_path: &Path) -> anyhow::Result<Self> {
        let mut prompts = Self::default();
        for entry in fs::read_dir(prompts_path)
            .with_context(|| format!("Could not read prompts from {}", prompts_path.display()))?
        {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let slot = match key {
                "system_instruction" => &mut prompts.system_instruction,
                "greeting" => &mut prompts.greeting,
                _ => {
                    debug!(file = %path.display(), "Ignoring unknown prompt file.");
                    continue;
                }
            };
            let content = fs::read_to_string(&path)?;
            let content = content.trim();
            if !content.is_empty() {
                *slot = content.to_string();
            }
        }
        Ok(prompts)
    }
}
