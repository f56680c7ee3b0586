//! Generation-splice pipeline: a free-text prompt plus style preferences in,
//! a document mutation out.
//!
//! The composed instruction is prompt engineering, not a protocol contract:
//! the service is asked for no top-level heading and a detailed,
//! well-structured answer, and the preferences are folded in as plain
//! sentences. On any failure the document is left untouched.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::editor::EditorHandle;
use crate::markdown;
use crate::store::NoteStore;

// ── Preferences ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

impl Length {
    pub fn as_str(&self) -> &'static str {
        match self {
            Length::Short => "short",
            Length::Medium => "medium",
            Length::Long => "long",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "short" => Ok(Length::Short),
            "medium" => Ok(Length::Medium),
            "long" => Ok(Length::Long),
            _ => Err(format!("Invalid length: {}", s)),
        }
    }

    /// Map the 1–100 preference slider to a label: >66 long, >33 medium,
    /// otherwise short.
    pub fn from_slider(value: u8) -> Self {
        if value > 66 {
            Length::Long
        } else if value > 33 {
            Length::Medium
        } else {
            Length::Short
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Normal,
    Formal,
    Concise,
    Descriptive,
    Practical,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Normal => "normal",
            Tone::Formal => "formal",
            Tone::Concise => "concise",
            Tone::Descriptive => "descriptive",
            Tone::Practical => "practical",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "normal" => Ok(Tone::Normal),
            "formal" => Ok(Tone::Formal),
            "concise" => Ok(Tone::Concise),
            "descriptive" => Ok(Tone::Descriptive),
            "practical" => Ok(Tone::Practical),
            _ => Err(format!("Invalid tone: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Structure {
    Paragraphs,
    Points,
    #[default]
    Normal,
}

impl Structure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Structure::Paragraphs => "paragraphs",
            Structure::Points => "points",
            Structure::Normal => "normal",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "paragraphs" => Ok(Structure::Paragraphs),
            "points" => Ok(Structure::Points),
            "normal" => Ok(Structure::Normal),
            _ => Err(format!("Invalid structure: {}", s)),
        }
    }
}

/// Style preferences attached to a generation request. Defaults match the
/// preference widget's reset state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub length: Length,
    pub tone: Tone,
    pub structure: Structure,
}

/// Ephemeral request: never persisted.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub preferences: Preferences,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            preferences: Preferences::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("a generation request is already in flight")]
    Busy,
    #[error("generation request failed: {0}")]
    Service(#[source] ApiError),
    #[error("editor is not initialized")]
    EditorUninitialized,
}

// ── Prompt composition ─────────────────────────────────────────────────────

/// Compose the instruction sent to the generation service. Preference
/// sentences are only added when they deviate from the defaults the model
/// already tends toward; the trailing no-heading directive is always there.
pub fn compose_prompt(prompt: &str, preferences: &Preferences) -> String {
    let mut composed = prompt.trim().to_string();

    composed.push_str(&format!(
        "\n\nPreferred length of the answer: {}.",
        preferences.length.as_str()
    ));
    if preferences.tone != Tone::Normal {
        composed.push_str(&format!(" Tone: {}.", preferences.tone.as_str()));
    }
    match preferences.structure {
        Structure::Paragraphs => {
            composed.push_str(" Structure the answer as flowing paragraphs.")
        }
        Structure::Points => composed.push_str(" Structure the answer as bullet points."),
        Structure::Normal => {}
    }

    composed.push_str(
        "\n\nAdditional context: do not include main heading for the generated content. \n Make answer detailed and well structured.",
    );
    composed
}

// ── Pipeline ───────────────────────────────────────────────────────────────

/// Runs the full prompt → generated markdown → fragment → splice pipeline.
/// One request at a time: the in-flight flag is what the UI disables the
/// submit control on.
pub struct Generator {
    api: ApiClient,
    in_flight: AtomicBool,
}

impl Generator {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a request is currently outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Generate content for the prompt and splice it into the editor's
    /// document at the caret, as a single undoable transaction. Marks the
    /// store's unsaved flag on success.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        editor: &EditorHandle,
        store: &NoteStore,
    ) -> Result<(), GenerateError> {
        if request.prompt.trim().is_empty() {
            return Err(GenerateError::EmptyPrompt);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GenerateError::Busy);
        }

        let result = self.run(request, editor, store).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run(
        &self,
        request: &GenerateRequest,
        editor: &EditorHandle,
        store: &NoteStore,
    ) -> Result<(), GenerateError> {
        let composed = compose_prompt(&request.prompt, &request.preferences);
        let response = self.api.generate(&composed).await.map_err(|e| {
            warn!("generation request failed: {}", e);
            GenerateError::Service(e)
        })?;

        let mut fragment = markdown::parse_fragment(&response);
        markdown::clean_code_blocks(&mut fragment);
        if fragment.is_empty() {
            return Ok(());
        }

        {
            let mut slot = editor.lock().expect("editor slot lock");
            let editor = slot.as_mut().ok_or(GenerateError::EditorUninitialized)?;
            editor.insert_fragment(&fragment);
        }
        store.set_has_unsaved_changes(true);
        info!(blocks = fragment.blocks.len(), "generated content spliced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_prompt_defaults() {
        let composed = compose_prompt("Explain closures", &Preferences::default());
        assert!(composed.starts_with("Explain closures"));
        assert!(composed.contains("Preferred length of the answer: medium."));
        assert!(!composed.contains("Tone:"));
        assert!(!composed.contains("Structure the answer"));
        assert!(composed.contains("do not include main heading"));
        assert!(composed.contains("detailed and well structured"));
    }

    #[test]
    fn test_compose_prompt_with_preferences() {
        let preferences = Preferences {
            length: Length::Long,
            tone: Tone::Formal,
            structure: Structure::Points,
        };
        let composed = compose_prompt("Explain closures", &preferences);
        assert!(composed.contains("Preferred length of the answer: long."));
        assert!(composed.contains("Tone: formal."));
        assert!(composed.contains("bullet points"));
    }

    #[test]
    fn test_length_from_slider_thresholds() {
        assert_eq!(Length::from_slider(1), Length::Short);
        assert_eq!(Length::from_slider(33), Length::Short);
        assert_eq!(Length::from_slider(34), Length::Medium);
        assert_eq!(Length::from_slider(66), Length::Medium);
        assert_eq!(Length::from_slider(67), Length::Long);
        assert_eq!(Length::from_slider(100), Length::Long);
    }

    #[test]
    fn test_preference_round_trips() {
        for tone in ["normal", "formal", "concise", "descriptive", "practical"] {
            assert_eq!(Tone::from_str(tone).unwrap().as_str(), tone);
        }
        assert!(Tone::from_str("sarcastic").is_err());
        for structure in ["paragraphs", "points", "normal"] {
            assert_eq!(Structure::from_str(structure).unwrap().as_str(), structure);
        }
    }
}
