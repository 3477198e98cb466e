//! Production request model: the script a job renders and how it should sound.
//!
//! Field names follow the renderer's JSON contract.

use serde::{Deserialize, Serialize};

/// One scene of a script as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    pub text: String,
    /// Seconds this scene stays on screen.
    pub duration: f64,
    #[serde(default)]
    pub image_keywords: Vec<String>,
    #[serde(default = "default_transition")]
    pub transition: String,
}

fn default_transition() -> String {
    "fade".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStyle {
    #[default]
    Modern,
    Business,
    Education,
    Lifestyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub title: String,
    pub scenes: Vec<SceneData>,
    pub total_duration: f64,
    #[serde(default)]
    pub style: VideoStyle,
}

impl Script {
    /// Sum of scene durations, which is what the timeline actually plays.
    pub fn scene_duration_sum(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// "gtts" or "openai".
    pub provider: String,
    pub voice: String,
    pub speed: f64,
    pub enabled: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: "gtts".to_string(),
            voice: "zh".to_string(),
            speed: 1.0,
            enabled: true,
        }
    }
}

/// Body of a job creation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRequest {
    pub script: Script,
    #[serde(default = "default_template")]
    pub template_id: String,
    #[serde(default)]
    pub voice_config: VoiceConfig,
}

fn default_template() -> String {
    "default".to_string()
}

impl ProductionRequest {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            template_id: default_template(),
            voice_config: VoiceConfig::default(),
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }
}
