//! Reader settings management
//!
//! This module provides settings persistence, loading, and updating
//! for the reader: AI endpoint configuration and appearance.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_AI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_AI_MODEL: &str = "gpt-3.5-turbo";

pub const MIN_TEXT_SIZE: u8 = 12;
pub const MAX_TEXT_SIZE: u8 = 28;
pub const DEFAULT_TEXT_SIZE: u8 = 16;

/// Main reader settings container
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReaderSettings {
    /// Chat-completion endpoint settings
    pub ai: AiSettings,
    /// Reading view appearance
    pub appearance: AppearanceSettings,
}

/// AI collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AiSettings {
    pub api_endpoint: String,
    pub api_key: String,
    pub ai_model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_AI_ENDPOINT.to_string(),
            api_key: String::new(),
            ai_model: DEFAULT_AI_MODEL.to_string(),
        }
    }
}

impl AiSettings {
    /// Whether an API key has been entered
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Appearance settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppearanceSettings {
    pub theme: Theme,
    /// Reading text size in pixels
    pub text_size: u8,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            text_size: DEFAULT_TEXT_SIZE,
        }
    }
}

impl AppearanceSettings {
    /// Set the text size, clamped to the supported range
    pub fn set_text_size(&mut self, size: u8) {
        self.text_size = size.clamp(MIN_TEXT_SIZE, MAX_TEXT_SIZE);
    }

    /// Next theme in the toggle cycle: system, light, dark
    pub fn next_theme(&self) -> Theme {
        match self.theme {
            Theme::System => Theme::Light,
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::System,
        }
    }
}

/// Reader theme
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Settings manager for loading, saving, and updating reader settings
pub struct SettingsManager {
    /// Path to the settings file
    settings_path: PathBuf,
    /// Current settings (cached)
    current: ReaderSettings,
}

impl SettingsManager {
    /// Create a new settings manager with the given data directory
    pub fn new(data_dir: PathBuf) -> Self {
        let settings_path = data_dir.join("settings.json");
        Self {
            settings_path,
            current: ReaderSettings::default(),
        }
    }

    /// Get the path to the settings file
    pub fn settings_path(&self) -> &PathBuf {
        &self.settings_path
    }

    fn apply_loaded(&mut self, content: &str) {
        match serde_json::from_str::<ReaderSettings>(content) {
            Ok(mut settings) => {
                let size = settings.appearance.text_size;
                settings.appearance.set_text_size(size);
                self.current = settings;
            }
            Err(e) => {
                tracing::warn!("Failed to parse settings file, using defaults: {}", e);
                self.current = ReaderSettings::default();
            }
        }
    }

    /// Load settings from disk, or return defaults if file doesn't exist
    pub async fn load(&mut self) -> Result<&ReaderSettings> {
        if self.settings_path.exists() {
            let content = tokio::fs::read_to_string(&self.settings_path).await?;
            self.apply_loaded(&content);
        } else {
            self.current = ReaderSettings::default();
        }
        Ok(&self.current)
    }

    /// Load settings synchronously (for use during startup)
    pub fn load_sync(&mut self) -> Result<&ReaderSettings> {
        if self.settings_path.exists() {
            let content = std::fs::read_to_string(&self.settings_path)?;
            self.apply_loaded(&content);
        } else {
            self.current = ReaderSettings::default();
        }
        Ok(&self.current)
    }

    /// Save current settings to disk
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&self.current)?;
        tokio::fs::write(&self.settings_path, content).await?;
        Ok(())
    }

    /// Save settings synchronously
    pub fn save_sync(&self) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.current)?;
        std::fs::write(&self.settings_path, content)?;
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &ReaderSettings {
        &self.current
    }

    /// Update settings and save to disk
    pub async fn update(&mut self, settings: ReaderSettings) -> Result<()> {
        self.current = settings;
        self.save().await
    }

    /// Update settings synchronously
    pub fn update_sync(&mut self, settings: ReaderSettings) -> Result<()> {
        self.current = settings;
        self.save_sync()
    }

    /// Update only the AI settings
    pub async fn update_ai(&mut self, ai: AiSettings) -> Result<()> {
        self.current.ai = ai;
        self.save().await
    }

    /// Update only the appearance settings
    pub async fn update_appearance(&mut self, mut appearance: AppearanceSettings) -> Result<()> {
        let size = appearance.text_size;
        appearance.set_text_size(size);
        self.current.appearance = appearance;
        self.save().await
    }

    /// Reset settings to defaults and save
    pub async fn reset(&mut self) -> Result<&ReaderSettings> {
        self.current = ReaderSettings::default();
        self.save().await?;
        Ok(&self.current)
    }

    /// Reset settings to defaults synchronously
    pub fn reset_sync(&mut self) -> Result<&ReaderSettings> {
        self.current = ReaderSettings::default();
        self.save_sync()?;
        Ok(&self.current)
    }
}
