//! Engine configuration: recognized options, defaults and validation.
//!
//! Hosts pass options as JSON; every field is optional and falls back to the
//! default shown on [`EngineConfig`].

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MAX_SCALE, DEFAULT_MIN_SCALE};
use crate::input::Modifiers;

pub const DEFAULT_MAX_EDGES: usize = 300;
pub const DEFAULT_WIP_LIMIT: usize = 3;

/// Whether confirmed attaches drop a task's manual position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Tasks inside projects are always ring-packed; manual positions are cleared on attach.
    #[default]
    Auto,
    /// Manual positions are kept and honored for project tasks too.
    Manual,
}

/// Modifier key that turns a press on a node into an object drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragModifier {
    /// Any press on a node drags it.
    None,
    #[default]
    Shift,
    Alt,
    Ctrl,
    Meta,
}

impl DragModifier {
    /// Whether `modifiers` satisfy this requirement.
    #[must_use]
    pub fn is_active(self, modifiers: Modifiers) -> bool {
        match self {
            Self::None => true,
            Self::Shift => modifiers.shift,
            Self::Alt => modifiers.alt,
            Self::Ctrl => modifiers.ctrl,
            Self::Meta => modifiers.meta,
        }
    }
}

/// Error returned by [`EngineConfig::from_json`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid engine config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid scale bounds [{min}, {max}]: need 0 < min <= max")]
    InvalidScaleBounds { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global ceiling on rendered tag edges. Default 300.
    pub max_edges: usize,
    /// Default `auto`.
    pub layout_mode: LayoutMode,
    /// Projects with more `doing` tasks than this get a warning ring. `null` disables. Default 3.
    pub wip_limit: Option<usize>,
    /// `[min, max]` camera scale. Default `[0.5, 2.2]`.
    pub scale_bounds: [f64; 2],
    /// Default `shift`.
    pub drag_modifier: DragModifier,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_edges: DEFAULT_MAX_EDGES,
            layout_mode: LayoutMode::default(),
            wip_limit: Some(DEFAULT_WIP_LIMIT),
            scale_bounds: [DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE],
            drag_modifier: DragModifier::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate options from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidScaleBounds`] for unusable bounds.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidScaleBounds`] unless `0 < min <= max` and both are finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [min, max] = self.scale_bounds;
        if !min.is_finite() || !max.is_finite() || min <= 0.0 || min > max {
            return Err(ConfigError::InvalidScaleBounds { min, max });
        }
        Ok(())
    }
}
