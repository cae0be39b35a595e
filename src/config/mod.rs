//! Configuration management for Lattice
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It covers which scene to show, the geometry of each
//! surface role, and the colours each one is filled with.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::buffer::Pattern;
use crate::handshake::{Rect, Size};

/// Largest popup or sub-surface edge accepted from configuration
pub const MAX_CHILD_EDGE: u32 = 16384;

/// Main configuration struct containing all Lattice settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LatticeConfig {
    /// General client settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Layer-shell panel (default scene)
    #[serde(default)]
    pub panel: PanelConfig,

    /// Popup hosted by the panel
    #[serde(default)]
    pub popup: PopupConfig,

    /// Sub-surface hosted by the popup
    #[serde(default)]
    pub subsurface: SubsurfaceConfig,

    /// Top-level window scene
    #[serde(default)]
    pub window: WindowConfig,
}

/// Which surfaces the client creates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    /// Layer-shell panel with a popup and a sub-surface
    #[default]
    Panel,
    /// A single xdg top-level window
    Window,
}

impl std::str::FromStr for SceneKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panel" => Ok(SceneKind::Panel),
            "window" => Ok(SceneKind::Window),
            other => Err(format!("unknown role `{}` (expected panel or window)", other)),
        }
    }
}

/// Preferred decoration mode for the top-level window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecorationPreference {
    /// Ask the compositor to draw decorations
    #[default]
    Server,
    /// Draw (or skip) decorations ourselves
    Client,
    /// Do not negotiate decorations at all
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,

    /// Log filter when not overridden by RUST_LOG ("error".."trace")
    pub log_level: String,

    /// Scene to show
    pub role: SceneKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    /// Panel height and exclusive zone (pixels)
    pub height: u32,

    /// Width used when the compositor leaves the width to the client
    pub fallback_width: u32,

    /// Layer-shell namespace
    pub namespace: String,

    /// Checkerboard colours (ARGB)
    pub colors: [u32; 2],

    /// Request on-demand keyboard focus
    pub keyboard_on_demand: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopupConfig {
    pub enabled: bool,

    /// Horizontal offset of the anchor rectangle inside the panel
    pub x: i32,

    /// Width of the anchor rectangle
    pub anchor_width: i32,

    pub width: u32,
    pub height: u32,
    pub colors: [u32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubsurfaceConfig {
    pub enabled: bool,

    /// Offset inside the popup
    pub x: i32,
    pub y: i32,

    pub width: u32,
    pub height: u32,
    pub colors: [u32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Size used when the compositor leaves the size to the client
    pub width: u32,
    pub height: u32,

    pub title: String,
    pub app_id: String,
    pub colors: [u32; 2],
    pub decorations: DecorationPreference,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            role: SceneKind::Panel,
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            height: 100,
            fallback_width: 1280,
            namespace: "lattice".to_string(),
            colors: [0xff666666, 0xffeeeeee],
            keyboard_on_demand: true,
        }
    }
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            x: 200,
            anchor_width: 50,
            width: 100,
            height: 50,
            colors: [0xffff6666, 0xffeeeeee],
        }
    }
}

impl Default for SubsurfaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            x: 10,
            y: 10,
            width: 20,
            height: 20,
            colors: [0xff66ff66, 0xffeeeeee],
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            title: "lattice".to_string(),
            app_id: "lattice".to_string(),
            colors: [0xff666666, 0xffeeeeee],
            decorations: DecorationPreference::Server,
        }
    }
}

impl PanelConfig {
    pub fn default_size(&self) -> Size {
        Size::new(self.fallback_width, self.height)
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::from(self.colors)
    }
}

impl PopupConfig {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Anchor rectangle in panel coordinates
    pub fn anchor_rect(&self, panel_height: u32) -> Rect {
        Rect::new(self.x, 0, self.anchor_width, panel_height as i32)
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::from(self.colors)
    }
}

impl SubsurfaceConfig {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::from(self.colors)
    }
}

impl WindowConfig {
    pub fn default_size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn pattern(&self) -> Pattern {
        Pattern::from(self.colors)
    }
}

impl LatticeConfig {
    /// Default location of the configuration file
    pub fn default_path() -> &'static str {
        "~/.config/lattice/lattice.toml"
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: LatticeConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.panel.height == 0 {
            anyhow::bail!("Invalid panel height: must be greater than 0");
        }
        if self.panel.fallback_width == 0 {
            anyhow::bail!("Invalid panel fallback_width: must be greater than 0");
        }
        if self.window.width == 0 || self.window.height == 0 {
            anyhow::bail!(
                "Invalid window size {}x{}: both dimensions must be greater than 0",
                self.window.width,
                self.window.height
            );
        }

        if self.popup.enabled {
            check_child_size("popup", self.popup.width, self.popup.height)?;
            if self.popup.anchor_width <= 0 {
                anyhow::bail!("Invalid popup anchor_width: must be greater than 0");
            }
        }

        if self.subsurface.enabled {
            check_child_size("subsurface", self.subsurface.width, self.subsurface.height)?;
            let fits_x = self.subsurface.x >= 0
                && self.subsurface.x as u64 + self.subsurface.width as u64 <= self.popup.width as u64;
            let fits_y = self.subsurface.y >= 0
                && self.subsurface.y as u64 + self.subsurface.height as u64 <= self.popup.height as u64;
            if !fits_x || !fits_y {
                anyhow::bail!(
                    "Subsurface {}x{} at ({}, {}) does not fit inside the {}x{} popup",
                    self.subsurface.width,
                    self.subsurface.height,
                    self.subsurface.x,
                    self.subsurface.y,
                    self.popup.width,
                    self.popup.height
                );
            }
        }

        if self
            .general
            .log_level
            .parse::<crate::logging::LogLevel>()
            .is_err()
        {
            anyhow::bail!("Invalid log_level: {}", self.general.log_level);
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

fn check_child_size(what: &str, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_CHILD_EDGE || height > MAX_CHILD_EDGE {
        anyhow::bail!(
            "Invalid {} size {}x{}: each edge must be between 1 and {}",
            what,
            width,
            height,
            MAX_CHILD_EDGE
        );
    }
    Ok(())
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &Path) -> Result<PathBuf> {
    if path.to_string_lossy().starts_with('~') {
        let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
        let rest = path.strip_prefix("~").unwrap_or(path);
        Ok(Path::new(&home).join(rest))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests;
