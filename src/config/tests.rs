//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, serialization/deserialization,
//! and edge cases in configuration handling.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = LatticeConfig::default();
    config.validate().unwrap();

    assert_eq!(config.general.role, SceneKind::Panel);
    assert_eq!(config.panel.height, 100);
    assert_eq!(config.panel.colors, [0xff666666, 0xffeeeeee]);
    assert_eq!(config.popup.colors, [0xffff6666, 0xffeeeeee]);
    assert_eq!(config.subsurface.colors, [0xff66ff66, 0xffeeeeee]);
    assert_eq!(config.window.decorations, DecorationPreference::Server);
}

#[test]
fn test_configuration_serialization_roundtrip() -> Result<()> {
    let original_config = LatticeConfig::default();

    let toml_string = toml::to_string(&original_config)?;
    let deserialized_config: LatticeConfig = toml::from_str(&toml_string)?;

    assert_eq!(original_config, deserialized_config);
    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("test_config.toml");

    let test_config = r#"
[general]
role = "window"
log_level = "debug"

[panel]
height = 48
colors = [0xff000000, 0xffffffff]

[window]
width = 600
height = 600
title = "checker"
decorations = "client"
"#;

    fs::write(&file_path, test_config)?;
    let config = LatticeConfig::load(&file_path)?;

    assert_eq!(config.general.role, SceneKind::Window);
    assert_eq!(config.panel.height, 48);
    assert_eq!(config.panel.colors, [0xff000000, 0xffffffff]);
    // Unspecified fields keep their defaults
    assert_eq!(config.panel.fallback_width, 1280);
    assert_eq!(config.window.default_size(), Size::new(600, 600));
    assert_eq!(config.window.app_id, "lattice");
    assert_eq!(config.window.decorations, DecorationPreference::Client);
    assert_eq!(config.popup, PopupConfig::default());

    Ok(())
}

#[test]
fn test_empty_file_gives_defaults() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("empty.toml");
    fs::write(&file_path, "")?;

    assert_eq!(LatticeConfig::load(&file_path)?, LatticeConfig::default());
    Ok(())
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let result = LatticeConfig::load(dir.path().join("absent.toml"));
    assert!(result.is_err());
}

#[test]
fn test_malformed_toml_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("bad.toml");
    fs::write(&file_path, "[panel\nheight = ")?;

    let err = LatticeConfig::load(&file_path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
    Ok(())
}

#[test]
fn test_unknown_role_rejected() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("role.toml");
    fs::write(&file_path, "[general]\nrole = \"sidebar\"\n")?;

    assert!(LatticeConfig::load(&file_path).is_err());
    Ok(())
}

#[test]
fn test_zero_panel_height_rejected() {
    let mut config = LatticeConfig::default();
    config.panel.height = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_window_size_rejected() {
    let mut config = LatticeConfig::default();
    config.window.width = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_oversized_popup_rejected() {
    let mut config = LatticeConfig::default();
    config.popup.width = MAX_CHILD_EDGE + 1;
    assert!(config.validate().is_err());

    // Disabled popups are not checked
    config.popup.enabled = false;
    config.subsurface.enabled = false;
    assert!(config.validate().is_ok());
}

#[test]
fn test_subsurface_must_fit_inside_popup() {
    let mut config = LatticeConfig::default();
    config.subsurface.x = 90;
    assert!(config.validate().is_err());

    config.subsurface.x = 80;
    assert!(config.validate().is_ok());

    config.subsurface.y = -1;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_log_level_rejected() {
    let mut config = LatticeConfig::default();
    config.general.log_level = "loud".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_scene_kind_parsing() {
    assert_eq!("panel".parse::<SceneKind>(), Ok(SceneKind::Panel));
    assert_eq!("Window".parse::<SceneKind>(), Ok(SceneKind::Window));
    assert!("dock".parse::<SceneKind>().is_err());
}

#[test]
fn test_popup_anchor_rect_spans_panel_height() {
    let config = LatticeConfig::default();
    assert_eq!(
        config.popup.anchor_rect(config.panel.height),
        Rect::new(200, 0, 50, 100)
    );
}

#[test]
fn test_save_and_reload() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = LatticeConfig::default();
    config.general.role = SceneKind::Window;
    config.window.title = "saved".to_string();
    config.save(&file_path)?;

    assert_eq!(LatticeConfig::load(&file_path)?, config);
    Ok(())
}
