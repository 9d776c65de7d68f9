use crate::types::ColorScale;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub geojson: PathBuf,
    #[serde(default = "default_region_key")]
    pub region_key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1100,
        }
    }
}

/// Initial form state for a fresh session.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DefaultsConfig {
    pub title: String,
    pub unit: String,
    pub color_scale: ColorScale,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            title: "India Thematic Map".to_string(),
            unit: "e.g., Literacy Rate (%)".to_string(),
            color_scale: ColorScale::Blues,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            session_ttl_secs: 3600,
        }
    }
}

fn default_region_key() -> String {
    "st_nm".to_string()
}

const MAX_DIMENSION: u32 = 8192;

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.region_key.trim().is_empty() {
            bail!("input.region_key must not be empty");
        }
        let (w, h) = (self.render.width, self.render.height);
        if w < 200 || h < 200 || w > MAX_DIMENSION || h > MAX_DIMENSION {
            bail!("render size {}x{} out of range (200..={})", w, h, MAX_DIMENSION);
        }
        if self.server.session_ttl_secs == 0 {
            bail!("server.session_ttl_secs must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let file = write_config("[input]\ngeojson = \"states.geojson\"\n");
        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.input.region_key, "st_nm");
        assert_eq!(config.render.width, 1000);
        assert_eq!(config.defaults.title, "India Thematic Map");
        assert_eq!(config.defaults.color_scale, ColorScale::Blues);
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn full_config_overrides() {
        let file = write_config(
            r#"
[input]
geojson = "x.geojson"
region_key = "NAME_1"

[render]
width = 640
height = 480

[defaults]
title = "Rainfall"
unit = "mm"
color_scale = "Greens"

[server]
port = 9000
session_ttl_secs = 60
"#,
        );
        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.input.region_key, "NAME_1");
        assert_eq!(config.render.height, 480);
        assert_eq!(config.defaults.color_scale, ColorScale::Greens);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.session_ttl_secs, 60);
    }

    #[test]
    fn rejects_tiny_render_size() {
        let file = write_config("[input]\ngeojson = \"a\"\n[render]\nwidth = 10\nheight = 10\n");
        assert!(AppConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn rejects_empty_region_key() {
        let file = write_config("[input]\ngeojson = \"a\"\nregion_key = \"  \"\n");
        let err = AppConfig::load_from_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("region_key"), "{err:#}");
    }

    #[test]
    fn rejects_zero_session_ttl() {
        let file = write_config("[input]\ngeojson = \"a\"\n[server]\nsession_ttl_secs = 0\n");
        let err = AppConfig::load_from_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("session_ttl_secs"), "{err:#}");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load_from_file(Path::new("/nonexistent/config.toml")).is_err());
    }
}
