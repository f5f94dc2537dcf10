use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use timelapser_core::agent::Viewport;
use timelapser_core::capture::CaptureSettings;
use timelapser_core::world::Vec3;

pub const CONFIG_FILE: &str = "timelapser.toml";

/// Config loader for the timelapser runner.
///
/// Search order:
/// 1) `TIMELAPSER_CONFIG_DIR/<relative_path>`
/// 2) `./<relative_path>`
/// 3) `<repo_root>/config/<relative_path>`
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parses the first file found, or returns `T::default()` when there is none.
    pub fn load_or_default<T: DeserializeOwned + Default>(relative_path: &str) -> anyhow::Result<T> {
        let config_dir = env::var_os("TIMELAPSER_CONFIG_DIR").map(PathBuf::from);
        Self::load_or_default_from(relative_path, config_dir.as_deref())
    }

    pub fn load_or_default_from<T: DeserializeOwned + Default>(
        relative_path: &str,
        config_dir: Option<&Path>,
    ) -> anyhow::Result<T> {
        match Self::resolve_path(relative_path, config_dir) {
            Some(path) => Self::parse_from_file(&path),
            None => Ok(T::default()),
        }
    }

    pub fn parse_from_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse_from_string(&text)
            .with_context(|| format!("Failed to load config at {}", path.display()))
    }

    pub fn parse_from_string<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).with_context(|| "Failed to parse TOML")
    }

    fn resolve_path(relative_path: &str, config_dir: Option<&Path>) -> Option<PathBuf> {
        let rel = Path::new(relative_path);

        if let Some(root) = config_dir {
            let candidate = root.join(rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if let Ok(cwd) = env::current_dir() {
            let candidate = cwd.join(rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        // This crate lives at <repo_root>/crates/runner.
        let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(2)?
            .join("config")
            .join(rel);
        candidate.is_file().then_some(candidate)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub bridge: BridgeConfig,
    pub capture: CaptureConfig,
}

/// Game server login, forwarded to the session sidecar on connect.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25565,
            username: "Timelapser".to_string(),
            auth: "offline".to_string(),
            password: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub addr: String,
    pub reconnect_delay_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7879".to_string(),
            reconnect_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub output_dir: PathBuf,
    pub interval_ms: u64,
    /// -1 records until stopped.
    pub frames: i64,
    pub width: u32,
    pub height: u32,
    pub view_distance: u32,
    pub camera: Option<CameraConfig>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            interval_ms: 10_000,
            frames: -1,
            width: 1000,
            height: 1000,
            view_distance: 16,
            camera: None,
        }
    }
}

/// Camera override applied at startup. Every field must be set for it to take effect.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CameraConfig {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub yaw: Option<f64>,
    pub pitch: Option<f64>,
}

impl CameraConfig {
    pub fn position(&self) -> Option<Vec3> {
        Some(Vec3::new(self.x?, self.y?, self.z?))
    }
}

impl AppConfig {
    /// Reads `timelapser.toml` (if any), then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg: AppConfig = ConfigLoader::load_or_default(CONFIG_FILE)?;
        cfg.apply_env(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Blank values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("HOST") {
            self.session.host = v;
        }
        if let Some(v) = get("PORT") {
            self.session.port = v.parse().with_context(|| format!("invalid PORT {v:?}"))?;
        }
        if let Some(v) = get("AUTH") {
            self.session.auth = v;
        }
        if let Some(v) = get("USERNAME") {
            self.session.username = v;
        }
        if let Some(v) = get("PASSWORD") {
            self.session.password = Some(v);
        }
        if let Some(v) = get("VERSION") {
            self.session.version = Some(v);
        }
        if let Some(v) = get("OUTPUT_DIR") {
            self.capture.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("TIMELAPSER_INTERVAL_MS") {
            self.capture.interval_ms = v
                .parse()
                .with_context(|| format!("invalid TIMELAPSER_INTERVAL_MS {v:?}"))?;
        }
        if let Some(v) = get("TIMELAPSER_FRAMES") {
            self.capture.frames = v
                .parse()
                .with_context(|| format!("invalid TIMELAPSER_FRAMES {v:?}"))?;
        }
        if let Some(v) = get("TIMELAPSER_BRIDGE_ADDR") {
            self.bridge.addr = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.capture.interval_ms == 0 {
            anyhow::bail!("capture.interval_ms must be greater than 0");
        }
        if self.capture.frames < -1 {
            anyhow::bail!(
                "capture.frames must be -1 (unbounded) or a frame count, got {}",
                self.capture.frames
            );
        }
        Ok(())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            output_dir: self.capture.output_dir.clone(),
            interval: Duration::from_millis(self.capture.interval_ms),
            frame_limit: CaptureSettings::frame_limit_from_count(self.capture.frames),
            viewport: Viewport {
                width: self.capture.width,
                height: self.capture.height,
                view_distance: self.capture.view_distance,
            },
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.bridge.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: AppConfig = ConfigLoader::parse_from_string("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.session.port, 25565);
        assert_eq!(cfg.bridge.addr, "127.0.0.1:7879");
        assert_eq!(cfg.capture.frames, -1);
    }

    #[test]
    fn parses_partial_sections() {
        let cfg: AppConfig = ConfigLoader::parse_from_string(
            r#"
                [session]
                host = "mc.example.org"
                version = "1.20.4"

                [capture]
                interval_ms = 2500
                frames = 3

                [capture.camera]
                x = 0.0
                y = 64.0
                z = 0.0
                yaw = 0.0
                pitch = 0.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.session.host, "mc.example.org");
        assert_eq!(cfg.session.port, 25565);
        assert_eq!(cfg.session.version.as_deref(), Some("1.20.4"));
        let settings = cfg.capture_settings();
        assert_eq!(settings.interval, Duration::from_millis(2500));
        assert_eq!(settings.frame_limit, Some(3));
        assert_eq!(settings.viewport.width, 1000);
        let camera = cfg.capture.camera.unwrap();
        assert_eq!(camera.position(), Some(Vec3::new(0.0, 64.0, 0.0)));
    }

    #[test]
    fn env_overrides_file_values_and_blank_is_ignored() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env_of(&[
            ("HOST", "play.example.net"),
            ("PORT", "25570"),
            ("USERNAME", "   "),
            ("PASSWORD", "hunter2"),
            ("OUTPUT_DIR", "/tmp/frames"),
            ("TIMELAPSER_FRAMES", "10"),
        ]))
        .unwrap();

        assert_eq!(cfg.session.host, "play.example.net");
        assert_eq!(cfg.session.port, 25570);
        assert_eq!(cfg.session.username, "Timelapser");
        assert_eq!(cfg.session.password.as_deref(), Some("hunter2"));
        assert_eq!(cfg.capture.output_dir, PathBuf::from("/tmp/frames"));
        assert_eq!(cfg.capture.frames, 10);
    }

    #[test]
    fn unparsable_env_value_names_the_variable() {
        let mut cfg = AppConfig::default();
        let err = cfg.apply_env(env_of(&[("PORT", "lots")])).unwrap_err();
        assert!(format!("{err:#}").contains("invalid PORT"));
    }

    #[test]
    fn validation_rejects_zero_interval_and_negative_frames() {
        let mut cfg = AppConfig::default();
        cfg.capture.interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.capture.frames = -2;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.capture.frames = -1;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.capture_settings().frame_limit, None);
    }

    #[test]
    fn config_dir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("custom-timelapser.toml"),
            "[bridge]\naddr = \"10.0.0.2:9000\"\n",
        )
        .unwrap();

        let cfg: AppConfig =
            ConfigLoader::load_or_default_from("custom-timelapser.toml", Some(dir.path())).unwrap();
        assert_eq!(cfg.bridge.addr, "10.0.0.2:9000");
        assert_eq!(cfg.bridge.reconnect_delay_ms, 5000);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: AppConfig =
            ConfigLoader::load_or_default_from("no-such-file.toml", Some(dir.path())).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn session_serializes_without_unset_secrets() {
        let v = serde_json::to_value(SessionConfig::default()).unwrap();
        assert_eq!(v["host"], "localhost");
        assert!(v.get("password").is_none());
    }
}
