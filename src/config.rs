use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::buffer::BufferConfig;
use crate::engine::{GestureConfig, PoseConfig};
use crate::pipeline::RecognizerConfig;
use crate::recording::RecordingConfig;
use crate::store::{STORE_FILE_NAME, SampleKind, SampleStore};
use crate::window::Strategy;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferSection {
    pub sample_rate_hz: f32,
    pub buffer_secs: f32,
    pub deadzone: f32,
    pub full_tracking: bool,
}

impl Default for BufferSection {
    fn default() -> Self {
        let b = BufferConfig::default();
        Self {
            sample_rate_hz: b.sample_rate_hz,
            buffer_secs: b.buffer_secs,
            deadzone: b.deadzone,
            full_tracking: b.full_tracking,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GestureSection {
    pub bounding_cube_size: f32,
    pub confidence_threshold: f32,
    pub interval_secs: f32,
    pub min_interval_secs: f32,
    pub strategy: Strategy,
    pub debounce_secs: f64,
    pub enable_left: bool,
    pub enable_right: bool,
}

impl Default for GestureSection {
    fn default() -> Self {
        let g = GestureConfig::default();
        Self {
            bounding_cube_size: g.bounding_cube_size,
            confidence_threshold: g.confidence_threshold,
            interval_secs: g.interval_secs,
            min_interval_secs: g.min_interval_secs,
            strategy: g.strategy,
            debounce_secs: g.debounce_secs,
            enable_left: g.enable_left,
            enable_right: g.enable_right,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoseSection {
    pub confidence_threshold: f32,
    pub enable_left: bool,
    pub enable_right: bool,
    pub record_interval_secs: f64,
    pub record_duration_secs: f64,
}

impl Default for PoseSection {
    fn default() -> Self {
        let p = PoseConfig::default();
        let r = RecordingConfig::default();
        Self {
            confidence_threshold: p.confidence_threshold,
            enable_left: p.enable_left,
            enable_right: p.enable_right,
            record_interval_secs: r.pose_interval_secs,
            record_duration_secs: r.pose_duration_secs,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub buffer: BufferSection,
    pub gesture: GestureSection,
    pub pose: PoseSection,
    pub store: StoreSection,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            sample_rate_hz: self.buffer.sample_rate_hz,
            buffer_secs: self.buffer.buffer_secs,
            deadzone: self.buffer.deadzone,
            full_tracking: self.buffer.full_tracking,
        }
    }

    pub fn gesture_config(&self) -> GestureConfig {
        let g = &self.gesture;
        GestureConfig {
            bounding_cube_size: g.bounding_cube_size,
            confidence_threshold: g.confidence_threshold,
            interval_secs: g.interval_secs,
            min_interval_secs: g.min_interval_secs,
            strategy: g.strategy,
            debounce_secs: g.debounce_secs,
            enable_left: g.enable_left,
            enable_right: g.enable_right,
        }
    }

    pub fn pose_config(&self) -> PoseConfig {
        PoseConfig {
            confidence_threshold: self.pose.confidence_threshold,
            enable_left: self.pose.enable_left,
            enable_right: self.pose.enable_right,
        }
    }

    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig {
            pose_interval_secs: self.pose.record_interval_secs,
            pose_duration_secs: self.pose.record_duration_secs,
        }
    }

    pub fn recognizer_config(&self) -> RecognizerConfig {
        RecognizerConfig {
            buffer: self.buffer_config(),
            gesture: self.gesture_config(),
            pose: self.pose_config(),
            recording: self.recording_config(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub data_dir: PathBuf,
}

fn home_dir() -> Result<PathBuf> {
    UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or_else(|| anyhow!("cannot determine home directory"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    /// Loads the active profile from `~/.config/handsign`, installing the
    /// bundled default profile on first use.
    pub fn load_or_install_default() -> Result<Self> {
        let home = home_dir()?;
        Self::load_or_install_in(
            home.join(".config").join("handsign"),
            home.join(".local").join("share").join("handsign"),
        )
    }

    pub fn load_or_install_in(config_dir: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let profiles_dir = config_dir.join("profiles");
        fs::create_dir_all(&profiles_dir)
            .map_err(|e| anyhow!("failed to create {}: {e}", profiles_dir.display()))?;

        let def_path = profiles_dir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = config_dir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let mut active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        if active_name.is_empty() {
            warn!("empty active profile pointer; using default");
            active_name = "default".to_string();
        }
        let profile = load_profile(&profiles_dir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir,
            profiles_dir,
            active_ptr,
            data_dir,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        // validate before switching the pointer
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    /// Sample store location: the profile's `[store] path`, else the data dir.
    pub fn store_path(&self) -> PathBuf {
        self.profile
            .store
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(STORE_FILE_NAME))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let store_path = self.store_path();
        let store_exists = store_path.exists();
        let store_readable = fs::read_to_string(&store_path)
            .ok()
            .map(|txt| SampleStore::from_json(&txt).is_ok());
        let store = SampleStore::open(&store_path);
        let b = self.profile.buffer_config();
        serde_json::json!({
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profiles": self.list_profiles(),
            "store": {
                "path": store_path,
                "exists": store_exists,
                "parses": store_readable,
                "poses": store.len(SampleKind::Pose),
                "gestures": store.len(SampleKind::Gesture),
                "pose_recognition_ready": store.has_enough_classes(SampleKind::Pose),
                "gesture_recognition_ready": store.has_enough_classes(SampleKind::Gesture),
            },
            "model_inputs": {
                "gesture": crate::normalize::gesture_feature_len(b.capacity()),
                "pose": crate::normalize::POSE_FEATURE_COUNT,
            },
            "hints": {
                "classes": "recognition stays idle until a kind has at least two stored labels",
                "store_override": "set [store] path in the active profile",
            }
        })
    }
}

fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    let path = profiles_dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    let profile: Profile =
        toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
    validate_profile(&profile).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let b = &p.buffer;
    if !(b.sample_rate_hz > 0.0) || !(b.buffer_secs > 0.0) {
        return Err(anyhow!("buffer.sample_rate_hz and buffer.buffer_secs must be positive"));
    }
    if !(b.deadzone >= 0.0) {
        return Err(anyhow!("buffer.deadzone must not be negative"));
    }

    let g = &p.gesture;
    if !(g.bounding_cube_size > 0.0) {
        return Err(anyhow!("gesture.bounding_cube_size must be positive"));
    }
    if !(0.0..1.0).contains(&g.confidence_threshold) {
        return Err(anyhow!("gesture.confidence_threshold must be in [0,1)"));
    }
    if !(g.interval_secs > 0.0) {
        return Err(anyhow!("gesture.interval_secs must be positive"));
    }
    if !(g.min_interval_secs >= 0.0) {
        return Err(anyhow!("gesture.min_interval_secs must not be negative"));
    }
    if !(g.debounce_secs >= 0.0) {
        return Err(anyhow!("gesture.debounce_secs must not be negative"));
    }

    let ps = &p.pose;
    if !(0.0..1.0).contains(&ps.confidence_threshold) {
        return Err(anyhow!("pose.confidence_threshold must be in [0,1)"));
    }
    if !(ps.record_interval_secs > 0.0) {
        return Err(anyhow!("pose.record_interval_secs must be positive"));
    }
    if !(ps.record_duration_secs >= 0.0) {
        return Err(anyhow!("pose.record_duration_secs must not be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn bundled_profile_matches_defaults() {
        let p = Profile::parse(default_profile_text()).unwrap();
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        assert_eq!(p.recognizer_config(), RecognizerConfig::default());
        assert!(p.store.path.is_none());
    }

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let p = Profile::parse("[gesture]\nstrategy = \"best_of\"\n").unwrap();
        assert_eq!(p.gesture.strategy, Strategy::BestOf);
        assert_eq!(p.buffer_config(), BufferConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        for bad in [
            "[buffer]\nsample_rate_hz = 0.0",
            "[buffer]\ndeadzone = -1.0",
            "[gesture]\nconfidence_threshold = 1.0",
            "[gesture]\ninterval_secs = 0.0",
            "[gesture]\nbounding_cube_size = -2.0",
            "[gesture]\ndebounce_secs = -0.5",
            "[pose]\nrecord_interval_secs = 0.0",
            "[gesture]\nstrategy = \"fastest\"",
        ] {
            assert!(Profile::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn installs_default_and_switches_profiles() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        let data_dir = tmp.path().join("data");
        let mut state = ConfigState::load_or_install_in(cfg_dir.clone(), data_dir.clone()).unwrap();
        assert_eq!(state.active_name, "default");
        assert_eq!(fs::read_to_string(cfg_dir.join("active")).unwrap(), "default");
        assert_eq!(state.store_path(), data_dir.join(STORE_FILE_NAME));

        fs::write(
            state.profiles_dir.join("fast.toml"),
            "[buffer]\nbuffer_secs = 1.5\n[store]\npath = \"/tmp/elsewhere.json\"\n",
        )
        .unwrap();
        fs::write(state.profiles_dir.join("broken.toml"), "[pose]\nconfidence_threshold = 3.0\n")
            .unwrap();
        assert_eq!(state.list_profiles(), vec!["broken", "default", "fast"]);

        assert!(state.set_active("broken").is_err());
        assert_eq!(state.active_name, "default");
        assert!(state.set_active("missing").is_err());

        state.set_active("fast").unwrap();
        assert_eq!(state.profile.buffer.buffer_secs, 1.5);
        assert_eq!(state.store_path(), PathBuf::from("/tmp/elsewhere.json"));

        // edits to the active profile land on reload
        let fast = state.profiles_dir.join("fast.toml");
        fs::write(&fast, "[buffer]\nbuffer_secs = 2.5\n").unwrap();
        state.reload().unwrap();
        assert_eq!(state.profile.buffer.buffer_secs, 2.5);
        assert_eq!(state.store_path(), data_dir.join(STORE_FILE_NAME));

        // an invalid edit is refused and the loaded profile stays
        fs::write(&fast, "[buffer]\nbuffer_secs = -1.0\n").unwrap();
        assert!(state.reload().is_err());
        assert_eq!(state.profile.buffer.buffer_secs, 2.5);
        fs::write(&fast, "[buffer]\nbuffer_secs = 2.5\n").unwrap();

        let again = ConfigState::load_or_install_in(cfg_dir, data_dir).unwrap();
        assert_eq!(again.active_name, "fast");
    }

    #[test]
    fn doctor_reports_store_health() {
        let tmp = TempDir::new().unwrap();
        let state =
            ConfigState::load_or_install_in(tmp.path().join("c"), tmp.path().join("d")).unwrap();
        let report = state.doctor_report();
        assert_eq!(report["active_profile"], "default");
        assert_eq!(report["store"]["exists"], false);
        assert_eq!(report["store"]["poses"], 0);
        assert_eq!(report["model_inputs"]["gesture"], 90);
        assert_eq!(report["model_inputs"]["pose"], 22);
    }
}
