use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use vidpace_model::SeekSlot;

/// Schema version stamped into stored preferences by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Source that produced the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    File(PathBuf),
}

/// Keys bound to the four seek increments. Matching ignores case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub rewind_primary: char,
    pub rewind_secondary: char,
    pub forward_secondary: char,
    pub forward_primary: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            rewind_primary: 'z',
            rewind_secondary: 'x',
            forward_secondary: 'c',
            forward_primary: 'v',
        }
    }
}

impl KeyBindings {
    pub fn key(&self, slot: SeekSlot) -> char {
        match slot {
            SeekSlot::RewindPrimary => self.rewind_primary,
            SeekSlot::RewindSecondary => self.rewind_secondary,
            SeekSlot::ForwardSecondary => self.forward_secondary,
            SeekSlot::ForwardPrimary => self.forward_primary,
        }
    }

    /// Maps a key-down value (`"z"`, `"Z"`, `"ArrowLeft"`) to its slot.
    pub fn slot_for(&self, key: &str) -> Option<SeekSlot> {
        let mut chars = key.chars();
        let pressed = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        SeekSlot::ALL.into_iter().find(|slot| {
            self.key(*slot).to_lowercase().eq(pressed.to_lowercase())
        })
    }

    /// Parses the compact `"zxcv"` form (rewind primary, rewind secondary,
    /// forward secondary, forward primary).
    pub fn from_compact(value: &str) -> Option<Self> {
        let chars: Vec<char> = value.trim().chars().collect();
        match chars.as_slice() {
            [rp, rs, fs, fp] => Some(Self {
                rewind_primary: *rp,
                rewind_secondary: *rs,
                forward_secondary: *fs,
                forward_primary: *fp,
            }),
            _ => None,
        }
    }
}

/// Effective runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VidpaceConfig {
    /// Version stamped into stored preferences on install/update/reset.
    pub schema_version: u32,
    /// How long on-page feedback stays visible.
    pub feedback_interval: Duration,
    /// How long control surface notifications stay visible.
    pub notification_interval: Duration,
    pub key_bindings: KeyBindings,
    /// Playback rates offered as one-click presets.
    pub speed_presets: Vec<f64>,
    /// Host UI locale, used to resolve the `auto` language.
    pub ui_locale: String,
    /// Location of the file-backed preference store.
    pub store_path: PathBuf,
    /// Capacity of every component's internal event queue.
    pub channel_capacity: usize,
    pub source: ConfigSource,
}

impl Default for VidpaceConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            feedback_interval: Duration::from_millis(1_000),
            notification_interval: Duration::from_millis(2_000),
            key_bindings: KeyBindings::default(),
            speed_presets: vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0],
            ui_locale: "en-US".to_string(),
            store_path: PathBuf::from("vidpace-preferences.json"),
            channel_capacity: 64,
            source: ConfigSource::Default,
        }
    }
}

/// Raw configuration as defined in a TOML file. Every field is optional;
/// intervals use humantime syntax (`"1s"`, `"1500ms"`).
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_bindings: Option<KeyBindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_presets: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}
