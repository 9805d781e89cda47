//! Stored preferences and the partial updates exchanged between contexts.
//!
//! The store only ever holds a loose key/value [`PreferenceRecord`].
//! Consumers never look at that record directly: they go through
//! [`PreferenceSet::from_record`], which fills every missing or malformed
//! entry from the compiled-in defaults, so a partial record is never
//! observed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::change::{StoreChange, ValueChange};
use crate::error::ModelError;
use crate::language::Language;
use crate::seconds::Seconds;

/// Key space of the preference store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreferenceKey {
    RewindPrimary,
    RewindSecondary,
    ForwardPrimary,
    ForwardSecondary,
    Language,
    SchemaVersion,
}

impl PreferenceKey {
    pub const ALL: [PreferenceKey; 6] = [
        Self::RewindPrimary,
        Self::RewindSecondary,
        Self::ForwardPrimary,
        Self::ForwardSecondary,
        Self::Language,
        Self::SchemaVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RewindPrimary => "rewindPrimary",
            Self::RewindSecondary => "rewindSecondary",
            Self::ForwardPrimary => "forwardPrimary",
            Self::ForwardSecondary => "forwardSecondary",
            Self::Language => "language",
            Self::SchemaVersion => "schemaVersion",
        }
    }
}

impl FromStr for PreferenceKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ModelError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PreferenceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PreferenceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The four seek increments a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekSlot {
    RewindPrimary,
    RewindSecondary,
    ForwardSecondary,
    ForwardPrimary,
}

impl SeekSlot {
    pub const ALL: [SeekSlot; 4] = [
        Self::RewindPrimary,
        Self::RewindSecondary,
        Self::ForwardSecondary,
        Self::ForwardPrimary,
    ];

    pub fn key(self) -> PreferenceKey {
        match self {
            Self::RewindPrimary => PreferenceKey::RewindPrimary,
            Self::RewindSecondary => PreferenceKey::RewindSecondary,
            Self::ForwardSecondary => PreferenceKey::ForwardSecondary,
            Self::ForwardPrimary => PreferenceKey::ForwardPrimary,
        }
    }

    pub fn is_rewind(self) -> bool {
        matches!(self, Self::RewindPrimary | Self::RewindSecondary)
    }
}

/// Raw key/value contents of the preference store.
///
/// Unknown keys are dropped on the way in; values are kept verbatim so a
/// malformed entry can still be reported in a change notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceRecord(BTreeMap<PreferenceKey, Value>);

impl PreferenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: PreferenceKey) -> Option<&Value> {
        self.0.get(&key)
    }

    pub fn insert(
        &mut self,
        key: PreferenceKey,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.0.insert(key, value.into())
    }

    pub fn remove(&mut self, key: PreferenceKey) -> Option<Value> {
        self.0.remove(&key)
    }

    pub fn contains(&self, key: PreferenceKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PreferenceKey, &Value)> {
        self.0.iter().map(|(key, value)| (*key, value))
    }

    /// Writes every entry of `update` into this record and reports the keys
    /// whose value actually changed.
    pub fn upsert(&mut self, update: &PreferenceRecord) -> StoreChange {
        let mut change = StoreChange::default();
        for (key, value) in update.iter() {
            let previous = self.0.insert(key, value.clone());
            if previous.as_ref() != Some(value) {
                change.insert(
                    key,
                    ValueChange {
                        old_value: previous,
                        new_value: Some(value.clone()),
                    },
                );
            }
        }
        change
    }

    /// Builds a record from a JSON object, ignoring keys outside the
    /// preference key space.
    pub fn from_json_map(map: Map<String, Value>) -> Self {
        let entries = map
            .into_iter()
            .filter_map(|(key, value)| {
                key.parse::<PreferenceKey>().ok().map(|key| (key, value))
            })
            .collect();
        Self(entries)
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.clone()))
            .collect()
    }
}

impl FromIterator<(PreferenceKey, Value)> for PreferenceRecord {
    fn from_iter<I: IntoIterator<Item = (PreferenceKey, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for PreferenceRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PreferenceRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_json_map(map))
    }
}

/// Fully populated preferences as every consumer sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSet {
    pub rewind_primary: Seconds,
    pub rewind_secondary: Seconds,
    pub forward_primary: Seconds,
    pub forward_secondary: Seconds,
    pub language: Language,
    pub schema_version: u32,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self {
            rewind_primary: Self::DEFAULT_REWIND_PRIMARY,
            rewind_secondary: Self::DEFAULT_REWIND_SECONDARY,
            forward_primary: Self::DEFAULT_FORWARD_PRIMARY,
            forward_secondary: Self::DEFAULT_FORWARD_SECONDARY,
            language: Language::Auto,
            schema_version: 0,
        }
    }
}

impl PreferenceSet {
    pub const DEFAULT_REWIND_PRIMARY: Seconds = Seconds::literal(30);
    pub const DEFAULT_REWIND_SECONDARY: Seconds = Seconds::literal(10);
    pub const DEFAULT_FORWARD_SECONDARY: Seconds = Seconds::literal(10);
    pub const DEFAULT_FORWARD_PRIMARY: Seconds = Seconds::literal(30);

    /// Defaults stamped with a schema version, as written on install/reset.
    pub fn stamped(schema_version: u32) -> Self {
        Self {
            schema_version,
            ..Self::default()
        }
    }

    pub fn default_seconds(slot: SeekSlot) -> Seconds {
        match slot {
            SeekSlot::RewindPrimary => Self::DEFAULT_REWIND_PRIMARY,
            SeekSlot::RewindSecondary => Self::DEFAULT_REWIND_SECONDARY,
            SeekSlot::ForwardSecondary => Self::DEFAULT_FORWARD_SECONDARY,
            SeekSlot::ForwardPrimary => Self::DEFAULT_FORWARD_PRIMARY,
        }
    }

    /// Merges a stored record over the defaults.
    pub fn from_record(record: &PreferenceRecord) -> Self {
        let mut set = Self::default();
        set.apply(&PreferencePatch::from_record(record));
        set
    }

    pub fn to_record(&self) -> PreferenceRecord {
        PreferencePatch::from(self).to_record()
    }

    pub fn seconds(&self, slot: SeekSlot) -> Seconds {
        match slot {
            SeekSlot::RewindPrimary => self.rewind_primary,
            SeekSlot::RewindSecondary => self.rewind_secondary,
            SeekSlot::ForwardSecondary => self.forward_secondary,
            SeekSlot::ForwardPrimary => self.forward_primary,
        }
    }

    fn seconds_mut(&mut self, slot: SeekSlot) -> &mut Seconds {
        match slot {
            SeekSlot::RewindPrimary => &mut self.rewind_primary,
            SeekSlot::RewindSecondary => &mut self.rewind_secondary,
            SeekSlot::ForwardSecondary => &mut self.forward_secondary,
            SeekSlot::ForwardPrimary => &mut self.forward_primary,
        }
    }

    /// Signed seek delta for a slot: negative for rewind.
    pub fn seek_delta(&self, slot: SeekSlot) -> f64 {
        let seconds = self.seconds(slot).as_f64();
        if slot.is_rewind() { -seconds } else { seconds }
    }

    /// Overwrites every field present in `patch`. Applying the same patch
    /// again is a no-op.
    pub fn apply(&mut self, patch: &PreferencePatch) {
        for slot in SeekSlot::ALL {
            if let Some(seconds) = patch.seconds(slot) {
                *self.seconds_mut(slot) = seconds;
            }
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(version) = patch.schema_version {
            self.schema_version = version;
        }
    }
}

/// A partial [`PreferenceSet`]: the `settings` payload of an
/// `updateSettings` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewind_primary: Option<Seconds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewind_secondary: Option<Seconds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_primary: Option<Seconds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_secondary: Option<Seconds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
}

impl PreferencePatch {
    pub fn seconds(&self, slot: SeekSlot) -> Option<Seconds> {
        match slot {
            SeekSlot::RewindPrimary => self.rewind_primary,
            SeekSlot::RewindSecondary => self.rewind_secondary,
            SeekSlot::ForwardSecondary => self.forward_secondary,
            SeekSlot::ForwardPrimary => self.forward_primary,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reads the well-formed entries of a record; malformed ones are left
    /// out so the defaults win.
    pub fn from_record(record: &PreferenceRecord) -> Self {
        let seconds =
            |key| record.get(key).and_then(Seconds::from_value);
        Self {
            rewind_primary: seconds(PreferenceKey::RewindPrimary),
            rewind_secondary: seconds(PreferenceKey::RewindSecondary),
            forward_primary: seconds(PreferenceKey::ForwardPrimary),
            forward_secondary: seconds(PreferenceKey::ForwardSecondary),
            language: record
                .get(PreferenceKey::Language)
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse().ok()),
            schema_version: record
                .get(PreferenceKey::SchemaVersion)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
        }
    }

    pub fn to_record(&self) -> PreferenceRecord {
        let mut record = PreferenceRecord::new();
        for slot in SeekSlot::ALL {
            if let Some(seconds) = self.seconds(slot) {
                record.insert(slot.key(), seconds);
            }
        }
        if let Some(language) = self.language {
            record.insert(PreferenceKey::Language, language.as_str());
        }
        if let Some(version) = self.schema_version {
            record.insert(PreferenceKey::SchemaVersion, version);
        }
        record
    }
}

impl From<&PreferenceSet> for PreferencePatch {
    fn from(set: &PreferenceSet) -> Self {
        Self {
            rewind_primary: Some(set.rewind_primary),
            rewind_secondary: Some(set.rewind_secondary),
            forward_primary: Some(set.forward_primary),
            forward_secondary: Some(set.forward_secondary),
            language: Some(set.language),
            schema_version: Some(set.schema_version),
        }
    }
}
