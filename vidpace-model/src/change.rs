use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::preferences::{PreferenceKey, PreferencePatch, PreferenceRecord};

/// Old and new value of one key in a change notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Change notification emitted by the preference store: one entry per key
/// whose value changed in a single write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreChange(BTreeMap<PreferenceKey, ValueChange>);

impl StoreChange {
    pub fn insert(&mut self, key: PreferenceKey, change: ValueChange) {
        self.0.insert(key, change);
    }

    pub fn get(&self, key: PreferenceKey) -> Option<&ValueChange> {
        self.0.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = PreferenceKey> + '_ {
        self.0.keys().copied()
    }

    /// New values of every changed key, as a record.
    pub fn new_values(&self) -> PreferenceRecord {
        self.0
            .iter()
            .filter_map(|(key, change)| {
                change.new_value.clone().map(|value| (*key, value))
            })
            .collect()
    }

    /// The well-formed new values as a settings patch.
    pub fn to_patch(&self) -> PreferencePatch {
        PreferencePatch::from_record(&self.new_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_carries_new_values_only() {
        let mut change = StoreChange::default();
        change.insert(
            PreferenceKey::RewindPrimary,
            ValueChange {
                old_value: Some(json!(30)),
                new_value: Some(json!(45)),
            },
        );
        change.insert(
            PreferenceKey::Language,
            ValueChange {
                old_value: Some(json!("auto")),
                new_value: None,
            },
        );

        let patch = change.to_patch();
        assert_eq!(patch.rewind_primary.map(|s| s.get()), Some(45));
        assert_eq!(patch.language, None);
    }

    #[test]
    fn serializes_as_key_to_old_new_pairs() {
        let mut change = StoreChange::default();
        change.insert(
            PreferenceKey::ForwardPrimary,
            ValueChange {
                old_value: None,
                new_value: Some(json!(60)),
            },
        );
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({ "forwardPrimary": { "newValue": 60 } })
        );
    }
}
