//! Commands delivered to a page agent and the answers it sends back.

use serde::{Deserialize, Serialize};
use vidpace_model::PreferencePatch;

/// Command sent to a page agent over the messaging channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageCommand {
    /// Set the playback rate of every ready media element.
    SetSpeed { speed: f64 },
    /// Merge changed preferences into the agent's bindings.
    UpdateSettings { settings: PreferencePatch },
    /// Move every seekable media element by a signed offset.
    #[serde(rename_all = "camelCase")]
    Seek { delta_seconds: f64 },
}

impl PageCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetSpeed { .. } => "setSpeed",
            Self::UpdateSettings { .. } => "updateSettings",
            Self::Seek { .. } => "seek",
        }
    }
}

/// Result of a speed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SpeedOutcome {
    /// The page has no media elements at all.
    NoMedia,
    /// Media elements exist but none has loaded metadata yet.
    NotReady { tracked: usize },
    /// The rate was set on `count` elements.
    Applied { count: usize },
}

impl SpeedOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Number of elements whose rate was changed.
    pub fn videos_found(&self) -> usize {
        match self {
            Self::Applied { count } => *count,
            Self::NoMedia | Self::NotReady { .. } => 0,
        }
    }
}

/// Answer to a [`PageCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "ResponseWire")]
pub enum PageResponse {
    Speed(SpeedOutcome),
    SettingsApplied,
    Seeked { moved: usize },
}

impl PageResponse {
    pub fn success(&self) -> bool {
        match self {
            Self::Speed(outcome) => outcome.success(),
            Self::SettingsApplied => true,
            Self::Seeked { moved } => *moved > 0,
        }
    }
}

/// Flat wire form: `{success, videosFound, outcome}` for speed changes,
/// `{success}` for settings, `{success, moved}` for seeks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseWire {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    videos_found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    moved: Option<usize>,
    #[serde(flatten)]
    outcome: Option<SpeedOutcome>,
}

impl From<PageResponse> for ResponseWire {
    fn from(response: PageResponse) -> Self {
        let success = response.success();
        match response {
            PageResponse::Speed(outcome) => Self {
                success,
                videos_found: Some(outcome.videos_found()),
                moved: None,
                outcome: Some(outcome),
            },
            PageResponse::SettingsApplied => Self {
                success,
                videos_found: None,
                moved: None,
                outcome: None,
            },
            PageResponse::Seeked { moved } => Self {
                success,
                videos_found: None,
                moved: Some(moved),
                outcome: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_use_action_tag() {
        let command: PageCommand =
            serde_json::from_value(json!({ "action": "setSpeed", "speed": 1.5 }))
                .unwrap();
        assert_eq!(command, PageCommand::SetSpeed { speed: 1.5 });

        let command: PageCommand = serde_json::from_value(json!({
            "action": "updateSettings",
            "settings": { "rewindPrimary": 45 }
        }))
        .unwrap();
        match command {
            PageCommand::UpdateSettings { settings } => {
                assert_eq!(settings.rewind_primary.map(|s| s.get()), Some(45));
                assert_eq!(settings.forward_primary, None);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert_eq!(
            serde_json::to_value(PageCommand::Seek { delta_seconds: -10.0 })
                .unwrap(),
            json!({ "action": "seek", "deltaSeconds": -10.0 })
        );
    }

    #[test]
    fn unknown_actions_are_rejected() {
        let parsed = serde_json::from_value::<PageCommand>(
            json!({ "action": "settingsChanged" }),
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn speed_response_wire_shape() {
        let applied = PageResponse::Speed(SpeedOutcome::Applied { count: 2 });
        assert_eq!(
            serde_json::to_value(applied).unwrap(),
            json!({ "success": true, "videosFound": 2, "outcome": "applied", "count": 2 })
        );

        let not_ready =
            PageResponse::Speed(SpeedOutcome::NotReady { tracked: 3 });
        assert_eq!(
            serde_json::to_value(not_ready).unwrap(),
            json!({ "success": false, "videosFound": 0, "outcome": "notReady", "tracked": 3 })
        );

        assert_eq!(
            serde_json::to_value(PageResponse::SettingsApplied).unwrap(),
            json!({ "success": true })
        );
    }
}
