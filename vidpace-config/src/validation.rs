use std::collections::HashSet;

use vidpace_model::SeekSlot;

use crate::loader::ConfigLoadError;
use crate::models::VidpaceConfig;

/// Guard rails applied after every source has been layered in.
pub fn validate(config: &VidpaceConfig) -> Result<(), ConfigLoadError> {
    if config.feedback_interval.is_zero() {
        return Err(ConfigLoadError::Validation(
            "feedback_interval must be greater than zero".into(),
        ));
    }
    if config.notification_interval.is_zero() {
        return Err(ConfigLoadError::Validation(
            "notification_interval must be greater than zero".into(),
        ));
    }
    if config.channel_capacity == 0 {
        return Err(ConfigLoadError::Validation(
            "channel_capacity must be at least 1".into(),
        ));
    }
    if let Some(bad) = config
        .speed_presets
        .iter()
        .find(|rate| !rate.is_finite() || **rate <= 0.0)
    {
        return Err(ConfigLoadError::Validation(format!(
            "speed preset {bad} must be a positive, finite rate"
        )));
    }

    let mut seen = HashSet::new();
    for slot in SeekSlot::ALL {
        let key = config.key_bindings.key(slot);
        if key.is_whitespace() {
            return Err(ConfigLoadError::Validation(format!(
                "{slot:?} is bound to whitespace"
            )));
        }
        if !seen.insert(key.to_lowercase().to_string()) {
            return Err(ConfigLoadError::Validation(format!(
                "key {key:?} is bound more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyBindings;
    use std::time::Duration;

    #[test]
    fn defaults_pass() {
        assert!(validate(&VidpaceConfig::default()).is_ok());
    }

    #[test]
    fn duplicate_bindings_ignore_case() {
        let config = VidpaceConfig {
            key_bindings: KeyBindings {
                forward_primary: 'Z',
                ..KeyBindings::default()
            },
            ..VidpaceConfig::default()
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigLoadError::Validation(_))
        ));
    }

    #[test]
    fn rejects_non_positive_presets_and_zero_intervals() {
        let presets = VidpaceConfig {
            speed_presets: vec![1.0, 0.0],
            ..VidpaceConfig::default()
        };
        assert!(validate(&presets).is_err());

        let nan = VidpaceConfig {
            speed_presets: vec![f64::NAN],
            ..VidpaceConfig::default()
        };
        assert!(validate(&nan).is_err());

        let interval = VidpaceConfig {
            feedback_interval: Duration::ZERO,
            ..VidpaceConfig::default()
        };
        assert!(validate(&interval).is_err());
    }
}
