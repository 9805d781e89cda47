use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Language preference as stored.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Follow the host UI locale
    #[default]
    Auto,
    En,
    Zh,
}

/// A concrete language after `Auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedLanguage {
    En,
    Zh,
}

impl Language {
    pub const ALL: [Language; 3] = [Self::Auto, Self::En, Self::Zh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::En => "en",
            Self::Zh => "zh",
        }
    }

    /// Resolves `Auto` against a host locale such as `zh-CN` or `en-US`.
    pub fn resolve(self, ui_locale: &str) -> ResolvedLanguage {
        match self {
            Self::En => ResolvedLanguage::En,
            Self::Zh => ResolvedLanguage::Zh,
            Self::Auto => {
                if ui_locale.to_ascii_lowercase().starts_with("zh") {
                    ResolvedLanguage::Zh
                } else {
                    ResolvedLanguage::En
                }
            }
        }
    }
}

impl FromStr for Language {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "en" => Ok(Self::En),
            "zh" => Ok(Self::Zh),
            _ => Err(ModelError::UnknownLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_follows_locale_prefix() {
        assert_eq!(Language::Auto.resolve("zh-CN"), ResolvedLanguage::Zh);
        assert_eq!(Language::Auto.resolve("ZH_tw"), ResolvedLanguage::Zh);
        assert_eq!(Language::Auto.resolve("en-US"), ResolvedLanguage::En);
        assert_eq!(Language::Auto.resolve(""), ResolvedLanguage::En);
        assert_eq!(Language::En.resolve("zh-CN"), ResolvedLanguage::En);
    }

    #[test]
    fn parses_stored_spelling() {
        assert_eq!("zh".parse::<Language>(), Ok(Language::Zh));
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(
            serde_json::to_string(&Language::Auto).ok().as_deref(),
            Some("\"auto\"")
        );
    }
}
