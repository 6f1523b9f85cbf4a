//! Locale type: the closed set of display languages the site ships.

use crate::storage::Storage;
use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;

/// Storage key holding the visitor's chosen locale.
pub const LANG_STORAGE_KEY: &str = "caffeArtLang";

/// A supported display language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Serbian, the site's default language.
    #[default]
    Sr,
    En,
}

impl Locale {
    /// Create a Locale from a language code.
    ///
    /// # Returns
    /// * `Ok(Locale)` for `sr` or `en`
    /// * `Err` for anything else (codes are case-sensitive, as stored)
    pub fn from_code(code: &str) -> Result<Locale> {
        match code {
            "sr" => Ok(Locale::Sr),
            "en" => Ok(Locale::En),
            _ => bail!("Unknown language code: '{}'", code),
        }
    }

    /// The persisted preference, if present and valid.
    pub fn from_storage(storage: &dyn Storage) -> Option<Locale> {
        storage
            .get(LANG_STORAGE_KEY)
            .and_then(|code| Locale::from_code(&code).ok())
    }

    /// ISO 639-1 code, as used in storage, `data-lang` and the `lang` attribute.
    pub fn code(&self) -> &'static str {
        match self {
            Locale::Sr => "sr",
            Locale::En => "en",
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Locale::default()
    }

    /// Site-relative path of this locale's translation document.
    pub fn translation_path(&self, prefix: &str) -> String {
        format!("{}assets/lang/{}.json", prefix, self.code())
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_default_is_serbian() {
        assert_eq!(Locale::default(), Locale::Sr);
        assert!(Locale::Sr.is_default());
        assert!(!Locale::En.is_default());
    }

    #[test]
    fn test_from_code_valid() {
        assert_eq!(Locale::from_code("sr").unwrap(), Locale::Sr);
        assert_eq!(Locale::from_code("en").unwrap(), Locale::En);
    }

    #[test]
    fn test_from_code_invalid() {
        let result = Locale::from_code("de");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown"));

        assert!(Locale::from_code("EN").is_err());
        assert!(Locale::from_code("").is_err());
    }

    #[test]
    fn test_from_storage_ignores_invalid_values() {
        let storage = MemoryStorage::with_entries([(LANG_STORAGE_KEY, "fr")]);
        assert_eq!(Locale::from_storage(&storage), None);

        storage.set(LANG_STORAGE_KEY, "en");
        assert_eq!(Locale::from_storage(&storage), Some(Locale::En));
    }

    #[test]
    fn test_translation_path() {
        assert_eq!(Locale::En.translation_path(""), "assets/lang/en.json");
        assert_eq!(Locale::Sr.translation_path("../"), "../assets/lang/sr.json");
    }

    #[test]
    fn test_display_uses_code() {
        assert_eq!(Locale::En.to_string(), "en");
        assert_eq!(Locale::Sr.to_string(), "sr");
    }
}
