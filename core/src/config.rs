use crate::corpus::Item;
use crate::tokenizer::TokenizerOptions;
use crate::{RecommendError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MATCHED_TERMS: usize = 5;
pub const MIN_MATCHED_TERMS: usize = 3;
pub const MAX_MATCHED_TERMS: usize = 5;

/// Which item fields feed the vectorizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFields {
    #[default]
    Description,
    TitleAndDescription,
}

impl TextFields {
    pub fn text_of(&self, item: &Item) -> String {
        match self {
            TextFields::Description => item.description.clone(),
            TextFields::TitleAndDescription => format!("{} {}", item.title, item.description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub text_fields: TextFields,
    /// Keep only this many terms, ranked by total count across the corpus.
    /// Terms below the cut are dropped from weighting and from explanations.
    pub max_features: Option<usize>,
    /// Use 1 + ln(count) instead of the raw count as term frequency.
    pub sublinear_tf: bool,
    pub stem: bool,
    pub matched_terms: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            text_fields: TextFields::Description,
            max_features: None,
            sublinear_tf: false,
            stem: false,
            matched_terms: DEFAULT_MATCHED_TERMS,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == Some(0) {
            return Err(RecommendError::InvalidConfig("max_features must be at least 1".into()));
        }
        if !(MIN_MATCHED_TERMS..=MAX_MATCHED_TERMS).contains(&self.matched_terms) {
            return Err(RecommendError::InvalidConfig(format!(
                "matched_terms must be in {MIN_MATCHED_TERMS}..={MAX_MATCHED_TERMS}, got {}",
                self.matched_terms
            )));
        }
        Ok(())
    }

    pub fn tokenizer(&self) -> TokenizerOptions {
        TokenizerOptions { stem: self.stem }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_cap_and_bad_matched_terms() {
        let cfg = BuildConfig { max_features: Some(0), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RecommendError::InvalidConfig(_))));
        let cfg = BuildConfig { matched_terms: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(RecommendError::InvalidConfig(_))));
    }

    #[test]
    fn matched_terms_stay_within_three_to_five() {
        for n in [0, 2, 6, 16] {
            let cfg = BuildConfig { matched_terms: n, ..Default::default() };
            assert!(matches!(cfg.validate(), Err(RecommendError::InvalidConfig(_))), "{n} accepted");
        }
        for n in 3..=5 {
            assert!(BuildConfig { matched_terms: n, ..Default::default() }.validate().is_ok());
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: BuildConfig = serde_json::from_str(r#"{"stem": true}"#).unwrap();
        assert!(cfg.stem);
        assert_eq!(cfg.matched_terms, DEFAULT_MATCHED_TERMS);
        assert_eq!(cfg.text_fields, TextFields::Description);
    }
}
