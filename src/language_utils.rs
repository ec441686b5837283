use anyhow::{Result, anyhow};
use isolang::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Script detection and translation direction helpers
///
/// The classifier functions are pure and only look at Unicode blocks:
/// Hangul syllables for Korean, CJK Unified Ideographs for Chinese.

/// First and last code point of the Hangul syllable block
const HANGUL_SYLLABLES: (char, char) = ('\u{AC00}', '\u{D7A3}');

/// First and last code point of the CJK Unified Ideographs block
const CJK_UNIFIED: (char, char) = ('\u{4E00}', '\u{9FFF}');

/// True when any character is a Hangul syllable
pub fn contains_korean_script(text: &str) -> bool {
    text.chars()
        .any(|c| (HANGUL_SYLLABLES.0..=HANGUL_SYLLABLES.1).contains(&c))
}

/// True when any character is a CJK unified ideograph
pub fn contains_han_script(text: &str) -> bool {
    text.chars()
        .any(|c| (CJK_UNIFIED.0..=CJK_UNIFIED.1).contains(&c))
}

/// True when the trimmed text consists only of ASCII letters, digits,
/// whitespace and the punctuation `.,-()[]{}@:/`
pub fn is_latin_only(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.chars().all(is_latin_char)
}

fn is_latin_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(c, '.' | ',' | '-' | '(' | ')' | '[' | ']' | '{' | '}' | '@' | ':' | '/')
}

/// Translation direction between Korean and Chinese
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    // @direction: Korean source, Chinese target
    #[default]
    KoToZh,
    // @direction: Chinese source, Korean target
    ZhToKo,
}

impl Direction {
    // @returns: ISO 639-1 code of the source language
    pub fn source_code(&self) -> &'static str {
        match self {
            Self::KoToZh => "ko",
            Self::ZhToKo => "zh",
        }
    }

    // @returns: ISO 639-1 code of the target language
    pub fn target_code(&self) -> &'static str {
        match self {
            Self::KoToZh => "zh",
            Self::ZhToKo => "ko",
        }
    }

    /// Whether `text` contains characters of this direction's source script
    pub fn has_source_script(&self, text: &str) -> bool {
        match self {
            Self::KoToZh => contains_korean_script(text),
            Self::ZhToKo => contains_han_script(text),
        }
    }

    /// Suffix appended to a sheet name when the translation goes to a new sheet
    pub fn sheet_suffix(&self) -> &'static str {
        match self {
            Self::KoToZh => "_中文",
            Self::ZhToKo => "_한국어",
        }
    }

    // @returns: Snake-case identifier used in config and dictionary files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KoToZh => "ko_to_zh",
            Self::ZhToKo => "zh_to_ko",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ko_to_zh" | "ko_zh" => Ok(Self::KoToZh),
            "zh_to_ko" | "zh_ko" => Ok(Self::ZhToKo),
            _ => Err(anyhow!("Invalid direction: {}", s)),
        }
    }
}

/// English name of a language from its ISO 639-1 code
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = Language::from_639_1(&code.trim().to_lowercase())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))?;
    Ok(lang.to_name().to_string())
}
