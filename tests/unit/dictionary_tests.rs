/*!
 * Tests for dictionary loading and custom entries
 */

use anyhow::Result;

use sheet_translator::language_utils::Direction;
use sheet_translator::translation::dictionary::add_custom_translation;
use sheet_translator::translation::{TermTable, TranslationDictionary};

use crate::common;

/// Longer phrases are substituted before shorter ones they contain
#[test]
fn test_lookup_withOverlappingTerms_shouldPreferLongestPhrase() {
    let dictionary = TranslationDictionary::builtin();
    let found = dictionary.lookup("보고서 제출", Direction::KoToZh);
    assert!(found.matched_any);
    assert!(found.text.starts_with("报告书"));
}

/// Whitespace around an exact term does not prevent the match
#[test]
fn test_lookup_withPaddedTerm_shouldMatchExactly() {
    let dictionary = TranslationDictionary::builtin();
    let found = dictionary.lookup("  수주처 ", Direction::KoToZh);
    assert_eq!(found.text, "接单处");
    assert!(found.matched_any);
}

/// Text with no known phrase reports no match
#[test]
fn test_lookup_withUnknownText_shouldReportNoMatch() {
    let dictionary = TranslationDictionary::builtin();
    let found = dictionary.lookup("처음 보는 문장", Direction::KoToZh);
    assert!(!found.matched_any);
    assert_eq!(found.text, "처음 보는 문장");
}

/// A custom file overrides the bundled vocabulary and adds new terms
#[test]
fn test_load_from_files_withCustomFile_shouldOverrideBuiltin() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let custom = common::create_test_file(
        temp_dir.path(),
        "custom.json",
        r#"{
            "ko_to_zh": { "business": { "발주서": "采购订单", "견적서": "报价单" } },
            "zh_to_ko": { "business": { "报价单": "견적서" } }
        }"#,
    )?;

    let dictionary = TranslationDictionary::load_from_files(None, Some(&custom))?;

    assert_eq!(dictionary.lookup("발주서", Direction::KoToZh).text, "采购订单");
    assert_eq!(dictionary.lookup("견적서", Direction::KoToZh).text, "报价单");
    assert_eq!(dictionary.lookup("报价单", Direction::ZhToKo).text, "견적서");
    Ok(())
}

/// Missing dictionary files are skipped, leaving the bundled table
#[test]
fn test_load_from_files_withMissingFiles_shouldFallBackToBuiltin() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let missing = temp_dir.path().join("nope.json");

    let dictionary = TranslationDictionary::load_from_files(Some(&missing), Some(&missing))?;

    assert_eq!(
        dictionary.entry_count(Direction::KoToZh),
        TranslationDictionary::builtin().entry_count(Direction::KoToZh)
    );
    Ok(())
}

/// A malformed dictionary file is reported instead of silently ignored
#[test]
fn test_load_from_files_withInvalidJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let broken = common::create_test_file(temp_dir.path(), "broken.json", "{ not json")?;
    assert!(TranslationDictionary::load_from_files(Some(&broken), None).is_err());
    Ok(())
}

/// Entries added through the helper are picked up by the next load
#[test]
fn test_add_custom_translation_withNewFile_shouldBeLoadable() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("dict").join("custom.json");

    add_custom_translation(&path, Direction::KoToZh, "parts", "볼트", "螺栓")?;
    add_custom_translation(&path, Direction::KoToZh, "parts", "너트", "螺母")?;

    let dictionary = TranslationDictionary::load_from_files(None, Some(&path))?;
    assert_eq!(dictionary.lookup("볼트", Direction::KoToZh).text, "螺栓");
    assert_eq!(dictionary.lookup("너트", Direction::KoToZh).text, "螺母");
    assert_eq!(dictionary.lookup("螺栓", Direction::ZhToKo).text, "볼트");
    Ok(())
}

/// A term given only as Chinese to Korean also answers Korean to Chinese
#[test]
fn test_load_from_files_withReverseOnlyTerm_shouldDeriveForwardEntry() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let custom = common::create_test_file(
        temp_dir.path(),
        "custom.json",
        r#"{ "zh_to_ko": { "logistics": { "托盘": "팔레트" } } }"#,
    )?;

    let dictionary = TranslationDictionary::load_from_files(None, Some(&custom))?;

    assert_eq!(dictionary.lookup("托盘", Direction::ZhToKo).text, "팔레트");
    let forward = dictionary.lookup("팔레트", Direction::KoToZh);
    assert!(forward.matched_any);
    assert_eq!(forward.text, "托盘");
    assert_eq!(
        dictionary.entry_count(Direction::KoToZh),
        TranslationDictionary::builtin().entry_count(Direction::KoToZh) + 1
    );
    Ok(())
}
