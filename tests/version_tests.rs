use std::cmp::Ordering;

use ai_facade::AIModelVersion;

#[test]
fn test_parse_common_model_names() {
    let cases = [
        ("gpt-4o", "gpt", 4, 0),
        ("gpt-4.1-mini", "gpt", 4, 1),
        ("gpt-5-mini", "gpt", 5, 0),
        ("gpt-5.1", "gpt", 5, 1),
        ("claude-3-5-sonnet-20241022", "claude", 3, 5),
        ("claude-sonnet-4-5-20250929", "claude", 4, 5),
        ("claude-opus-4-1", "claude", 4, 1),
        ("gemini-2.5-flash", "gemini", 2, 5),
        ("o3-mini", "o", 3, 0),
        ("meta-llama/Llama-3.3-70B-Instruct", "llama", 3, 3),
        ("models/gemini-1.5-pro", "gemini", 1, 5),
    ];

    for (model, family, major, minor) in cases {
        let version = AIModelVersion::parse(model);
        assert_eq!(version.family(), family, "family of {}", model);
        assert_eq!((version.major(), version.minor()), (major, minor), "version of {}", model);
    }
}

#[test]
fn test_date_suffix_is_not_a_minor_version() {
    let version = AIModelVersion::parse("claude-sonnet-4-20250514");
    assert_eq!((version.major(), version.minor()), (4, 0));
}

#[test]
fn test_unversioned_model_is_zero() {
    let version = AIModelVersion::parse("mistral-large-latest");
    assert_eq!(version.family(), "mistral");
    assert_eq!((version.major(), version.minor()), (0, 0));
}

#[test]
fn test_family_is_case_insensitive() {
    let version = AIModelVersion::new("GPT", 5, 0);
    assert_eq!(version.family(), "gpt");
    assert!(version <= AIModelVersion::parse("GPT-5-MINI"));
}

#[test]
fn test_threshold_comparison() {
    let threshold = AIModelVersion::new("gpt", 5, 0);
    assert!(threshold <= AIModelVersion::parse("gpt-5-mini"));
    assert!(threshold <= AIModelVersion::parse("gpt-5.1"));
    assert!(AIModelVersion::parse("gpt-4o") < threshold);
    assert!(AIModelVersion::parse("gpt-4.1") < threshold);
}

#[test]
fn test_different_families_are_incomparable() {
    let gpt = AIModelVersion::new("gpt", 5, 0);
    let claude = AIModelVersion::parse("claude-opus-4-1");

    assert_eq!(gpt.partial_cmp(&claude), None);
    assert!(!(gpt < claude));
    assert!(!(gpt >= claude));
    assert_ne!(gpt, claude);
}

#[test]
fn test_family_containment_matches() {
    let short = AIModelVersion::new("claude", 4, 5);
    let long = AIModelVersion::new("claudeinstant", 4, 5);
    assert!(short.same_family(&long));
    assert_eq!(short.partial_cmp(&long), Some(Ordering::Equal));
}

#[test]
fn test_empty_family_matches_nothing() {
    let unnamed = AIModelVersion::parse("1234");
    assert_eq!(unnamed.family(), "");
    assert!(!unnamed.same_family(&AIModelVersion::new("gpt", 1, 0)));
}

#[test]
fn test_display() {
    assert_eq!(AIModelVersion::new("gemini", 2, 5).to_string(), "gemini 2.5");
}
