//! Property tests for translation and classification.
//!
//! Covers the invariants that must hold for any input: method inference
//! from data flags, cookie-flag precedence, and translation never panicking
//! on arbitrary shell noise.

use proptest::prelude::*;
use reqprobe_core::{classify_query, classify_str, translate, FieldType, HttpMethod};

fn data_flag() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("-d"), Just("--data"), Just("--data-raw"), Just("--data-binary")]
}

fn header_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9=/._]{1,16}"
}

#[test]
fn json_example_translates_and_classifies() {
    let req = translate(
        r#"curl 'http://x/api/echo' -H 'Content-Type: application/json' -d '{"level":5}'"#,
    );
    assert_eq!(req.method, HttpMethod::Post);
    let fields = reqprobe_core::classify_body(
        req.body.as_deref().unwrap(),
        req.content_type(),
        &Default::default(),
    );
    assert_eq!(fields.len(), 1);
    assert_eq!(fields["level"], FieldType::Number);
}

proptest! {
    #[test]
    fn prop_data_without_method_is_post(
        flag in data_flag(),
        path in "[a-z]{1,10}",
        body in "[a-z0-9=&]{1,20}",
    ) {
        let req = translate(&format!("curl https://x/{path} {flag} '{body}'"));
        prop_assert_eq!(req.method, HttpMethod::Post);
        prop_assert_eq!(req.body.as_deref(), Some(body.as_str()));
    }

    #[test]
    fn prop_no_data_no_method_is_get(
        path in "[a-z]{1,10}",
        name in "X-[A-Za-z]{1,8}",
        value in header_value(),
    ) {
        let req = translate(&format!("curl https://x/{path} -H '{name}: {value}'"));
        prop_assert_eq!(req.method, HttpMethod::Get);
        prop_assert!(req.body.is_none());
        prop_assert_eq!(req.headers.get(&name), Some(&value));
    }

    #[test]
    fn prop_cookie_flag_always_wins(
        cookie in "[a-z]{1,8}=[a-z0-9]{1,8}",
        stale in header_value(),
        cookie_first in any::<bool>(),
    ) {
        let text = if cookie_first {
            format!("curl https://x -b '{cookie}' -H 'Set-Cookie: {stale}'")
        } else {
            format!("curl https://x -H 'Set-Cookie: {stale}' -b '{cookie}'")
        };
        let req = translate(&text);
        prop_assert_eq!(req.headers.get("Cookie"), Some(&cookie));
        prop_assert!(!req.headers.contains_key("Set-Cookie"));
    }

    #[test]
    fn prop_translate_never_panics(text in any::<String>()) {
        let req = translate(&text);
        prop_assert!(!req.method.as_str().is_empty());
    }

    #[test]
    fn prop_translate_never_panics_on_shell_noise(
        text in r#"curl[ -'"\\a-zA-Z0-9:=@{}\n]{0,60}"#,
    ) {
        let _ = translate(&text);
    }

    #[test]
    fn prop_iso_dates_classify_as_dates(y in 1000u32..9999, m in 1u32..12, d in 1u32..28) {
        let date = format!("{y:04}-{m:02}-{d:02}");
        prop_assert_eq!(classify_str(&date), FieldType::DateYyyyMmDd);
    }

    #[test]
    fn prop_integers_classify_as_numbers(n in any::<i64>()) {
        prop_assert_eq!(classify_str(&n.to_string()), FieldType::Number);
    }

    #[test]
    fn prop_query_last_duplicate_wins(first in "[a-z]{3,6}", n in 0u32..1000) {
        let fields = classify_query(&format!("https://x/?k={first}&k={n}"));
        prop_assert_eq!(fields.len(), 1);
        prop_assert_eq!(fields["k"], FieldType::Number);
    }
}
