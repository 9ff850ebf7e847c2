use serde::{Deserialize, Deserializer};

/// Trims a piece of free text and composes it into Unicode
/// Normalization Form C.
///
/// ```
/// use festival::normalization::normalize_text;
/// assert_eq!(normalize_text("  Cafe\u{301} "), "Caf\u{e9}");
/// ```
pub fn normalize_text(text: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    text.as_ref().trim().nfc().collect()
}

/// Strips every character that isn't an ASCII digit.
///
/// ```
/// use festival::normalization::digits_only;
/// assert_eq!(digits_only("+91 98765-43210"), "919876543210");
/// ```
pub fn digits_only(raw: impl AsRef<str>) -> String {
    raw.as_ref().chars().filter(char::is_ascii_digit).collect()
}

/// Deserializes an optional `String` through `normalize_text`, mapping
/// blank values to `None`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(o.map(normalize_text).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use unicode_normalization::is_nfc;

    use super::{digits_only, normalize_text};

    #[test]
    fn blank_optional_text_is_dropped() {
        #[derive(serde::Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "super::deserialize_option")]
            value: Option<String>,
        }

        let blank: Holder = serde_json::from_str(r#"{"value": "   "}"#).unwrap();
        assert_eq!(blank.value, None);

        let missing: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.value, None);

        let null: Holder = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(null.value, None);

        let present: Holder = serde_json::from_str(r#"{"value": " hi "}"#).unwrap();
        assert_eq!(present.value.as_deref(), Some("hi"));
    }

    proptest! {
        #[test]
        fn normalization_trims_and_composes(string in "(\\S.*\\S|\\S+)", space_before in "\\s*", space_after in "\\s*") {
            let normalized = normalize_text(format!("{}{}{}", space_before, string, space_after));

            prop_assert!(is_nfc(&normalized), "{:?} (normalized form of {:?}) is in NFC", normalized, string);
            prop_assert!(!normalized.starts_with(char::is_whitespace) && !normalized.ends_with(char::is_whitespace), "{:?} has no leading or trailing whitespace", normalized);
        }

        #[test]
        fn digits_survive_stripping(digits in "[0-9]{1,12}", noise in "[ ()+.-]{0,4}") {
            let noisy = format!("{}{}{}", noise, digits, noise);

            prop_assert_eq!(digits_only(&noisy), digits);
        }
    }
}
