use isolang::Language;

use super::ConfigError;

/// Resolve a language code or English language name to the ISO 639-1 code
/// used by the live listing, e.g. `"French"`, `"fra"` and `"FR"` all give
/// `"fr"`.
pub fn resolve_language(raw: &str) -> Result<String, ConfigError> {
    let needle = raw.trim().to_lowercase();
    let language = match needle.len() {
        2 => Language::from_639_1(&needle),
        3 => Language::from_639_3(&needle),
        _ => None,
    }
    .or_else(|| Language::from_name_lowercase(&needle));

    language
        .and_then(|l| l.to_639_1())
        .map(str::to_string)
        .ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "recorder.language {:?} is not a known language with a two-letter code",
                raw
            ))
        })
}
