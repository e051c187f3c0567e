use once_cell::sync::Lazy;
use regex::Regex;

static ABSOLUTE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid absolute url regex"));

pub fn is_absolute_url(value: &str) -> bool {
    ABSOLUTE_URL.is_match(value)
}

/// Turns one stored image key into a fetchable URL.
///
/// Absolute URLs pass through. Relative keys are joined to `asset_base_url` with
/// exactly one slash; without a base the key is returned trimmed.
pub fn normalize_image_url(key: &str, asset_base_url: Option<&str>) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() || is_absolute_url(trimmed) {
        return trimmed.to_string();
    }
    let prefix = asset_base_url.map(str::trim).unwrap_or_default();
    if prefix.is_empty() {
        return trimmed.to_string();
    }
    let path = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if prefix.ends_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

/// Splits a comma-joined image field into normalized URLs, dropping blanks.
pub fn parse_image_list(images: Option<&str>, asset_base_url: Option<&str>) -> Vec<String> {
    let Some(images) = images else {
        return Vec::new();
    };
    images
        .split(',')
        .map(|item| normalize_image_url(item, asset_base_url))
        .filter(|item| !item.is_empty())
        .collect()
}

pub fn join_image_keys(keys: &[String]) -> String {
    keys.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_list_is_prefixed_where_relative() {
        assert_eq!(
            parse_image_list(Some("a.jpg,https://x/y.png"), Some("https://cdn/")),
            vec!["https://cdn/a.jpg".to_string(), "https://x/y.png".to_string()]
        );
    }

    #[test]
    fn exactly_one_slash_at_the_join() {
        assert_eq!(
            normalize_image_url("/img/a.png", Some("https://cdn")),
            "https://cdn/img/a.png"
        );
        assert_eq!(
            normalize_image_url("img/a.png", Some("https://cdn/")),
            "https://cdn/img/a.png"
        );
    }

    #[test]
    fn absolute_urls_are_idempotent() {
        let once = normalize_image_url("HTTPS://x/y.png", Some("https://cdn/"));
        let twice = normalize_image_url(&once, Some("https://cdn/"));
        assert_eq!(once, twice);

        let relative = normalize_image_url("a.jpg", Some("https://cdn/"));
        assert_eq!(normalize_image_url(&relative, Some("https://cdn/")), relative);
    }

    #[test]
    fn blanks_and_missing_field_yield_nothing() {
        assert!(parse_image_list(None, Some("https://cdn/")).is_empty());
        assert!(parse_image_list(Some(""), Some("https://cdn/")).is_empty());
        assert_eq!(
            parse_image_list(Some(" a.jpg , ,"), None),
            vec!["a.jpg".to_string()]
        );
    }
}
