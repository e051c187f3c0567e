//! Status fields the server encodes inconsistently: marker strings, `"1"`, `"true"`,
//! bare numbers or booleans. Each field gets one predicate and nothing else parses them.

use serde_json::Value;

pub const LIKED_MARKER: &str = "已点赞";
pub const NOT_LIKED_MARKER: &str = "未点赞";
pub const COLLECTED_MARKER: &str = "已收藏";
pub const NOT_COLLECTED_MARKER: &str = "未收藏";

fn status_text(status: Option<&Value>) -> Option<String> {
    match status? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

fn marked(status: Option<&Value>, marker: &str) -> bool {
    let Some(text) = status_text(status) else {
        return false;
    };
    text.contains(marker) || text == "1" || text.eq_ignore_ascii_case("true")
}

pub fn is_liked(like_status: Option<&Value>) -> bool {
    marked(like_status, LIKED_MARKER)
}

pub fn is_collected(collect_status: Option<&Value>) -> bool {
    marked(collect_status, COLLECTED_MARKER)
}

/// `useful` is sent as `1`/`0`, occasionally as a string.
pub fn is_useful(useful: Option<&Value>) -> bool {
    matches!(status_text(useful).as_deref(), Some("1") | Some("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn like_status_accepts_every_encoding() {
        assert!(is_liked(Some(&json!("已点赞"))));
        assert!(is_liked(Some(&json!("1"))));
        assert!(is_liked(Some(&json!(1))));
        assert!(is_liked(Some(&json!("TRUE"))));
        assert!(is_liked(Some(&json!(true))));

        assert!(!is_liked(Some(&json!("未点赞"))));
        assert!(!is_liked(Some(&json!(0))));
        assert!(!is_liked(Some(&json!(false))));
        assert!(!is_liked(Some(&json!(""))));
        assert!(!is_liked(Some(&json!(" 1 "))));
        assert!(!is_liked(Some(&Value::Null)));
        assert!(!is_liked(None));
    }

    #[test]
    fn collect_marker_is_separate_from_like_marker() {
        assert!(is_collected(Some(&json!("已收藏"))));
        assert!(!is_collected(Some(&json!("已点赞"))));
        assert!(!is_collected(Some(&json!("未收藏"))));
    }

    #[test]
    fn useful_flag() {
        assert!(is_useful(Some(&json!(1))));
        assert!(is_useful(Some(&json!("1"))));
        assert!(!is_useful(Some(&json!(0))));
        assert!(!is_useful(Some(&json!(" 1"))));
        assert!(!is_useful(None));
    }
}
