use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Reads an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Wrapper every API response travels in. `code == "0"` is the only success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub records: Vec<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    /// 1-based number of the page this response carries.
    #[serde(default, deserialize_with = "null_as_default")]
    pub current: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u64>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.current.saturating_mul(self.size) < self.total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub solved_flag: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub like_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collect_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub create_time: String,
}

impl Question {
    pub fn is_solved(&self) -> bool {
        self.solved_flag == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question_id: i64,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
    #[serde(default)]
    pub top_comment_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub images: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub like_count: i64,
    #[serde(default)]
    pub like_status: Option<Value>,
    #[serde(default)]
    pub useful: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub create_time: String,
    /// Server-side threading: direct replies of a top comment.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub child_comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Comment,
    Like,
    Collect,
    Useful,
    System,
}

impl MessageType {
    /// Tab order of the message center.
    pub const ALL: [MessageType; 5] = [
        MessageType::Comment,
        MessageType::Like,
        MessageType::Collect,
        MessageType::Useful,
        MessageType::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Comment => "comment",
            MessageType::Like => "like",
            MessageType::Collect => "collect",
            MessageType::Useful => "useful",
            MessageType::System => "system",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MessageType::Comment => "评论与回复",
            MessageType::Like => "点赞通知",
            MessageType::Collect => "收藏通知",
            MessageType::Useful => "有用通知",
            MessageType::System => "系统消息",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// 1 = unread.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub create_time: String,
}

impl Message {
    pub fn is_unread(&self) -> bool {
        self.status == 1
    }

    pub fn status_text(&self) -> &'static str {
        if self.is_unread() {
            "未读"
        } else {
            "已读"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummaryItem {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unread_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_summary: Vec<MessageSummaryItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub current: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solved_flag: Option<i32>,
}

impl QuestionFilter {
    /// Drops blank keywords so they are never sent.
    pub fn normalized(mut self) -> Self {
        self.keyword = self
            .keyword
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPageQuery {
    pub current: u64,
    pub size: u64,
    #[serde(flatten)]
    pub filter: QuestionFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentPageQuery {
    pub current: u64,
    pub size: u64,
    /// Question id.
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePageQuery {
    pub current: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: MessageType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishQuestionPayload {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    /// Comma-joined uploaded keys.
    pub images: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionPayload {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishCommentPayload {
    pub question_id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_comment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCommentPayload {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<String>,
}

/// Target of a like/collect toggle; `entity_user_id` is the content owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdPayload {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
    /// Captcha text.
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResult {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
    pub image_data_url: String,
    pub cookie: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterPayload {
    pub username: String,
    pub mail: String,
    pub code: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    pub old_username: String,
    pub new_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordPayload {
    pub username: String,
    pub code: String,
    pub new_password: String,
}
