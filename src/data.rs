use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::Api;
use crate::images::join_image_keys;
use crate::models::{
    Comment, LoginPayload, Message, MessageSummary, MessageSummaryItem, MessageType, Page,
    PageQuery, PublishCommentPayload, PublishQuestionPayload, Question, QuestionDetail,
    QuestionFilter, UserProfile,
};
use crate::session::{self, AuthPayload};
use crate::state::AppState;

/// Turns a local file into a remote object key.
pub trait Uploader: Send + Sync {
    fn upload(&self, local: &Path) -> Result<String>;
}

pub trait QuestionService: Send + Sync {
    fn load_page(&self, page: PageQuery, filter: &QuestionFilter) -> Result<Page<Question>>;
    fn load_detail(&self, id: i64) -> Result<QuestionDetail>;
}

pub trait CommentService: Send + Sync {
    fn load_page(&self, question_id: i64, page: PageQuery) -> Result<Page<Comment>>;
}

pub trait MessageService: Send + Sync {
    fn load_summary(&self) -> Result<MessageSummary>;
    fn load_page(&self, page: PageQuery, kind: MessageType) -> Result<Page<Message>>;
}

pub struct ApiQuestionService {
    api: Arc<Api>,
}

impl ApiQuestionService {
    pub fn new(api: Arc<Api>) -> Self {
        Self { api }
    }
}

impl QuestionService for ApiQuestionService {
    fn load_page(&self, page: PageQuery, filter: &QuestionFilter) -> Result<Page<Question>> {
        self.api
            .question_page(page, filter.clone())
            .context("fetch question page")
    }

    fn load_detail(&self, id: i64) -> Result<QuestionDetail> {
        self.api
            .question_detail(id)
            .with_context(|| format!("fetch question {id}"))
    }
}

pub struct ApiCommentService {
    api: Arc<Api>,
}

impl ApiCommentService {
    pub fn new(api: Arc<Api>) -> Self {
        Self { api }
    }
}

impl CommentService for ApiCommentService {
    fn load_page(&self, question_id: i64, page: PageQuery) -> Result<Page<Comment>> {
        self.api
            .comment_page(question_id, page)
            .with_context(|| format!("fetch comments for question {question_id}"))
    }
}

pub struct ApiMessageService {
    api: Arc<Api>,
}

impl ApiMessageService {
    pub fn new(api: Arc<Api>) -> Self {
        Self { api }
    }
}

impl MessageService for ApiMessageService {
    fn load_summary(&self) -> Result<MessageSummary> {
        self.api.message_summary().context("fetch message summary")
    }

    fn load_page(&self, page: PageQuery, kind: MessageType) -> Result<Page<Message>> {
        self.api
            .message_page(page, kind)
            .with_context(|| format!("fetch {} messages", kind.as_str()))
    }
}

/// Uses the file name as the key; for offline runs and tests.
pub struct StaticUploader {
    prefix: String,
}

impl StaticUploader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Uploader for StaticUploader {
    fn upload(&self, local: &Path) -> Result<String> {
        let name = local
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .with_context(|| format!("upload: no file name in {}", local.display()))?;
        Ok(format!("{}{}", self.prefix, name))
    }
}

pub struct MockQuestionService {
    total: u64,
}

impl Default for MockQuestionService {
    fn default() -> Self {
        Self { total: 25 }
    }
}

impl QuestionService for MockQuestionService {
    fn load_page(&self, page: PageQuery, filter: &QuestionFilter) -> Result<Page<Question>> {
        let keyword = filter.keyword.clone().unwrap_or_default();
        Ok(mock_page(page, self.total, |n| Question {
            id: n as i64,
            title: if keyword.is_empty() {
                format!("Sample question {n}")
            } else {
                format!("Sample question {n} about {keyword}")
            },
            content: "Placeholder body used while the API is unavailable.".into(),
            category_id: filter.category_id.unwrap_or(1),
            username: "demo".into(),
            solved_flag: (n % 3 == 0) as i32,
            comment_count: (n % 4) as i64,
            ..Question::default()
        }))
    }

    fn load_detail(&self, id: i64) -> Result<QuestionDetail> {
        Ok(QuestionDetail {
            question: Question {
                id,
                title: format!("Sample question {id}"),
                content: "Placeholder body used while the API is unavailable.".into(),
                username: "demo".into(),
                ..Question::default()
            },
            ..QuestionDetail::default()
        })
    }
}

#[derive(Default)]
pub struct MockCommentService;

impl CommentService for MockCommentService {
    fn load_page(&self, question_id: i64, page: PageQuery) -> Result<Page<Comment>> {
        Ok(mock_page(page, 3, |n| {
            let id = question_id * 100 + n as i64;
            Comment {
                id,
                question_id,
                content: format!("Sample comment {n}"),
                username: "demo".into(),
                child_comments: vec![Comment {
                    id: id * 10,
                    question_id,
                    parent_comment_id: Some(id),
                    top_comment_id: Some(id),
                    content: "Sample reply".into(),
                    username: "guest".into(),
                    ..Comment::default()
                }],
                ..Comment::default()
            }
        }))
    }
}

#[derive(Default)]
pub struct MockMessageService;

impl MessageService for MockMessageService {
    fn load_summary(&self) -> Result<MessageSummary> {
        Ok(MessageSummary {
            message_summary: MessageType::ALL
                .iter()
                .map(|kind| MessageSummaryItem {
                    kind: *kind,
                    total_count: 2,
                    unread_count: u64::from(*kind == MessageType::Like),
                })
                .collect(),
        })
    }

    fn load_page(&self, page: PageQuery, kind: MessageType) -> Result<Page<Message>> {
        Ok(mock_page(page, 2, |n| Message {
            id: n as i64,
            content: format!("{} #{n}", kind.label()),
            kind,
            status: i32::from(n == 1 && kind == MessageType::Like),
            create_time: String::new(),
        }))
    }
}

fn mock_page<T>(page: PageQuery, total: u64, make: impl FnMut(u64) -> T) -> Page<T> {
    let size = page.size.max(1);
    let start = page.current.saturating_sub(1).saturating_mul(size);
    let end = start.saturating_add(size).min(total);
    Page {
        records: (start + 1..=end).map(make).collect(),
        total,
        size,
        current: page.current,
        pages: Some(total.div_ceil(size)),
    }
}

/// Logs in, stores the credentials, then resolves the role from the profile.
///
/// Without an explicit cookie the one saved by the last captcha fetch is sent.
pub fn login_by_password(
    api: &Api,
    session: &session::Store,
    payload: &LoginPayload,
    captcha_cookie: Option<&str>,
) -> Result<UserProfile> {
    let stored = match captcha_cookie {
        Some(_) => None,
        None => api.stored_captcha_cookie(),
    };
    let cookie = captcha_cookie.or(stored.as_deref());
    let result = api.login(payload, cookie).context("login")?;
    session.set_auth(AuthPayload {
        username: payload.username.clone(),
        token: result.token,
        user_type: None,
    })?;

    let profile = api
        .user_profile(&payload.username)
        .context("fetch profile after login")?;
    if let Some(user_type) = profile.user_type.as_deref().filter(|kind| !kind.is_empty()) {
        session.set_user_type(Some(user_type))?;
    }
    Ok(profile)
}

pub fn logout(session: &session::Store, state: &AppState) -> Result<()> {
    session.clear_auth().context("logout")?;
    state.reset();
    Ok(())
}

fn upload_all(uploader: &dyn Uploader, local_images: &[PathBuf]) -> Result<Vec<String>> {
    local_images
        .iter()
        .map(|path| {
            uploader
                .upload(path)
                .with_context(|| format!("upload {}", path.display()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub title: String,
    pub content: String,
    pub category_id: i64,
}

/// Uploads every local image, then publishes with the collected keys.
pub fn publish_question_with_images(
    api: &Api,
    uploader: &dyn Uploader,
    draft: QuestionDraft,
    local_images: &[PathBuf],
) -> Result<()> {
    let keys = upload_all(uploader, local_images)?;
    let payload = PublishQuestionPayload {
        title: draft.title.trim().to_string(),
        content: draft.content.trim().to_string(),
        category_id: draft.category_id,
        images: join_image_keys(&keys),
    };
    api.publish_question(&payload).context("publish question")?;
    Ok(())
}

/// Same as [`publish_question_with_images`] for comments; no images leaves the field unset.
pub fn publish_comment_with_images(
    api: &Api,
    uploader: &dyn Uploader,
    mut payload: PublishCommentPayload,
    local_images: &[PathBuf],
) -> Result<()> {
    let keys = upload_all(uploader, local_images)?;
    payload.images = (!keys.is_empty()).then(|| join_image_keys(&keys));
    api.publish_comment(&payload).context("publish comment")?;
    Ok(())
}

/// Refreshes the unread badge from the message summary and returns the new count.
pub fn sync_unread_count(messages: &dyn MessageService, state: &AppState) -> Result<u64> {
    let summary = messages.load_summary()?;
    let unread: u64 = summary
        .message_summary
        .iter()
        .map(|item| item.unread_count)
        .sum();
    state.set_unread_message_count(i64::try_from(unread).unwrap_or(i64::MAX));
    Ok(state.unread_message_count())
}
