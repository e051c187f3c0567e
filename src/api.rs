//! One typed function per endpoint in [`crate::routes`].

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use crate::client::{ApiClient, ApiRequest};
use crate::errors::RequestError;
use crate::models::{
    Captcha, Category, Comment, CommentPageQuery, IdPayload, LoginPayload, LoginResult, Message,
    MessagePageQuery, MessageSummary, MessageType, Page, PageQuery, PublishCommentPayload,
    PublishQuestionPayload, Question, QuestionDetail, QuestionFilter, QuestionPageQuery,
    ReactionPayload, RegisterPayload, ResetPasswordPayload, UpdateCommentPayload,
    UpdateQuestionPayload, UpdateUserPayload, UserProfile,
};
use crate::routes;
use crate::storage::{KeyValueStore, CAPTCHA_OWNER_KEY};

pub const CAPTCHA_FAILED_CODE: &str = "CAPTCHA_FAIL";
const CAPTCHA_FAILED_MESSAGE: &str = "验证码获取失败";
const CAPTCHA_UNREACHABLE_MESSAGE: &str = "验证码获取失败，请稍后重试";

#[derive(Debug, Clone, Serialize)]
struct MailQuery<'a> {
    mail: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct KeywordQuery<'a> {
    keyword: &'a str,
}

pub type ApiResult<T> = Result<T, RequestError>;

pub struct Api {
    client: Arc<ApiClient>,
    storage: Arc<dyn KeyValueStore>,
}

impl Api {
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self { client, storage }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn categories(&self) -> ApiResult<Vec<Category>> {
        self.client.call(ApiRequest::route(&routes::CATEGORIES))
    }

    pub fn question_page(
        &self,
        page: PageQuery,
        filter: QuestionFilter,
    ) -> ApiResult<Page<Question>> {
        let query = QuestionPageQuery {
            current: page.current,
            size: page.size,
            filter: filter.normalized(),
        };
        self.client
            .call(ApiRequest::route(&routes::QUESTION_PAGE).body(query))
    }

    pub fn question_suggest(&self, keyword: &str) -> ApiResult<Vec<String>> {
        self.client.call(
            ApiRequest::route(&routes::QUESTION_SUGGEST).body(KeywordQuery {
                keyword: keyword.trim(),
            }),
        )
    }

    pub fn question_detail(&self, id: i64) -> ApiResult<QuestionDetail> {
        let id = id.to_string();
        self.client
            .call(ApiRequest::route_with(&routes::QUESTION_DETAIL, &[("id", &id)]))
    }

    pub fn publish_question(&self, payload: &PublishQuestionPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::PUBLISH_QUESTION).body(payload))
    }

    pub fn update_question(&self, payload: &UpdateQuestionPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::UPDATE_QUESTION).body(payload))
    }

    pub fn delete_question(&self, id: i64) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::DELETE_QUESTION).body(IdPayload { id }))
    }

    /// Toggles the solved flag on the server.
    pub fn resolve_question(&self, id: i64) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::RESOLVE_QUESTION).body(IdPayload { id }))
    }

    pub fn toggle_question_collect(&self, payload: ReactionPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::TOGGLE_QUESTION_COLLECT).body(payload))
    }

    pub fn toggle_question_like(&self, payload: ReactionPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::TOGGLE_QUESTION_LIKE).body(payload))
    }

    pub fn my_collect_page(&self, page: PageQuery) -> ApiResult<Page<Question>> {
        self.client
            .call(ApiRequest::route(&routes::MY_COLLECT_PAGE).body(page))
    }

    pub fn my_recent_page(&self, page: PageQuery) -> ApiResult<Page<Question>> {
        self.client
            .call(ApiRequest::route(&routes::MY_RECENT_PAGE).body(page))
    }

    pub fn my_question_page(&self, page: PageQuery) -> ApiResult<Page<Question>> {
        self.client
            .call(ApiRequest::route(&routes::MY_QUESTION_PAGE).body(page))
    }

    pub fn comment_page(&self, question_id: i64, page: PageQuery) -> ApiResult<Page<Comment>> {
        let query = CommentPageQuery {
            current: page.current,
            size: page.size,
            id: question_id,
        };
        self.client
            .call(ApiRequest::route(&routes::COMMENT_PAGE).body(query))
    }

    pub fn my_comment_page(&self, page: PageQuery) -> ApiResult<Page<Comment>> {
        self.client
            .call(ApiRequest::route(&routes::MY_COMMENT_PAGE).body(page))
    }

    pub fn publish_comment(&self, payload: &PublishCommentPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::PUBLISH_COMMENT).body(payload))
    }

    pub fn update_comment(&self, payload: &UpdateCommentPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::UPDATE_COMMENT).body(payload))
    }

    pub fn delete_comment(&self, id: i64) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::DELETE_COMMENT).body(IdPayload { id }))
    }

    pub fn like_comment(&self, payload: ReactionPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::LIKE_COMMENT).body(payload))
    }

    pub fn toggle_comment_useful(&self, id: i64) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::TOGGLE_COMMENT_USEFUL).body(IdPayload { id }))
    }

    pub fn message_summary(&self) -> ApiResult<MessageSummary> {
        self.client.call(ApiRequest::route(&routes::MESSAGE_SUMMARY))
    }

    pub fn message_page(&self, page: PageQuery, kind: MessageType) -> ApiResult<Page<Message>> {
        let query = MessagePageQuery {
            current: page.current,
            size: page.size,
            kind,
        };
        self.client
            .call(ApiRequest::route(&routes::MESSAGE_PAGE).body(query))
    }

    /// Fetches the captcha image and remembers the cookie that ties it to this client.
    pub fn captcha(&self) -> ApiResult<Captcha> {
        let response = self
            .client
            .fetch_raw(ApiRequest::route(&routes::CAPTCHA))
            .map_err(|err| {
                tracing::warn!(error = %err, "api: captcha unreachable");
                captcha_error(CAPTCHA_UNREACHABLE_MESSAGE)
            })?;

        let cookie = response
            .header_values("set-cookie")
            .next()
            .and_then(|raw| raw.split(';').next())
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if cookie.is_empty() || response.body.is_empty() {
            tracing::warn!(status = response.status, "api: captcha response missing cookie or image");
            return Err(captcha_error(CAPTCHA_FAILED_MESSAGE));
        }
        if let Err(err) = self.storage.set_string(CAPTCHA_OWNER_KEY, &cookie) {
            tracing::warn!(error = %err, "api: failed to persist captcha owner");
        }

        Ok(Captcha {
            image_data_url: format!("data:image/png;base64,{}", STANDARD.encode(&response.body)),
            cookie,
        })
    }

    /// Cookie from the most recent captcha fetch, if any survived.
    pub fn stored_captcha_cookie(&self) -> Option<String> {
        match self.storage.get_string(CAPTCHA_OWNER_KEY) {
            Ok(cookie) if !cookie.is_empty() => Some(cookie),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "api: failed to read captcha owner");
                None
            }
        }
    }

    pub fn login(&self, payload: &LoginPayload, captcha_cookie: Option<&str>) -> ApiResult<LoginResult> {
        let mut request = ApiRequest::route(&routes::LOGIN).body(payload);
        if let Some(cookie) = captcha_cookie.filter(|cookie| !cookie.is_empty()) {
            request = request.header("Cookie", cookie);
        }
        self.client.call(request)
    }

    pub fn user_profile(&self, username: &str) -> ApiResult<UserProfile> {
        self.client.call(ApiRequest::route_with(
            &routes::USER_PROFILE,
            &[("username", username)],
        ))
    }

    pub fn actual_user_profile(&self, username: &str) -> ApiResult<UserProfile> {
        self.client.call(ApiRequest::route_with(
            &routes::ACTUAL_USER_PROFILE,
            &[("username", username)],
        ))
    }

    pub fn activity_score(&self) -> ApiResult<i64> {
        self.client.call(ApiRequest::route(&routes::ACTIVITY_SCORE))
    }

    pub fn send_register_code(&self, mail: &str) -> ApiResult<bool> {
        self.client.call(
            ApiRequest::route(&routes::SEND_REGISTER_CODE).body(MailQuery { mail: mail.trim() }),
        )
    }

    pub fn register(&self, payload: &RegisterPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::REGISTER).body(payload))
    }

    pub fn update_user_profile(&self, payload: &UpdateUserPayload) -> ApiResult<()> {
        self.client
            .call(ApiRequest::route(&routes::UPDATE_USER_PROFILE).body(payload))
    }

    pub fn send_reset_password_code(&self, mail: &str) -> ApiResult<bool> {
        self.client.call(
            ApiRequest::route(&routes::SEND_RESET_PASSWORD_CODE)
                .body(MailQuery { mail: mail.trim() }),
        )
    }

    pub fn reset_password(&self, payload: &ResetPasswordPayload) -> ApiResult<bool> {
        self.client
            .call(ApiRequest::route(&routes::RESET_PASSWORD).body(payload))
    }
}

fn captcha_error(message: &str) -> RequestError {
    RequestError::Domain {
        code: CAPTCHA_FAILED_CODE.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::session;
    use crate::storage::MemoryStore;
    use crate::transport::{HttpResponse, Method, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    fn setup() -> (Arc<ScriptedTransport>, Arc<MemoryStore>, Api) {
        let transport = Arc::new(ScriptedTransport::new());
        let storage = Arc::new(MemoryStore::new());
        let session = Arc::new(session::Store::new(storage.clone()));
        let client = Arc::new(ApiClient::new(
            transport.clone(),
            session,
            ClientConfig {
                base_url: "https://api.test".into(),
                timeout: Duration::from_secs(10),
            },
        ));
        (transport, storage.clone(), Api::new(client, storage))
    }

    #[test]
    fn question_page_omits_unset_filters() {
        let (transport, _storage, api) = setup();
        transport.push_ok(json!({ "records": [], "total": 0, "size": 10, "current": 1 }));
        api.question_page(
            PageQuery { current: 1, size: 10 },
            QuestionFilter {
                category_id: Some(2),
                keyword: Some("  ".into()),
                solved_flag: None,
            },
        )
        .unwrap();

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.url, "https://api.test/api/answerly/v1/question/page");
        assert_eq!(sent.query_value("current"), Some("1"));
        assert_eq!(sent.query_value("size"), Some("10"));
        assert_eq!(sent.query_value("categoryId"), Some("2"));
        assert_eq!(sent.query_value("keyword"), None);
        assert_eq!(sent.query_value("solvedFlag"), None);
    }

    #[test]
    fn delete_sends_id_in_query() {
        let (transport, _storage, api) = setup();
        transport.push_ok(json!(null));
        api.delete_question(42).unwrap();
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.method, Method::Delete);
        assert_eq!(sent.url, "https://api.test/api/answerly/v1/question");
        assert_eq!(sent.query_value("id"), Some("42"));
    }

    #[test]
    fn login_attaches_captcha_cookie() {
        let (transport, _storage, api) = setup();
        transport.push_ok(json!({ "token": "t" }));
        let payload = LoginPayload {
            username: "alice".into(),
            password: "pw".into(),
            code: "1234".into(),
        };
        let result = api.login(&payload, Some("JSESSIONID=abc")).unwrap();
        assert_eq!(result.token, "t");
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.header("cookie"), Some("JSESSIONID=abc"));
        assert_eq!(
            sent.body,
            Some(json!({ "username": "alice", "password": "pw", "code": "1234" }))
        );
    }

    #[test]
    fn captcha_keeps_first_cookie_segment() {
        let (transport, storage, api) = setup();
        transport.push(HttpResponse {
            status: 200,
            headers: vec![(
                "Set-Cookie".into(),
                "captcha=xyz; Path=/; HttpOnly".into(),
            )],
            body: vec![1, 2, 3],
        });
        let captcha = api.captcha().unwrap();
        assert_eq!(captcha.cookie, "captcha=xyz");
        assert_eq!(captcha.image_data_url, "data:image/png;base64,AQID");
        assert_eq!(storage.get_string(CAPTCHA_OWNER_KEY).unwrap(), "captcha=xyz");
        assert_eq!(api.stored_captcha_cookie().as_deref(), Some("captcha=xyz"));
    }

    #[test]
    fn captcha_without_cookie_fails() {
        let (transport, _storage, api) = setup();
        transport.push(HttpResponse {
            status: 200,
            headers: vec![],
            body: vec![1],
        });
        let err = api.captcha().unwrap_err();
        assert_eq!(err.message(), "验证码获取失败");
        assert_eq!(api.stored_captcha_cookie(), None);
    }

    #[test]
    fn profile_path_is_encoded() {
        let (transport, _storage, api) = setup();
        transport.push_ok(json!({ "id": 1, "username": "a b" }));
        let profile = api.user_profile("a b").unwrap();
        assert_eq!(profile.username, "a b");
        assert_eq!(
            transport.last_request().unwrap().url,
            "https://api.test/api/answerly/v1/user/a%20b"
        );
    }
}
