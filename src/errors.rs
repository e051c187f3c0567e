use std::collections::HashMap;

use once_cell::sync::Lazy;

pub const SUCCESS_CODE: &str = "0";
pub const SESSION_EXPIRED_CODE: &str = "A000204";

pub const NETWORK_FAIL_CODE: &str = "NETWORK_FAIL";
pub const EMPTY_RESPONSE_CODE: &str = "NETWORK_EMPTY_RESPONSE";
pub const INVALID_RESPONSE_CODE: &str = "INVALID_RESPONSE";

pub const GENERIC_FAILURE_MESSAGE: &str = "请求失败，请稍后重试";
const NETWORK_FAIL_MESSAGE: &str = "网络异常，请稍后重试";
const EMPTY_RESPONSE_MESSAGE: &str = "服务端返回为空";
const INVALID_RESPONSE_MESSAGE: &str = "响应格式错误";

static ERROR_MESSAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("A000204", "登录状态失效，请重新登录"),
        ("A000205", "验证码错误，请重试"),
        ("A000201", "用户名不存在"),
        ("A000202", "密码错误"),
        ("A000104", "验证码错误"),
        ("A000101", "用户名已存在"),
        ("A00105", "邮箱已被注册"),
        ("A000302", "用户信息更新失败"),
        ("C000101", "问题不存在"),
        ("C000102", "操作权限不足"),
        ("C000103", "评论不存在"),
        ("C000104", "评论操作权限不足"),
        ("C000105", "主题操作权限不足"),
        ("B000101", "邮件发送失败"),
        ("B000102", "图片上传失败"),
        ("B000103", "系统繁忙，请稍后重试"),
        ("B000001", "系统执行出错"),
    ])
});

/// Maps a server error code to display text. Always returns a non-empty string.
pub fn resolve(code: &str, fallback: Option<&str>) -> String {
    if let Some(message) = ERROR_MESSAGES.get(code) {
        return (*message).to_string();
    }
    match fallback.map(str::trim) {
        Some(fallback) if !fallback.is_empty() => fallback.to_string(),
        _ => GENERIC_FAILURE_MESSAGE.to_string(),
    }
}

/// Failure of one API call, already translated for display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{}", NETWORK_FAIL_MESSAGE)]
    Network,
    #[error("{message}")]
    MalformedResponse { code: String, message: String },
    #[error("{message}")]
    Domain { code: String, message: String },
    #[error("{message}")]
    AuthExpired { code: String, message: String },
}

impl RequestError {
    pub fn empty_response() -> Self {
        RequestError::MalformedResponse {
            code: EMPTY_RESPONSE_CODE.to_string(),
            message: EMPTY_RESPONSE_MESSAGE.to_string(),
        }
    }

    pub fn invalid_response() -> Self {
        RequestError::MalformedResponse {
            code: INVALID_RESPONSE_CODE.to_string(),
            message: INVALID_RESPONSE_MESSAGE.to_string(),
        }
    }

    /// Builds the error for a well-formed failure envelope.
    pub fn from_envelope(code: &str, server_message: Option<&str>) -> Self {
        let message = resolve(code, server_message);
        if code == SESSION_EXPIRED_CODE {
            RequestError::AuthExpired {
                code: code.to_string(),
                message,
            }
        } else {
            RequestError::Domain {
                code: code.to_string(),
                message,
            }
        }
    }

    pub fn code(&self) -> &str {
        match self {
            RequestError::Network => NETWORK_FAIL_CODE,
            RequestError::MalformedResponse { code, .. }
            | RequestError::Domain { code, .. }
            | RequestError::AuthExpired { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RequestError::Network => NETWORK_FAIL_MESSAGE,
            RequestError::MalformedResponse { message, .. }
            | RequestError::Domain { message, .. }
            | RequestError::AuthExpired { message, .. } => message,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, RequestError::AuthExpired { .. })
    }
}

/// Finds a displayable message anywhere in an error chain.
pub fn pick_error_message(err: &anyhow::Error, fallback: &str) -> String {
    for cause in err.chain() {
        if let Some(request) = cause.downcast_ref::<RequestError>() {
            return request.message().to_string();
        }
        if let Some(validation) = cause.downcast_ref::<crate::validate::ValidationError>() {
            return validation.to_string();
        }
        if let Some(denied) = cause.downcast_ref::<crate::detail::ActionDenied>() {
            return denied.to_string();
        }
    }
    fallback.to_string()
}
