//! Form checks run before any request is issued.

use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_TITLE_CHARS: usize = 50;
pub const MAX_QUESTION_IMAGES: usize = 3;
pub const MAX_COMMENT_IMAGES: usize = 9;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static CAMPUS_MAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8}@buaa\.edu\.cn$").expect("valid campus mail regex"));

/// A rejected form. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("请完整填写登录信息")]
    IncompleteLogin,
    #[error("请完整填写注册信息")]
    IncompleteRegistration,
    #[error("请输入有效邮箱")]
    InvalidEmail,
    #[error("邮箱格式需为8位数字@buaa.edu.cn")]
    InvalidResetMail,
    #[error("请输入用户名")]
    MissingUsername,
    #[error("请填写验证码和新密码")]
    IncompleteReset,
    #[error("密码至少 6 位")]
    PasswordTooShort,
    #[error("两次密码不一致")]
    PasswordMismatch,
    #[error("请填写标题和内容")]
    IncompleteQuestion,
    #[error("标题最多 50 字")]
    TitleTooLong,
    #[error("请选择主题")]
    MissingCategory,
    #[error("请输入评论内容或添加图片")]
    EmptyComment,
    #[error("最多上传 {0} 张")]
    TooManyImages(usize),
}

pub fn is_non_empty(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn is_valid_page_param(value: i64) -> bool {
    value > 0
}

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

pub fn is_campus_mail(value: &str) -> bool {
    CAMPUS_MAIL.is_match(value)
}

pub fn login(username: &str, password: &str, code: &str) -> Result<(), ValidationError> {
    if !is_non_empty(username) || !is_non_empty(password) || !is_non_empty(code) {
        return Err(ValidationError::IncompleteLogin);
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub mail: String,
    pub code: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn register(form: &RegisterForm) -> Result<(), ValidationError> {
    if [&form.username, &form.mail, &form.code, &form.password]
        .iter()
        .any(|field| !is_non_empty(field))
    {
        return Err(ValidationError::IncompleteRegistration);
    }
    if !is_email(form.mail.trim()) {
        return Err(ValidationError::InvalidEmail);
    }
    check_new_password(&form.password, &form.confirm_password)
}

pub fn reset_mail(mail: &str) -> Result<(), ValidationError> {
    if !is_campus_mail(mail.trim()) {
        return Err(ValidationError::InvalidResetMail);
    }
    Ok(())
}

pub fn reset_password(
    username: &str,
    code: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    if !is_non_empty(username) {
        return Err(ValidationError::MissingUsername);
    }
    if !is_non_empty(code) || !is_non_empty(new_password) {
        return Err(ValidationError::IncompleteReset);
    }
    check_new_password(new_password, confirm_password)
}

fn check_new_password(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

pub fn question(
    title: &str,
    content: &str,
    category_id: i64,
    image_count: usize,
) -> Result<(), ValidationError> {
    if !is_non_empty(title) || !is_non_empty(content) {
        return Err(ValidationError::IncompleteQuestion);
    }
    if title.trim().chars().count() > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong);
    }
    if !is_valid_page_param(category_id) {
        return Err(ValidationError::MissingCategory);
    }
    if image_count > MAX_QUESTION_IMAGES {
        return Err(ValidationError::TooManyImages(MAX_QUESTION_IMAGES));
    }
    Ok(())
}

pub fn comment(content: &str, image_count: usize) -> Result<(), ValidationError> {
    if !is_non_empty(content) && image_count == 0 {
        return Err(ValidationError::EmptyComment);
    }
    if image_count > MAX_COMMENT_IMAGES {
        return Err(ValidationError::TooManyImages(MAX_COMMENT_IMAGES));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_needs_every_field() {
        assert_eq!(login("alice", " ", "1234"), Err(ValidationError::IncompleteLogin));
        assert!(login("alice", "pw", "1234").is_ok());
    }

    #[test]
    fn register_checks_in_order() {
        let mut form = RegisterForm {
            username: "bob".into(),
            mail: "not-mail".into(),
            code: "9".into(),
            password: "12345".into(),
            confirm_password: "12345".into(),
        };
        assert_eq!(register(&form), Err(ValidationError::InvalidEmail));
        form.mail = "bob@example.com".into();
        assert_eq!(register(&form), Err(ValidationError::PasswordTooShort));
        form.password = "123456".into();
        assert_eq!(register(&form), Err(ValidationError::PasswordMismatch));
        form.confirm_password = "123456".into();
        assert!(register(&form).is_ok());
    }

    #[test]
    fn reset_mail_is_campus_only() {
        assert!(reset_mail("12345678@buaa.edu.cn").is_ok());
        assert_eq!(
            reset_mail("bob@example.com"),
            Err(ValidationError::InvalidResetMail)
        );
    }

    #[test]
    fn question_title_counts_characters() {
        let title: String = "问".repeat(50);
        assert!(question(&title, "body", 1, 0).is_ok());
        let long = "问".repeat(51);
        assert_eq!(question(&long, "body", 1, 0), Err(ValidationError::TitleTooLong));
        assert_eq!(question("t", "body", 0, 0), Err(ValidationError::MissingCategory));
        assert_eq!(
            question("t", "body", 1, 4).unwrap_err().to_string(),
            "最多上传 3 张"
        );
    }

    #[test]
    fn comment_accepts_images_without_text() {
        assert!(comment("", 1).is_ok());
        assert_eq!(comment("  ", 0), Err(ValidationError::EmptyComment));
        assert_eq!(comment("hi", 10), Err(ValidationError::TooManyImages(9)));
    }

    #[test]
    fn page_params_are_positive() {
        assert!(is_valid_page_param(1));
        assert!(!is_valid_page_param(0));
        assert!(!is_valid_page_param(-3));
    }
}
