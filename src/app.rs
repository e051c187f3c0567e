use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};

use crate::api::Api;
use crate::client::{ApiClient, ClientConfig, SessionExpired};
use crate::comments::{build_tree, CommentCard, Viewer};
use crate::config::{self, Config, EnvProfile};
use crate::data::{
    self, ApiCommentService, ApiMessageService, ApiQuestionService, CommentService,
    MessageService, QuestionService,
};
use crate::images::parse_image_list;
use crate::models::{Comment, QuestionFilter};
use crate::notify::{LogNotifier, Notifier};
use crate::pagination::{Completion, Pager};
use crate::session;
use crate::state::AppState;
use crate::storage::{self, KeyValueStore};
use crate::transport::{ReqwestConfig, ReqwestTransport, Transport};

/// Everything a frontend needs, wired from one [`Config`].
pub struct App {
    pub config: Config,
    pub profile: EnvProfile,
    pub session: Arc<session::Store>,
    pub api: Arc<Api>,
    pub questions: Arc<dyn QuestionService>,
    pub comments: Arc<dyn CommentService>,
    pub messages: Arc<dyn MessageService>,
    pub state: Arc<AppState>,
    pub notifier: Arc<dyn Notifier>,
    expired: Receiver<SessionExpired>,
}

impl App {
    /// Opens the on-disk store and a real HTTP transport.
    pub fn open(config: Config) -> Result<Self> {
        let store = storage::SqliteStore::open(storage::Options {
            path: config.storage.path.clone(),
        })
        .context("open storage")?;
        let transport = ReqwestTransport::new(ReqwestConfig {
            user_agent: config.user_agent(),
            http_client: None,
        })
        .context("build http client")?;
        Self::with_parts(config, Arc::new(store), Arc::new(transport), Arc::new(LogNotifier))
    }

    pub fn with_parts(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let profile = config.profile();
        let session = Arc::new(session::Store::new(storage.clone()));
        session.hydrate().context("load session")?;

        let (expired_tx, expired) = unbounded();
        let client = ApiClient::new(transport, session.clone(), ClientConfig::from(&profile))
            .with_expiry_observer(Arc::new(expired_tx));
        let api = Arc::new(Api::new(Arc::new(client), storage));
        tracing::debug!(env = ?profile.env, base_url = %profile.base_url, "app: wired");

        Ok(Self {
            questions: Arc::new(ApiQuestionService::new(api.clone())),
            comments: Arc::new(ApiCommentService::new(api.clone())),
            messages: Arc::new(ApiMessageService::new(api.clone())),
            config,
            profile,
            session,
            api,
            state: Arc::new(AppState::new()),
            notifier,
            expired,
        })
    }

    /// Re-reads the persisted session and describes who is looking.
    pub fn viewer(&self) -> Result<Viewer> {
        let current = self.session.hydrate()?;
        Ok(Viewer::new(&current, self.session.is_admin()))
    }

    /// True when a request found the session expired since the last call.
    pub fn take_session_expired(&self) -> bool {
        let mut expired = false;
        while self.expired.try_recv().is_ok() {
            expired = true;
        }
        expired
    }

    fn asset_base_url(&self) -> Option<&str> {
        self.profile.asset_base_url.as_deref()
    }
}

/// The failure already reached the [`Notifier`]; callers should not print it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation failed")]
pub struct AlreadyNotified;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Logout,
    Questions { keyword: Option<String> },
    Comments { question_id: i64 },
}

pub fn run(command: Command) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let app = App::open(cfg)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&app, &command, &mut out)
}

pub fn execute(app: &App, command: &Command, out: &mut dyn Write) -> Result<()> {
    let result = match command {
        Command::Status => show_status(app, out),
        Command::Logout => {
            data::logout(&app.session, &app.state)?;
            writeln!(out, "已退出登录")?;
            Ok(())
        }
        Command::Questions { keyword } => list_questions(app, keyword.as_deref(), out),
        Command::Comments { question_id } => list_comments(app, *question_id, out),
    };
    if app.take_session_expired() {
        writeln!(out, "登录状态已失效，已清除本地凭据")?;
    }
    result
}

fn show_status(app: &App, out: &mut dyn Write) -> Result<()> {
    let current = app.session.hydrate()?;
    writeln!(out, "environment: {:?}", app.profile.env)?;
    writeln!(out, "api: {}", app.profile.base_url)?;
    if current.is_logged_in {
        let role = if app.session.is_admin() { "admin" } else { "user" };
        writeln!(out, "user: {} ({role})", current.username)?;
    } else {
        writeln!(out, "user: 未登录")?;
    }
    Ok(())
}

fn list_questions(app: &App, keyword: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let filter = QuestionFilter {
        keyword: keyword.map(str::to_string),
        ..QuestionFilter::default()
    }
    .normalized();
    let mut pager = Pager::new(app.notifier.clone()).failure_message("问题加载失败");
    let questions = app.questions.clone();
    let outcome = pager.reset_with(|page| questions.load_page(page, &filter), |q| q);
    if let Completion::Failed { .. } = outcome {
        return Err(AlreadyNotified.into());
    }

    for question in pager.items() {
        let solved = if question.is_solved() { " [已解决]" } else { "" };
        writeln!(
            out,
            "#{:<6} {}{}  ({} 评论, {} 赞)",
            question.id, question.title, solved, question.comment_count, question.like_count
        )?;
    }
    if pager.items().is_empty() {
        writeln!(out, "暂无问题")?;
    } else if pager.has_more() {
        writeln!(out, "...")?;
    }
    Ok(())
}

fn list_comments(app: &App, question_id: i64, out: &mut dyn Write) -> Result<()> {
    if question_id <= 0 {
        bail!("参数错误");
    }
    let viewer = app.viewer()?;
    let detail = app
        .questions
        .load_detail(question_id)
        .with_context(|| format!("题目加载失败: {question_id}"))?;
    writeln!(out, "{}", detail.question.title)?;
    for url in parse_image_list(detail.images.as_deref(), app.asset_base_url()) {
        writeln!(out, "  [图片] {url}")?;
    }

    let mut pager: Pager<Comment> = Pager::new(app.notifier.clone()).failure_message("评论加载失败");
    let comments = app.comments.clone();
    let outcome = pager.reset_with(|page| comments.load_page(question_id, page), |c| c);
    if let Completion::Failed { .. } = outcome {
        return Err(AlreadyNotified.into());
    }

    let cards = build_tree(pager.items().to_vec(), &viewer, app.asset_base_url());
    write_cards(out, &cards)?;
    if pager.has_more() {
        writeln!(out, "...")?;
    }
    Ok(())
}

fn write_cards(out: &mut dyn Write, cards: &[CommentCard]) -> Result<()> {
    if cards.is_empty() {
        writeln!(out, "暂无评论")?;
    }
    for card in cards {
        write_card(out, card, 0)?;
        for child in &card.child_cards {
            write_card(out, child, 1)?;
        }
    }
    Ok(())
}

fn write_card(out: &mut dyn Write, card: &CommentCard, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    let mut marks = Vec::new();
    if card.is_mine {
        marks.push("我的");
    }
    if card.is_liked {
        marks.push("已赞");
    }
    if card.is_useful {
        marks.push("有用");
    }
    let marks = if marks.is_empty() {
        String::new()
    } else {
        format!(" [{}]", marks.join(","))
    };
    writeln!(
        out,
        "{indent}{}: {}{marks}",
        card.comment.username, card.comment.content
    )?;
    for url in &card.image_list {
        writeln!(out, "{indent}  [图片] {url}")?;
    }
    Ok(())
}
