use std::sync::Arc;
use std::time::Duration;

use answerly::api::Api;
use answerly::client::{ApiClient, ClientConfig};
use answerly::comments::{build_tree, Viewer};
use answerly::data::{self, CommentService, QuestionService};
use answerly::errors::RequestError;
use answerly::images::parse_image_list;
use answerly::models::{LoginPayload, Question, QuestionFilter};
use answerly::notify::RecordingNotifier;
use answerly::pagination::{Completion, Pager};
use answerly::session::{self, AuthPayload};
use answerly::storage::MemoryStore;
use answerly::transport::ScriptedTransport;
use serde_json::json;

struct Harness {
    transport: Arc<ScriptedTransport>,
    session: Arc<session::Store>,
    api: Arc<Api>,
}

fn harness() -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let storage = Arc::new(MemoryStore::new());
    let session = Arc::new(session::Store::new(storage.clone()));
    session.hydrate().unwrap();
    let client = ApiClient::new(
        transport.clone(),
        session.clone(),
        ClientConfig {
            base_url: "https://api.test/".into(),
            timeout: Duration::from_secs(5),
        },
    );
    let api = Arc::new(Api::new(Arc::new(client), storage));
    Harness {
        transport,
        session,
        api,
    }
}

fn question_page(current: u64, count: u64) -> serde_json::Value {
    let records: Vec<_> = (0..count)
        .map(|n| json!({ "id": (current - 1) * 10 + n + 1, "title": format!("q{n}") }))
        .collect();
    json!({ "records": records, "total": 25, "size": 10, "current": current })
}

#[test]
fn login_stores_session_and_role() {
    let h = harness();
    h.transport
        .push_ok(json!({ "token": "t-1" }))
        .push_ok(json!({ "id": 4, "username": "alice", "userType": "admin" }));

    let payload = LoginPayload {
        username: "alice".into(),
        password: "pw".into(),
        code: "1234".into(),
    };
    data::login_by_password(&h.api, &h.session, &payload, Some("JSESSIONID=abc")).unwrap();

    let current = h.session.current();
    assert_eq!(current.username, "alice");
    assert!(current.is_logged_in);
    assert_eq!(current.user_type, "admin");

    let login = &h.transport.requests()[0];
    assert_eq!(login.header("cookie"), Some("JSESSIONID=abc"));
    assert_eq!(login.header("token"), None);
}

#[test]
fn question_pages_stop_after_the_total() {
    let h = harness();
    let notifier = Arc::new(RecordingNotifier::new());
    let service = data::ApiQuestionService::new(h.api.clone());
    let filter = QuestionFilter::default();
    let mut pager: Pager<Question> = Pager::new(notifier.clone());

    h.transport
        .push_ok(question_page(1, 10))
        .push_ok(question_page(2, 10))
        .push_ok(question_page(3, 5));

    pager.reset_with(|page| service.load_page(page, &filter), |q| q);
    assert!(pager.has_more());
    pager.load_more_with(|page| service.load_page(page, &filter), |q| q);
    assert!(pager.has_more());
    pager.load_more_with(|page| service.load_page(page, &filter), |q| q);
    assert!(!pager.has_more());
    assert_eq!(pager.items().len(), 25);

    let outcome = pager.load_more_with(|page| service.load_page(page, &filter), |q| q);
    assert_eq!(outcome, Completion::Skipped);
    assert_eq!(h.transport.request_count(), 3);
    assert_eq!(pager.items().len(), 25);
    assert_eq!(notifier.count(), 0);
}

#[test]
fn expired_session_is_cleared_by_any_call() {
    let h = harness();
    h.session
        .set_auth(AuthPayload {
            username: "alice".into(),
            token: "t-1".into(),
            user_type: None,
        })
        .unwrap();
    h.transport.push_failure("A000204", None);

    let err = h.api.activity_score().unwrap_err();
    assert!(err.is_auth_expired());
    assert_eq!(err.message(), "登录状态失效，请重新登录");
    assert!(!h.session.current().is_logged_in);
    assert_eq!(h.session.auth_headers().token, "");

    h.transport.push_transport_error("connection refused");
    assert_eq!(h.api.categories().unwrap_err(), RequestError::Network);
}

#[test]
fn comment_images_and_threads() {
    let h = harness();
    h.transport.push_ok(json!({
        "records": [
            { "id": 10, "username": "alice", "content": "top", "images": "a.jpg,https://x/y.png" },
            { "id": 11, "username": "bob", "content": "reply", "parentCommentId": 10, "topCommentId": 10 }
        ],
        "total": 2, "size": 10, "current": 1
    }));

    let service = data::ApiCommentService::new(h.api.clone());
    let mut pager = Pager::new(Arc::new(RecordingNotifier::new()));
    pager.reset_with(|page| service.load_page(10, page), |c| c);

    let viewer = Viewer::default();
    let cards = build_tree(pager.items().to_vec(), &viewer, Some("https://cdn/"));
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].image_list, ["https://cdn/a.jpg", "https://x/y.png"]);
    assert_eq!(cards[0].child_cards.len(), 1);
    assert_eq!(cards[0].child_cards[0].comment.id, 11);

    assert_eq!(
        parse_image_list(Some("a.jpg,https://x/y.png"), Some("https://cdn/")),
        vec!["https://cdn/a.jpg".to_string(), "https://x/y.png".to_string()]
    );
}
