//! Two-level comment threads.
//!
//! Cards are built from a page of comments: top comments carry their direct
//! replies and replies never carry children. Authoring keeps the same shape by
//! attaching every reply to the thread's top comment.

use std::collections::HashMap;

use crate::flags;
use crate::images::parse_image_list;
use crate::models::{Comment, PublishCommentPayload, UpdateCommentPayload};
use crate::session::Session;

/// Who is looking at the thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub username: String,
    pub is_admin: bool,
}

impl Viewer {
    pub fn new(session: &Session, is_admin: bool) -> Self {
        Self {
            username: session.username.clone(),
            is_admin,
        }
    }

    pub fn owns(&self, username: &str) -> bool {
        self.is_admin || (!self.username.is_empty() && self.username == username)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentCard {
    /// The record itself; `child_comments` is always emptied.
    pub comment: Comment,
    pub child_cards: Vec<CommentCard>,
    pub is_mine: bool,
    pub is_liked: bool,
    pub is_useful: bool,
    pub image_list: Vec<String>,
}

impl CommentCard {
    fn leaf(mut comment: Comment, viewer: &Viewer, asset_base_url: Option<&str>) -> Self {
        comment.child_comments.clear();
        Self {
            is_mine: viewer.owns(&comment.username),
            is_liked: flags::is_liked(comment.like_status.as_ref()),
            is_useful: flags::is_useful(comment.useful.as_ref()),
            image_list: parse_image_list(comment.images.as_deref(), asset_base_url),
            child_cards: Vec::new(),
            comment,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.child_cards.is_empty()
    }

    pub fn reply_target(&self) -> ReplyTarget {
        ReplyTarget::for_comment(&self.comment)
    }
}

fn thread_root(comment: &Comment) -> Option<i64> {
    comment
        .top_comment_id
        .filter(|top| *top > 0 && *top != comment.id)
}

/// Builds cards for one page of comments.
///
/// Embedded `child_comments` become the replies of their top comment. Flat
/// replies are grouped under the top comment named by `top_comment_id`; a
/// reply whose top comment is not on this page is shown as its own card.
/// Anything deeper than one reply level is dropped.
pub fn build_tree(
    records: Vec<Comment>,
    viewer: &Viewer,
    asset_base_url: Option<&str>,
) -> Vec<CommentCard> {
    let mut cards: Vec<CommentCard> = Vec::with_capacity(records.len());
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut replies: Vec<Comment> = Vec::new();

    for mut record in records {
        if thread_root(&record).is_some() {
            replies.push(record);
            continue;
        }
        let children = std::mem::take(&mut record.child_comments);
        let mut card = CommentCard::leaf(record, viewer, asset_base_url);
        card.child_cards = children
            .into_iter()
            .map(|child| CommentCard::leaf(child, viewer, asset_base_url))
            .collect();
        index.insert(card.comment.id, cards.len());
        cards.push(card);
    }

    for reply in replies {
        let slot = thread_root(&reply).and_then(|top| index.get(&top).copied());
        let card = CommentCard::leaf(reply, viewer, asset_base_url);
        match slot {
            Some(position) => {
                let parent = &mut cards[position];
                if parent
                    .child_cards
                    .iter()
                    .all(|existing| existing.comment.id != card.comment.id)
                {
                    parent.child_cards.push(card);
                }
            }
            None => {
                tracing::debug!(id = card.comment.id, "comments: reply without its top comment on page");
                cards.push(card);
            }
        }
    }
    cards
}

/// Where a new reply attaches. Both ids always name the thread's top comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub parent_comment_id: i64,
    pub top_comment_id: i64,
    pub reply_to_username: String,
}

impl ReplyTarget {
    /// Target for a reply to `comment`, whether it is a top comment or a reply.
    pub fn for_comment(comment: &Comment) -> Self {
        let top = thread_root(comment).unwrap_or(comment.id);
        Self {
            parent_comment_id: top,
            top_comment_id: top,
            reply_to_username: comment.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComposeMode {
    #[default]
    New,
    Reply(ReplyTarget),
    Edit {
        comment_id: i64,
    },
}

/// What the composer will send once images are uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Publish(PublishCommentPayload),
    Update(UpdateCommentPayload),
}

impl Submission {
    pub fn with_images(self, uploaded: &[String]) -> Self {
        let images = (!uploaded.is_empty()).then(|| uploaded.join(","));
        match self {
            Submission::Publish(mut payload) => {
                payload.images = images;
                Submission::Publish(payload)
            }
            Submission::Update(mut payload) => {
                payload.images = images;
                Submission::Update(payload)
            }
        }
    }
}

/// The comment box under a question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    pub question_id: i64,
    pub mode: ComposeMode,
    pub draft: String,
    pub local_images: Vec<String>,
}

impl Composer {
    pub fn new(question_id: i64) -> Self {
        Self {
            question_id,
            ..Self::default()
        }
    }

    pub fn reply_to(&mut self, comment: &Comment) {
        self.clear_draft();
        self.mode = ComposeMode::Reply(ReplyTarget::for_comment(comment));
    }

    pub fn edit(&mut self, comment: &Comment) {
        self.local_images.clear();
        self.draft = comment.content.clone();
        self.mode = ComposeMode::Edit {
            comment_id: comment.id,
        };
    }

    pub fn cancel(&mut self) {
        self.clear_draft();
        self.mode = ComposeMode::New;
    }

    fn clear_draft(&mut self) {
        self.draft.clear();
        self.local_images.clear();
    }

    /// Payload for the current draft, without images.
    pub fn submission(&self) -> Submission {
        let content = self.draft.trim().to_string();
        match &self.mode {
            ComposeMode::Edit { comment_id } => Submission::Update(UpdateCommentPayload {
                id: *comment_id,
                content,
                images: None,
            }),
            ComposeMode::Reply(target) => Submission::Publish(PublishCommentPayload {
                question_id: self.question_id,
                content,
                parent_comment_id: Some(target.parent_comment_id),
                top_comment_id: Some(target.top_comment_id),
                images: None,
            }),
            ComposeMode::New => Submission::Publish(PublishCommentPayload {
                question_id: self.question_id,
                content,
                parent_comment_id: None,
                top_comment_id: None,
                images: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(id: i64, top: Option<i64>, username: &str) -> Comment {
        Comment {
            id,
            question_id: 7,
            parent_comment_id: top,
            top_comment_id: top,
            content: format!("c{id}"),
            username: username.into(),
            ..Comment::default()
        }
    }

    fn viewer(username: &str, is_admin: bool) -> Viewer {
        Viewer {
            username: username.into(),
            is_admin,
        }
    }

    #[test]
    fn embedded_children_are_capped_at_one_level() {
        let mut child = comment(2, Some(1), "bob");
        child.child_comments = vec![comment(3, Some(1), "carol")];
        let mut top = comment(1, None, "alice");
        top.child_comments = vec![child];

        let cards = build_tree(vec![top], &viewer("bob", false), None);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].child_cards.len(), 1);
        let reply = &cards[0].child_cards[0];
        assert!(reply.child_cards.is_empty());
        assert!(reply.comment.child_comments.is_empty());
        assert!(reply.is_mine);
        assert!(!cards[0].is_mine);
    }

    #[test]
    fn flat_replies_group_under_their_top_comment() {
        let cards = build_tree(
            vec![
                comment(1, None, "a"),
                comment(2, Some(1), "b"),
                comment(3, None, "c"),
                comment(4, Some(1), "d"),
                comment(5, Some(99), "e"),
            ],
            &Viewer::default(),
            None,
        );
        let ids: Vec<i64> = cards.iter().map(|card| card.comment.id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
        let replies: Vec<i64> = cards[0].child_cards.iter().map(|c| c.comment.id).collect();
        assert_eq!(replies, vec![2, 4]);
    }

    #[test]
    fn cards_parse_flags_and_images() {
        let mut top = comment(1, None, "a");
        top.like_status = Some(json!("已点赞"));
        top.useful = Some(json!(1));
        top.images = Some("a.jpg,https://x/y.png".into());
        let cards = build_tree(vec![top], &viewer("z", true), Some("https://cdn/"));
        let card = &cards[0];
        assert!(card.is_liked);
        assert!(card.is_useful);
        assert!(card.is_mine, "admins own every comment");
        assert_eq!(card.image_list, vec!["https://cdn/a.jpg", "https://x/y.png"]);
    }

    #[test]
    fn logged_out_viewer_owns_nothing() {
        let cards = build_tree(vec![comment(1, None, "")], &Viewer::default(), None);
        assert!(!cards[0].is_mine);
    }

    #[test]
    fn replying_to_a_child_targets_the_top_comment() {
        let top = comment(10, None, "alice");
        let child = comment(11, Some(10), "bob");

        let target = ReplyTarget::for_comment(&child);
        assert_eq!(target.parent_comment_id, 10);
        assert_eq!(target.top_comment_id, 10);
        assert_eq!(target.reply_to_username, "bob");
        assert_eq!(ReplyTarget::for_comment(&top), ReplyTarget {
            parent_comment_id: 10,
            top_comment_id: 10,
            reply_to_username: "alice".into(),
        });

        let mut composer = Composer::new(7);
        composer.reply_to(&child);
        composer.draft = " thanks ".into();
        match composer.submission() {
            Submission::Publish(payload) => {
                assert_eq!(payload.parent_comment_id, Some(10));
                assert_eq!(payload.top_comment_id, Some(10));
                assert_eq!(payload.content, "thanks");
            }
            other => panic!("unexpected submission {other:?}"),
        }
    }

    #[test]
    fn editing_and_cancel() {
        let mut composer = Composer::new(7);
        composer.edit(&comment(5, None, "a"));
        assert_eq!(composer.draft, "c5");
        let submission = composer.submission().with_images(&["k1".into(), "k2".into()]);
        assert_eq!(
            submission,
            Submission::Update(UpdateCommentPayload {
                id: 5,
                content: "c5".into(),
                images: Some("k1,k2".into()),
            })
        );
        composer.cancel();
        assert_eq!(composer.mode, ComposeMode::New);
        assert!(composer.draft.is_empty());
    }
}
