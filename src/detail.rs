//! Rules for the question detail and message center screens: who may do what,
//! and the local bookkeeping applied after a reaction succeeds.

use crate::comments::{CommentCard, Viewer};
use crate::flags::{self, COLLECTED_MARKER, LIKED_MARKER, NOT_COLLECTED_MARKER, NOT_LIKED_MARKER};
use crate::models::{MessageSummaryItem, MessageType, QuestionDetail, ReactionPayload};

/// An action the viewer may not take. `Display` is the text shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActionDenied {
    #[error("仅题主可标记已解决")]
    ResolveNotOwner,
    #[error("已有评论，不能编辑问题")]
    EditNotAllowed,
    #[error("已有评论，不能删除问题")]
    DeleteHasComments,
    #[error("仅题主可标记有用")]
    UsefulNotOwner,
    #[error("不能点赞自己的评论")]
    LikeOwnComment,
    #[error("只能编辑自己的评论")]
    EditOthersComment,
    #[error("只能删除自己的评论")]
    DeleteOthersComment,
    #[error("该评论有回复，暂不支持删除")]
    DeleteCommentWithReplies,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    pub can_resolve: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl Permissions {
    pub fn for_question(detail: &QuestionDetail, viewer: &Viewer) -> Self {
        let question = &detail.question;
        let can_resolve = viewer.is_admin
            || (!viewer.username.is_empty() && question.username == viewer.username);
        let can_edit = viewer.is_admin || (can_resolve && question.comment_count == 0);
        Self {
            can_resolve,
            can_edit,
            can_delete: viewer.is_admin || can_edit,
        }
    }

    pub fn check_resolve(&self) -> Result<(), ActionDenied> {
        if self.can_resolve {
            Ok(())
        } else {
            Err(ActionDenied::ResolveNotOwner)
        }
    }

    pub fn check_edit(&self) -> Result<(), ActionDenied> {
        if self.can_edit {
            Ok(())
        } else {
            Err(ActionDenied::EditNotAllowed)
        }
    }

    pub fn check_delete(&self) -> Result<(), ActionDenied> {
        if self.can_delete {
            Ok(())
        } else {
            Err(ActionDenied::DeleteHasComments)
        }
    }

    /// Marking a comment useful is reserved for whoever may resolve the question.
    pub fn check_mark_useful(&self) -> Result<(), ActionDenied> {
        if self.can_resolve {
            Ok(())
        } else {
            Err(ActionDenied::UsefulNotOwner)
        }
    }
}

pub fn check_like_comment(viewer: &Viewer, card: &CommentCard) -> Result<(), ActionDenied> {
    if !viewer.is_admin && !viewer.username.is_empty() && card.comment.username == viewer.username {
        return Err(ActionDenied::LikeOwnComment);
    }
    Ok(())
}

pub fn check_edit_comment(viewer: &Viewer, card: &CommentCard) -> Result<(), ActionDenied> {
    if viewer.owns(&card.comment.username) {
        Ok(())
    } else {
        Err(ActionDenied::EditOthersComment)
    }
}

pub fn check_delete_comment(viewer: &Viewer, card: &CommentCard) -> Result<(), ActionDenied> {
    if viewer.is_admin {
        return Ok(());
    }
    if !viewer.owns(&card.comment.username) {
        return Err(ActionDenied::DeleteOthersComment);
    }
    if card.has_children() {
        return Err(ActionDenied::DeleteCommentWithReplies);
    }
    Ok(())
}

/// Reaction payload naming the question owner when the server told us who that is.
pub fn reaction_target(detail: &QuestionDetail) -> ReactionPayload {
    ReactionPayload {
        id: detail.question.id,
        entity_user_id: detail.user_id,
    }
}

fn step(count: i64, up: bool) -> i64 {
    if up {
        count.saturating_add(1)
    } else {
        (count - 1).max(0)
    }
}

/// Applies a successful like toggle locally. Returns the new liked state.
pub fn apply_like_toggle(detail: &mut QuestionDetail) -> bool {
    let liked = !flags::is_liked(detail.like_status.as_ref());
    detail.question.like_count = step(detail.question.like_count, liked);
    let marker = if liked { LIKED_MARKER } else { NOT_LIKED_MARKER };
    detail.like_status = Some(marker.into());
    liked
}

/// Applies a successful collect toggle locally. Returns the new collected state.
pub fn apply_collect_toggle(detail: &mut QuestionDetail) -> bool {
    let collected = !flags::is_collected(detail.collect_status.as_ref());
    detail.question.collect_count = step(detail.question.collect_count, collected);
    let marker = if collected {
        COLLECTED_MARKER
    } else {
        NOT_COLLECTED_MARKER
    };
    detail.collect_status = Some(marker.into());
    collected
}

/// Flips the solved flag. Returns true when the question is now solved.
pub fn apply_resolve_toggle(detail: &mut QuestionDetail) -> bool {
    detail.question.solved_flag = if detail.question.is_solved() { 0 } else { 1 };
    detail.question.is_solved()
}

/// Bookkeeping after a new comment lands: the count grows and only admins keep edit rights.
pub fn apply_comment_published(detail: &mut QuestionDetail, viewer: &Viewer) -> Permissions {
    detail.question.comment_count = detail.question.comment_count.saturating_add(1);
    Permissions {
        can_resolve: Permissions::for_question(detail, viewer).can_resolve,
        can_edit: viewer.is_admin,
        can_delete: viewer.is_admin,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCard {
    pub kind: MessageType,
    pub label: &'static str,
    pub total_count: u64,
    pub unread_count: u64,
}

/// One card per message type in tab order; types missing from the summary count zero.
pub fn merge_summary(items: &[MessageSummaryItem]) -> Vec<SummaryCard> {
    MessageType::ALL
        .iter()
        .map(|kind| {
            let found = items.iter().rev().find(|item| item.kind == *kind);
            SummaryCard {
                kind: *kind,
                label: kind.label(),
                total_count: found.map(|item| item.total_count).unwrap_or_default(),
                unread_count: found.map(|item| item.unread_count).unwrap_or_default(),
            }
        })
        .collect()
}

/// First tab with unread messages, else the first tab.
pub fn initial_message_type(cards: &[SummaryCard]) -> MessageType {
    cards
        .iter()
        .find(|card| card.unread_count > 0)
        .map(|card| card.kind)
        .unwrap_or(MessageType::ALL[0])
}

pub fn total_unread(cards: &[SummaryCard]) -> u64 {
    cards.iter().map(|card| card.unread_count).sum()
}
