//! Transition validation — run this before touching the store.
//!
//! Rules enforced, in order (the first failing rule is reported):
//! 1. The action must exist for the item's kind.
//! 2. The actor must be allowed to perform it (owner for submit/resubmit,
//!    a reviewing role for approve/reject).
//! 3. The item must not already be in the action's target status.
//! 4. The item must be in the action's source status.
//! 5. Rejections must carry a non-blank reason.
//!
//! Returns the next status on success. Pure: no I/O, no clock.

use store::{Status, WorkflowItem, WorkflowKind};
use thiserror::Error;

use crate::models::{Action, Actor, Role};

/// Why a transition request was refused.
///
/// Every variant names the current status and the attempted action so the
/// caller can tell the user what to do next.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The action does not apply to the item in its current status.
    #[error("cannot {action} a {kind} in '{current}': {requirement}")]
    IllegalTransition {
        kind: WorkflowKind,
        action: Action,
        current: Status,
        requirement: String,
    },

    /// The actor's role or ownership does not permit the action.
    #[error("{role} {actor_id} may not {action} an item in '{current}': {requirement}")]
    ForbiddenActor {
        actor_id: i64,
        role: Role,
        action: Action,
        current: Status,
        requirement: String,
    },

    /// A rejection arrived without a reason.
    #[error("cannot {action} an item in '{current}' without a reason")]
    MissingReason { action: Action, current: Status },

    /// The item is already where the action would take it.
    #[error("item is already '{current}'; {action} would change nothing")]
    NoOp { action: Action, current: Status },
}

/// Decide whether `actor` may apply `action` to `item`.
///
/// # Errors
/// - [`Rejection::IllegalTransition`] if the action is undefined for the kind
///   or the item is not in the action's source status.
/// - [`Rejection::ForbiddenActor`] if the actor lacks ownership or review rights.
/// - [`Rejection::NoOp`] if the item is already in the target status.
/// - [`Rejection::MissingReason`] if a rejection has no reason.
pub fn can_transition(
    item: &WorkflowItem,
    actor: &Actor,
    action: Action,
    reason: Option<&str>,
) -> Result<Status, Rejection> {
    let current = item.status;

    // -----------------------------------------------------------------------
    // 1. Action defined for this kind?
    // -----------------------------------------------------------------------
    let Some(source) = action.source(item.kind) else {
        return Err(Rejection::IllegalTransition {
            kind: item.kind,
            action,
            current,
            requirement: format!("{} items have no '{action}' step", item.kind),
        });
    };

    // -----------------------------------------------------------------------
    // 2. Actor permitted?
    // -----------------------------------------------------------------------
    if action.owner_only() {
        if !actor.owns(item) {
            return Err(Rejection::ForbiddenActor {
                actor_id: actor.id,
                role: actor.role,
                action,
                current,
                requirement: format!("only the owner ({}) may {action}", item.owner_actor_id),
            });
        }
    } else if !actor.role.can_review(item.kind) {
        let allowed = match item.kind {
            WorkflowKind::StoryIdea => "admin or teacher",
            WorkflowKind::TeacherRequest => "admin",
        };
        return Err(Rejection::ForbiddenActor {
            actor_id: actor.id,
            role: actor.role,
            action,
            current,
            requirement: format!("requires the {allowed} role"),
        });
    }

    // -----------------------------------------------------------------------
    // 3. Already there?
    // -----------------------------------------------------------------------
    let next = action.target();
    if current == next {
        return Err(Rejection::NoOp { action, current });
    }

    // -----------------------------------------------------------------------
    // 4. In the right starting status?
    // -----------------------------------------------------------------------
    if current != source {
        return Err(Rejection::IllegalTransition {
            kind: item.kind,
            action,
            current,
            requirement: format!("item must be '{source}'"),
        });
    }

    // -----------------------------------------------------------------------
    // 5. Reason present for rejections?
    // -----------------------------------------------------------------------
    if action == Action::Reject && reason.map_or(true, |r| r.trim().is_empty()) {
        return Err(Rejection::MissingReason { action, current });
    }

    Ok(next)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    const OWNER: i64 = 10;

    fn make_item(kind: WorkflowKind, status: Status) -> WorkflowItem {
        let now = Utc::now();
        WorkflowItem {
            id: Uuid::new_v4(),
            kind,
            title: "test".into(),
            details: serde_json::Value::Null,
            owner_actor_id: OWNER,
            status,
            initial_status: status,
            version: 0,
            created_at: now,
            last_transition_at: now,
        }
    }

    fn owner() -> Actor {
        Actor::new(OWNER, Role::Student)
    }

    fn admin() -> Actor {
        Actor::new(1, Role::Admin)
    }

    #[test]
    fn story_idea_happy_path_edges() {
        let draft = make_item(WorkflowKind::StoryIdea, Status::Draft);
        assert_eq!(can_transition(&draft, &owner(), Action::Submit, None), Ok(Status::Pending));

        let pending = make_item(WorkflowKind::StoryIdea, Status::Pending);
        assert_eq!(can_transition(&pending, &admin(), Action::Approve, None), Ok(Status::Approved));
        assert_eq!(
            can_transition(&pending, &admin(), Action::Reject, Some("too vague")),
            Ok(Status::Rejected)
        );

        let rejected = make_item(WorkflowKind::StoryIdea, Status::Rejected);
        assert_eq!(can_transition(&rejected, &owner(), Action::Resubmit, None), Ok(Status::Pending));
    }

    #[test]
    fn teachers_review_story_ideas_but_not_teacher_requests() {
        let teacher = Actor::new(2, Role::Teacher);

        let story = make_item(WorkflowKind::StoryIdea, Status::Pending);
        assert!(can_transition(&story, &teacher, Action::Approve, None).is_ok());

        let request = make_item(WorkflowKind::TeacherRequest, Status::Pending);
        assert!(matches!(
            can_transition(&request, &teacher, Action::Approve, None),
            Err(Rejection::ForbiddenActor { role: Role::Teacher, .. })
        ));
        assert_eq!(can_transition(&request, &admin(), Action::Approve, None), Ok(Status::Approved));
    }

    #[test]
    fn student_approve_is_forbidden_in_every_status() {
        let student = Actor::new(3, Role::Student);
        for status in [Status::Draft, Status::Pending, Status::Approved, Status::Rejected] {
            let item = make_item(WorkflowKind::StoryIdea, status);
            assert!(matches!(
                can_transition(&item, &student, Action::Approve, None),
                Err(Rejection::ForbiddenActor { .. })
            ));
        }
    }

    #[test]
    fn only_the_owner_submits() {
        let draft = make_item(WorkflowKind::StoryIdea, Status::Draft);
        // Not even an admin may submit on someone else's behalf.
        let err = can_transition(&draft, &admin(), Action::Submit, None).unwrap_err();
        assert!(matches!(err, Rejection::ForbiddenActor { .. }));
        assert!(err.to_string().contains("only the owner (10)"));
    }

    #[test]
    fn repeated_action_is_a_no_op() {
        let approved = make_item(WorkflowKind::StoryIdea, Status::Approved);
        assert_eq!(
            can_transition(&approved, &admin(), Action::Approve, None),
            Err(Rejection::NoOp { action: Action::Approve, current: Status::Approved })
        );

        let pending = make_item(WorkflowKind::StoryIdea, Status::Pending);
        assert!(matches!(
            can_transition(&pending, &owner(), Action::Submit, None),
            Err(Rejection::NoOp { .. })
        ));
    }

    #[test]
    fn approved_is_terminal() {
        let approved = make_item(WorkflowKind::StoryIdea, Status::Approved);
        assert!(matches!(
            can_transition(&approved, &admin(), Action::Reject, Some("changed my mind")),
            Err(Rejection::IllegalTransition { current: Status::Approved, .. })
        ));
        assert!(matches!(
            can_transition(&approved, &owner(), Action::Resubmit, None),
            Err(Rejection::IllegalTransition { .. })
        ));
    }

    #[test]
    fn draft_cannot_skip_review() {
        let draft = make_item(WorkflowKind::StoryIdea, Status::Draft);
        let err = can_transition(&draft, &admin(), Action::Approve, None).unwrap_err();
        assert!(matches!(err, Rejection::IllegalTransition { .. }));
        assert!(err.to_string().contains("item must be 'pending'"));
    }

    #[test]
    fn teacher_requests_have_no_submit_step() {
        let request = make_item(WorkflowKind::TeacherRequest, Status::Rejected);
        assert!(matches!(
            can_transition(&request, &owner(), Action::Resubmit, None),
            Err(Rejection::IllegalTransition { kind: WorkflowKind::TeacherRequest, .. })
        ));
    }

    #[test]
    fn reject_needs_a_non_blank_reason() {
        let pending = make_item(WorkflowKind::StoryIdea, Status::Pending);
        for reason in [None, Some(""), Some("   ")] {
            assert_eq!(
                can_transition(&pending, &admin(), Action::Reject, reason),
                Err(Rejection::MissingReason { action: Action::Reject, current: Status::Pending })
            );
        }
    }
}
