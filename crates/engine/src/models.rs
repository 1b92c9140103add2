//! Actors and actions — the inputs to every transition request.
//!
//! Items, records and statuses live in the `store` crate; this module adds
//! the caller-side vocabulary the validator decides over.

use serde::{Deserialize, Serialize};
use store::{ActorId, Status, WorkflowItem, WorkflowKind};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account role supplied by the authenticating layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    /// Whether this role may approve or reject items of `kind`.
    ///
    /// Teachers review their students' story ideas; teacher registration
    /// requests are reviewed by administrators only.
    pub fn can_review(&self, kind: WorkflowKind) -> bool {
        match (self, kind) {
            (Self::Admin, _) => true,
            (Self::Teacher, WorkflowKind::StoryIdea) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin"   => Ok(Self::Admin),
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            other     => Err(format!("unknown role: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The authenticated user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ActorId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn owns(&self, item: &WorkflowItem) -> bool {
        item.owner_actor_id == self.id
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A requested transition, named the way the HTTP routes name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Owner sends a draft for review.
    Submit,
    Approve,
    /// Requires a non-blank reason.
    Reject,
    /// Owner sends a rejected item back for review.
    Resubmit,
}

impl Action {
    /// Status the action moves an item into.
    pub fn target(&self) -> Status {
        match self {
            Self::Submit | Self::Resubmit => Status::Pending,
            Self::Approve => Status::Approved,
            Self::Reject => Status::Rejected,
        }
    }

    /// Status the action must start from, or `None` if `kind` has no such action.
    pub fn source(&self, kind: WorkflowKind) -> Option<Status> {
        match (kind, self) {
            (WorkflowKind::StoryIdea, Self::Submit) => Some(Status::Draft),
            (WorkflowKind::StoryIdea, Self::Resubmit) => Some(Status::Rejected),
            (_, Self::Approve | Self::Reject) => Some(Status::Pending),
            (WorkflowKind::TeacherRequest, Self::Submit | Self::Resubmit) => None,
        }
    }

    /// Only the item's owner may perform this action.
    pub fn owner_only(&self) -> bool {
        matches!(self, Self::Submit | Self::Resubmit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Resubmit => "resubmit",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit"   => Ok(Self::Submit),
            "approve"  => Ok(Self::Approve),
            "reject"   => Ok(Self::Reject),
            "resubmit" => Ok(Self::Resubmit),
            other      => Err(format!("unknown action: {other}")),
        }
    }
}
