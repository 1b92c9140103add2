//! Records shared by the engine and every storage backend.
//!
//! Defined here (in the store crate) so both the engine and the backends can
//! import them without a circular dependency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary key of a user in the surrounding application.
pub type ActorId = i64;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The closed set of states an item can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft"    => Ok(Self::Draft),
            "pending"  => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other      => Err(format!("unknown status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowKind
// ---------------------------------------------------------------------------

/// Which state machine an item follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// A student-submitted podcast story idea.
    StoryIdea,
    /// A teacher registration request awaiting an administrator.
    TeacherRequest,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StoryIdea => "story_idea",
            Self::TeacherRequest => "teacher_request",
        }
    }

    /// Whether an item of this kind may be created in `status`.
    pub fn accepts_initial(&self, status: Status) -> bool {
        match self {
            Self::StoryIdea => matches!(status, Status::Draft | Status::Pending),
            Self::TeacherRequest => status == Status::Pending,
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story_idea"      => Ok(Self::StoryIdea),
            "teacher_request" => Ok(Self::TeacherRequest),
            other             => Err(format!("unknown workflow kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowItem
// ---------------------------------------------------------------------------

/// Current-state snapshot of an item under the approval workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowItem {
    pub id: Uuid,
    pub kind: WorkflowKind,
    pub title: String,
    /// Kind-specific payload (story summary, school name, …), opaque to the core.
    pub details: serde_json::Value,
    pub owner_actor_id: ActorId,
    pub status: Status,
    pub initial_status: Status,
    /// Number of successful transitions so far.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}

/// Input for creating a new item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub kind: WorkflowKind,
    pub title: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub owner_actor_id: ActorId,
    pub initial_status: Status,
}

// ---------------------------------------------------------------------------
// TransitionRecord
// ---------------------------------------------------------------------------

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Assigned by the log; insertion order.
    pub id: i64,
    pub item_id: Uuid,
    /// Item version after this transition (1 for the first record).
    pub seq: i64,
    pub actor_id: ActorId,
    pub from_status: Status,
    pub to_status: Status,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// A transition that has been applied to the item but not yet logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransition {
    pub item_id: Uuid,
    pub seq: i64,
    pub actor_id: ActorId,
    pub from_status: Status,
    pub to_status: Status,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewTransition {
    /// True when `record` describes the same transition (client retry).
    pub fn matches(&self, record: &TransitionRecord) -> bool {
        record.item_id == self.item_id
            && record.seq == self.seq
            && record.actor_id == self.actor_id
            && record.from_status == self.from_status
            && record.to_status == self.to_status
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Row filter for listing queries. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub kind: Option<WorkflowKind>,
    pub owner: Option<ActorId>,
}

impl Scope {
    pub fn admits(&self, item: &WorkflowItem) -> bool {
        self.kind.map_or(true, |k| k == item.kind)
            && self.owner.map_or(true, |o| o == item.owner_actor_id)
    }
}
