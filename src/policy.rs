//! Classroom authorization policy.
//!
//! Every access decision in the service is a set-membership test against the
//! classroom that owns the resource. `decide` is pure: callers pass a classroom
//! loaded within the same request and act on the returned `Decision`.

use crate::{
    error::ApiError,
    models::{Classroom, Identity},
};

/// Action
///
/// Everything an actor can ask to do with a classroom or one of its nested
/// resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ReadClassroom,
    UpdateClassroom,
    DeleteClassroom,
    AddMember,
    MakeOwner,
    RemoveMember,
    LeaveClassroom,
    JoinClassroom,
    CreateModule,
    ReadModule,
    UpdateModule,
    DeleteModule,
    AddNote,
    DeleteNote,
    CreateHomework,
    ReadHomework,
    UpdateHomework,
    DeleteHomework,
    SubmitHomework,
    CreateLecture,
    ReadLecture,
    DeleteLecture,
    AddVideo,
    DeleteVideo,
}

/// Relationship an actor must hold with the classroom for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Actor must appear in `owner_ids`.
    Owner,
    /// Actor must appear in `owner_ids` or `member_ids`.
    Participant,
    /// No prior relationship.
    Anyone,
}

impl Action {
    pub const ALL: [Action; 24] = [
        Action::ReadClassroom,
        Action::UpdateClassroom,
        Action::DeleteClassroom,
        Action::AddMember,
        Action::MakeOwner,
        Action::RemoveMember,
        Action::LeaveClassroom,
        Action::JoinClassroom,
        Action::CreateModule,
        Action::ReadModule,
        Action::UpdateModule,
        Action::DeleteModule,
        Action::AddNote,
        Action::DeleteNote,
        Action::CreateHomework,
        Action::ReadHomework,
        Action::UpdateHomework,
        Action::DeleteHomework,
        Action::SubmitHomework,
        Action::CreateLecture,
        Action::ReadLecture,
        Action::DeleteLecture,
        Action::AddVideo,
        Action::DeleteVideo,
    ];

    pub fn requirement(&self) -> Requirement {
        match self {
            Action::UpdateClassroom
            | Action::DeleteClassroom
            | Action::AddMember
            | Action::MakeOwner
            | Action::RemoveMember
            | Action::CreateModule
            | Action::UpdateModule
            | Action::DeleteModule
            | Action::AddNote
            | Action::DeleteNote
            | Action::CreateHomework
            | Action::UpdateHomework
            | Action::DeleteHomework
            | Action::CreateLecture
            | Action::DeleteLecture
            | Action::AddVideo
            | Action::DeleteVideo => Requirement::Owner,
            Action::ReadClassroom
            | Action::LeaveClassroom
            | Action::ReadModule
            | Action::ReadHomework
            | Action::SubmitHomework
            | Action::ReadLecture => Requirement::Participant,
            Action::JoinClassroom => Requirement::Anyone,
        }
    }
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotOwner,
    NotMember,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NotOwner => f.write_str("not an owner of this classroom"),
            DenyReason::NotMember => f.write_str("not a member of this classroom"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Converts a denial into `ApiError::Forbidden`.
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(ApiError::Forbidden(reason)),
        }
    }
}

/// decide
///
/// Owners hold every member-level right; membership alone never grants an
/// owner-level action.
pub fn decide(actor: &Identity, classroom: &Classroom, action: Action) -> Decision {
    let decision = match action.requirement() {
        Requirement::Anyone => Decision::Allow,
        Requirement::Owner if classroom.is_owner(actor) => Decision::Allow,
        Requirement::Owner => Decision::Deny(DenyReason::NotOwner),
        Requirement::Participant if classroom.is_participant(actor) => Decision::Allow,
        Requirement::Participant => Decision::Deny(DenyReason::NotMember),
    };

    if let Decision::Deny(reason) = decision {
        tracing::debug!(
            actor = %actor,
            classroom_id = %classroom.id,
            action = ?action,
            %reason,
            "authorization denied"
        );
    }

    decision
}

/// authorize
///
/// `decide` followed by `Decision::into_result`, for use with `?`.
pub fn authorize(actor: &Identity, classroom: &Classroom, action: Action) -> Result<(), ApiError> {
    decide(actor, classroom, action).into_result()
}
