use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity ---

/// Identity
///
/// The resolved id of an authenticated actor. Produced by the `AuthProvider` and
/// never mutated afterwards; every authorization decision is keyed on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[ts(export)]
pub struct Identity(pub Uuid);

impl Identity {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Appends `value` unless it is already present. Returns true if the list changed.
fn insert_unique<T: PartialEq>(list: &mut Vec<T>, value: T) -> bool {
    if list.contains(&value) {
        return false;
    }
    list.push(value);
    true
}

/// Removes every occurrence of `value`. Returns true if the list changed.
fn remove_all<T: PartialEq>(list: &mut Vec<T>, value: &T) -> bool {
    let before = list.len();
    list.retain(|item| item != value);
    list.len() != before
}

/// BlobRef
///
/// Pointer to file content held by the `BlobStore`. `storage_id` is the handle used
/// for deletion; `url` is what clients download from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BlobRef {
    pub url: String,
    pub storage_id: String,
}

// --- Aggregate Root ---

/// Classroom
///
/// The aggregate root. All nested resources are authorized through the owner and
/// member sets held here.
///
/// The id lists behave as sets: the mutators below never introduce duplicates.
/// Owners and members may overlap.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Classroom {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    // Never empty once created: the creator is inserted by `Classroom::new`.
    pub owner_ids: Vec<Identity>,
    pub member_ids: Vec<Identity>,
    // Ordered module references. Modules also store `classroom_id`.
    pub module_ids: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Classroom {
    /// Creates a classroom owned by `creator`.
    pub fn new(creator: Identity, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            owner_ids: vec![creator],
            member_ids: Vec::new(),
            module_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owner(&self, actor: &Identity) -> bool {
        self.owner_ids.contains(actor)
    }

    pub fn is_member(&self, actor: &Identity) -> bool {
        self.member_ids.contains(actor)
    }

    /// Owner or member.
    pub fn is_participant(&self, actor: &Identity) -> bool {
        self.is_owner(actor) || self.is_member(actor)
    }

    pub fn add_owner(&mut self, actor: Identity) -> bool {
        insert_unique(&mut self.owner_ids, actor)
    }

    pub fn add_member(&mut self, actor: Identity) -> bool {
        insert_unique(&mut self.member_ids, actor)
    }

    pub fn remove_owner(&mut self, actor: &Identity) -> bool {
        remove_all(&mut self.owner_ids, actor)
    }

    pub fn remove_member(&mut self, actor: &Identity) -> bool {
        remove_all(&mut self.member_ids, actor)
    }

    pub fn attach_module(&mut self, module_id: Uuid) -> bool {
        insert_unique(&mut self.module_ids, module_id)
    }

    pub fn detach_module(&mut self, module_id: &Uuid) -> bool {
        remove_all(&mut self.module_ids, module_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// ClassroomSummary
///
/// Search result shape. Exposes enough to decide whether to join without leaking
/// who the owners and members are.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ClassroomSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_count: usize,
    pub member_count: usize,
}

impl From<&Classroom> for ClassroomSummary {
    fn from(classroom: &Classroom) -> Self {
        Self {
            id: classroom.id,
            name: classroom.name.clone(),
            description: classroom.description.clone(),
            owner_count: classroom.owner_ids.len(),
            member_count: classroom.member_ids.len(),
        }
    }
}

// --- Nested Resources ---

/// Note
///
/// A file attached to a module. Notes have their own id so a single one can be
/// targeted for deletion.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Note {
    pub id: Uuid,
    pub file: BlobRef,
    #[ts(type = "string")]
    pub uploaded_at: DateTime<Utc>,
}

/// Module
///
/// Child of a classroom. Holds its notes inline and references its homework and
/// lectures by id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Module {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub name: String,
    pub notes: Vec<Note>,
    pub homework_ids: Vec<Uuid>,
    pub lecture_ids: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Module {
    pub fn new(classroom_id: Uuid, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            classroom_id,
            name,
            notes: Vec::new(),
            homework_ids: Vec::new(),
            lecture_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn note(&self, note_id: &Uuid) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == *note_id)
    }

    /// Removes and returns the note, if present.
    pub fn take_note(&mut self, note_id: &Uuid) -> Option<Note> {
        let index = self.notes.iter().position(|note| note.id == *note_id)?;
        Some(self.notes.remove(index))
    }

    pub fn attach_homework(&mut self, homework_id: Uuid) -> bool {
        insert_unique(&mut self.homework_ids, homework_id)
    }

    pub fn detach_homework(&mut self, homework_id: &Uuid) -> bool {
        remove_all(&mut self.homework_ids, homework_id)
    }

    pub fn attach_lecture(&mut self, lecture_id: Uuid) -> bool {
        insert_unique(&mut self.lecture_ids, lecture_id)
    }

    pub fn detach_lecture(&mut self, lecture_id: &Uuid) -> bool {
        remove_all(&mut self.lecture_ids, lecture_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Submission
///
/// One uploaded answer to a homework. Members may submit more than once; every
/// upload is kept.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Submission {
    pub id: Uuid,
    pub submitted_by: Identity,
    pub file: BlobRef,
    #[ts(type = "string")]
    pub submitted_at: DateTime<Utc>,
}

/// Homework
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Homework {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: String,
    pub file: BlobRef,
    #[ts(type = "string")]
    pub due_date: DateTime<Utc>,
    pub submissions: Vec<Submission>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Lecture
///
/// Groups videos inside a module.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Lecture {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub video_ids: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Lecture {
    pub fn attach_video(&mut self, video_id: Uuid) -> bool {
        insert_unique(&mut self.video_ids, video_id)
    }

    pub fn detach_video(&mut self, video_id: &Uuid) -> bool {
        remove_all(&mut self.video_ids, video_id)
    }
}

/// Video
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Video {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub lecture_id: Uuid,
    pub title: String,
    pub file: BlobRef,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---
//
// Required fields are `Option` so that a missing field reaches the gateway and is
// reported by name instead of failing JSON deserialization.

/// CreateClassroomRequest
///
/// Input payload for POST /classrooms.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateClassroomRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// UpdateClassroomRequest
///
/// Partial update payload for PATCH /classrooms/{classroom_id}. At least one field
/// must be present.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateClassroomRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// MemberRequest
///
/// Target of a membership change (add, promote, remove).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MemberRequest {
    pub user_id: Option<String>,
}

/// JoinClassroomRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct JoinClassroomRequest {
    pub classroom_id: Option<String>,
}

/// ModuleRequest
///
/// Used for both module creation and rename.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ModuleRequest {
    pub name: Option<String>,
}

/// HomeworkForm
///
/// Text fields of the multipart homework form. The attached file travels
/// separately as a `FileUpload`. `due_date` is RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct HomeworkForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

/// LectureRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LectureRequest {
    pub title: Option<String>,
}

/// VideoForm
///
/// Text fields of the multipart video upload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VideoForm {
    pub title: Option<String>,
}

/// SearchQuery
///
/// Query string of GET /classrooms/search.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams, Default)]
pub struct SearchQuery {
    /// Case-insensitive fragment of the classroom name.
    pub q: Option<String>,
}

/// FileUpload
///
/// A file received from a multipart request, held in memory until it is handed to
/// the `BlobStore`.
#[derive(Debug, Clone, Default)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// --- Auth Schemas ---

/// Credentials
///
/// Email/password pair forwarded to the identity service. The password is never
/// persisted or logged by this application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// TokenPair
///
/// Output of a successful login or refresh.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// RefreshTokenRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// CurrentUser
///
/// Output of POST /users/register.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CurrentUser {
    pub id: Identity,
}

/// ChangePasswordRequest
///
/// Input payload for POST /users/change-password.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

/// UpdateAccountRequest
///
/// Partial update payload for PATCH /users/update-account. At least one field must
/// be present.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// AccountDetails
///
/// Account fields held by the identity service, as returned after an update.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccountDetails {
    pub id: Identity,
    pub email: String,
    pub full_name: Option<String>,
}

// --- Profiles ---

/// ProfileImage
///
/// Which of the two profile images an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    /// Name of the multipart part carrying the image.
    pub fn field(&self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "coverImage",
        }
    }
}

/// Profile
///
/// Per-user data this service owns. Account fields live with the identity service;
/// only the image blobs are kept here. Keyed by the identity itself.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Profile {
    pub id: Identity,
    pub avatar: Option<BlobRef>,
    pub cover_image: Option<BlobRef>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn empty(id: Identity) -> Self {
        Self {
            id,
            avatar: None,
            cover_image: None,
            updated_at: Utc::now(),
        }
    }

    /// Installs `blob` in `slot` and hands back whatever it replaced.
    pub fn replace_image(&mut self, slot: ProfileImage, blob: BlobRef) -> Option<BlobRef> {
        self.updated_at = Utc::now();
        match slot {
            ProfileImage::Avatar => self.avatar.replace(blob),
            ProfileImage::CoverImage => self.cover_image.replace(blob),
        }
    }
}
