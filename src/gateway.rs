//! Resource gateway.
//!
//! Every classroom-scoped operation runs the same sequence:
//!
//! 1. validate path and body input, reporting the first missing field;
//! 2. load the classroom and each nested resource in path order;
//! 3. ask [`policy::decide`] on the freshly loaded classroom;
//! 4. mutate, uploading new blobs first and discarding superseded ones after;
//! 5. persist every touched document in one [`Repository::commit`].
//!
//! Nothing is uploaded or deleted from blob storage before step 3 succeeds.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{ApiError, ResourceKind},
    models::{
        BlobRef, Classroom, ClassroomSummary, CreateClassroomRequest, FileUpload, Homework,
        HomeworkForm, Identity, JoinClassroomRequest, Lecture, LectureRequest, MemberRequest,
        Module, ModuleRequest, Note, Profile, ProfileImage, Submission, UpdateClassroomRequest,
        Video, VideoForm,
    },
    policy::{self, Action},
    repository::{RepositoryState, Write},
    storage::StorageState,
};

// --- Input validation ---

/// Longest accepted name or title.
pub const MAX_LABEL_CHARS: usize = 200;

/// Longest accepted classroom or homework description.
pub const MAX_DESCRIPTION_CHARS: usize = 5_000;

fn parse_id(field: &str, raw: &str) -> Result<Uuid, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::required(field));
    }
    Uuid::parse_str(raw).map_err(|_| ApiError::malformed(field))
}

fn require_id(field: &str, raw: Option<&str>) -> Result<Uuid, ApiError> {
    parse_id(field, raw.unwrap_or_default())
}

fn require_text(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::required(field))
}

fn within_limit(field: &str, value: String, max_chars: usize) -> Result<String, ApiError> {
    if value.chars().count() > max_chars {
        return Err(ApiError::too_long(field, max_chars));
    }
    Ok(value)
}

fn require_label(field: &str, value: Option<String>) -> Result<String, ApiError> {
    within_limit(field, require_text(field, value)?, MAX_LABEL_CHARS)
}

/// `Some` only for a non-blank value; `Some("")` counts as an explicit empty value.
fn optional_text(
    field: &str,
    value: Option<String>,
    max_chars: usize,
) -> Result<Option<String>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => within_limit(field, require_text(field, Some(v))?, max_chars).map(Some),
    }
}

/// Trimmed description, `None` when blank.
fn description_text(value: Option<String>) -> Result<Option<String>, ApiError> {
    value
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .map(|d| within_limit("description", d, MAX_DESCRIPTION_CHARS))
        .transpose()
}

fn require_file(field: &str, file: Option<FileUpload>) -> Result<FileUpload, ApiError> {
    file.filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| ApiError::required(field))
}

fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| ApiError::malformed("due_date"))
}

/// ResourceGateway
///
/// Orchestrates load → authorize → mutate → persist for every endpoint. Holds only
/// shared handles; all authority state is read from the store on each call.
#[derive(Clone)]
pub struct ResourceGateway {
    repo: RepositoryState,
    blobs: StorageState,
}

impl ResourceGateway {
    pub fn new(repo: RepositoryState, blobs: StorageState) -> Self {
        Self { repo, blobs }
    }

    // --- Resource chain resolution ---

    async fn load_classroom(&self, classroom_id: Uuid) -> Result<Classroom, ApiError> {
        self.repo
            .load::<Classroom>(classroom_id)
            .await?
            .ok_or(ApiError::NotFound(ResourceKind::Classroom))
    }

    async fn load_module(&self, classroom: &Classroom, module_id: Uuid) -> Result<Module, ApiError> {
        self.repo
            .load::<Module>(module_id)
            .await?
            .filter(|module| module.classroom_id == classroom.id)
            .ok_or(ApiError::NotFound(ResourceKind::Module))
    }

    async fn load_homework(&self, module: &Module, homework_id: Uuid) -> Result<Homework, ApiError> {
        self.repo
            .load::<Homework>(homework_id)
            .await?
            .filter(|homework| homework.module_id == module.id)
            .ok_or(ApiError::NotFound(ResourceKind::Homework))
    }

    async fn load_lecture(&self, module: &Module, lecture_id: Uuid) -> Result<Lecture, ApiError> {
        self.repo
            .load::<Lecture>(lecture_id)
            .await?
            .filter(|lecture| lecture.module_id == module.id)
            .ok_or(ApiError::NotFound(ResourceKind::Lecture))
    }

    async fn load_video(&self, lecture: &Lecture, video_id: Uuid) -> Result<Video, ApiError> {
        self.repo
            .load::<Video>(video_id)
            .await?
            .filter(|video| video.lecture_id == lecture.id)
            .ok_or(ApiError::NotFound(ResourceKind::Video))
    }

    async fn load_classroom_module(
        &self,
        classroom_id: Uuid,
        module_id: Uuid,
    ) -> Result<(Classroom, Module), ApiError> {
        let classroom = self.load_classroom(classroom_id).await?;
        let module = self.load_module(&classroom, module_id).await?;
        Ok((classroom, module))
    }

    /// Best-effort removal of a superseded blob. Failures are logged and swallowed.
    async fn discard_blob(&self, blob: &BlobRef) {
        if let Err(e) = self.blobs.delete(&blob.storage_id).await {
            tracing::warn!(
                storage_id = %blob.storage_id,
                error = %e,
                "blob deletion failed, continuing"
            );
        }
    }

    // --- Classrooms ---

    pub async fn create_classroom(
        &self,
        actor: Identity,
        req: CreateClassroomRequest,
    ) -> Result<Classroom, ApiError> {
        let name = require_label("name", req.name)?;
        let description = description_text(req.description)?;

        let classroom = Classroom::new(actor, name, description);
        self.repo.save(&classroom).await?;

        tracing::info!(classroom_id = %classroom.id, owner = %actor, "classroom created");
        Ok(classroom)
    }

    pub async fn list_classrooms(&self, actor: Identity) -> Result<Vec<Classroom>, ApiError> {
        Ok(self.repo.find_classrooms_for(actor).await?)
    }

    /// search_classrooms
    ///
    /// Open to any authenticated actor so classrooms can be discovered before
    /// joining. Results carry no membership lists.
    pub async fn search_classrooms(
        &self,
        _actor: Identity,
        query: Option<String>,
    ) -> Result<Vec<ClassroomSummary>, ApiError> {
        let query = require_text("q", query)?;
        let found = self.repo.search_classrooms(&query).await?;
        Ok(found.iter().map(ClassroomSummary::from).collect())
    }

    pub async fn get_classroom(
        &self,
        actor: Identity,
        classroom_id: &str,
    ) -> Result<Classroom, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::ReadClassroom)?;
        Ok(classroom)
    }

    pub async fn update_classroom(
        &self,
        actor: Identity,
        classroom_id: &str,
        req: UpdateClassroomRequest,
    ) -> Result<Classroom, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        if req.name.is_none() && req.description.is_none() {
            return Err(ApiError::required("name or description"));
        }
        let name = optional_text("name", req.name, MAX_LABEL_CHARS)?;
        let description = req.description.map(|d| description_text(Some(d))).transpose()?;

        let mut classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::UpdateClassroom)?;

        if let Some(name) = name {
            classroom.name = name;
        }
        if let Some(description) = description {
            classroom.description = description;
        }
        classroom.touch();
        self.repo.save(&classroom).await?;
        Ok(classroom)
    }

    /// delete_classroom
    ///
    /// Removes only the classroom document. Modules and everything below them stay
    /// in the store.
    pub async fn delete_classroom(&self, actor: Identity, classroom_id: &str) -> Result<(), ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::DeleteClassroom)?;

        if !classroom.module_ids.is_empty() {
            tracing::warn!(
                classroom_id = %classroom.id,
                orphaned_modules = classroom.module_ids.len(),
                "deleting classroom without cascading to its modules"
            );
        }

        self.repo.delete_by_id::<Classroom>(classroom.id).await?;
        tracing::info!(classroom_id = %classroom.id, actor = %actor, "classroom deleted");
        Ok(())
    }

    // --- Membership ---

    pub async fn add_member(
        &self,
        actor: Identity,
        classroom_id: &str,
        req: MemberRequest,
    ) -> Result<Classroom, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let target = Identity::new(require_id("user_id", req.user_id.as_deref())?);

        let mut classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::AddMember)?;

        if !classroom.is_participant(&target) {
            classroom.add_member(target);
            classroom.touch();
            self.repo.save(&classroom).await?;
        }
        Ok(classroom)
    }

    /// make_owner
    ///
    /// Promotes an existing participant. The target keeps any member entry.
    pub async fn make_owner(
        &self,
        actor: Identity,
        classroom_id: &str,
        req: MemberRequest,
    ) -> Result<Classroom, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let target = Identity::new(require_id("user_id", req.user_id.as_deref())?);

        let mut classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::MakeOwner)?;

        if !classroom.is_participant(&target) {
            return Err(ApiError::NotFound(ResourceKind::Member));
        }
        if classroom.add_owner(target) {
            classroom.touch();
            self.repo.save(&classroom).await?;
            tracing::info!(classroom_id = %classroom.id, promoted = %target, "owner added");
        }
        Ok(classroom)
    }

    pub async fn remove_member(
        &self,
        actor: Identity,
        classroom_id: &str,
        req: MemberRequest,
    ) -> Result<Classroom, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let target = Identity::new(require_id("user_id", req.user_id.as_deref())?);

        let mut classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::RemoveMember)?;

        if !classroom.remove_member(&target) {
            return Err(ApiError::NotFound(ResourceKind::Member));
        }
        classroom.touch();
        self.repo.save(&classroom).await?;
        Ok(classroom)
    }

    /// leave_classroom
    ///
    /// Removes the actor from both the owner and member sets. The last owner cannot
    /// leave, since a classroom must always have one.
    pub async fn leave_classroom(&self, actor: Identity, classroom_id: &str) -> Result<(), ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let mut classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::LeaveClassroom)?;

        if classroom.is_owner(&actor) && classroom.owner_ids.len() == 1 {
            return Err(ApiError::Conflict(
                "The last owner cannot leave the classroom".to_string(),
            ));
        }

        classroom.remove_owner(&actor);
        classroom.remove_member(&actor);
        classroom.touch();
        self.repo.save(&classroom).await?;
        Ok(())
    }

    /// join_classroom
    ///
    /// Idempotent: joining a classroom the actor already owns or belongs to
    /// succeeds without changing it.
    pub async fn join_classroom(
        &self,
        actor: Identity,
        req: JoinClassroomRequest,
    ) -> Result<Classroom, ApiError> {
        let classroom_id = require_id("classroom_id", req.classroom_id.as_deref())?;
        let mut classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::JoinClassroom)?;

        if classroom.is_participant(&actor) {
            return Ok(classroom);
        }
        classroom.add_member(actor);
        classroom.touch();
        self.repo.save(&classroom).await?;
        tracing::info!(classroom_id = %classroom.id, member = %actor, "member joined");
        Ok(classroom)
    }

    // --- Modules ---

    pub async fn create_module(
        &self,
        actor: Identity,
        classroom_id: &str,
        req: ModuleRequest,
    ) -> Result<Module, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let name = require_label("name", req.name)?;

        let mut classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::CreateModule)?;

        let module = Module::new(classroom.id, name);
        classroom.attach_module(module.id);
        classroom.touch();

        self.repo
            .commit(vec![Write::put(&module)?, Write::put(&classroom)?])
            .await?;
        tracing::info!(classroom_id = %classroom.id, module_id = %module.id, "module created");
        Ok(module)
    }

    pub async fn list_modules(
        &self,
        actor: Identity,
        classroom_id: &str,
    ) -> Result<Vec<Module>, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let classroom = self.load_classroom(classroom_id).await?;
        policy::authorize(&actor, &classroom, Action::ReadModule)?;
        Ok(self.repo.load_children::<Module>(classroom.id).await?)
    }

    pub async fn get_module(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
    ) -> Result<Module, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::ReadModule)?;
        Ok(module)
    }

    pub async fn update_module(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        req: ModuleRequest,
    ) -> Result<Module, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let name = require_label("name", req.name)?;

        let (classroom, mut module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::UpdateModule)?;

        module.name = name;
        module.touch();
        self.repo.save(&module).await?;
        Ok(module)
    }

    /// delete_module
    ///
    /// Deletes the module document and its note blobs, and drops the id from the
    /// classroom in the same commit. Homework and lectures are left in place.
    pub async fn delete_module(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
    ) -> Result<(), ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;

        let (mut classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::DeleteModule)?;

        classroom.detach_module(&module.id);
        classroom.touch();

        for note in &module.notes {
            self.discard_blob(&note.file).await;
        }

        self.repo
            .commit(vec![Write::delete::<Module>(module.id), Write::put(&classroom)?])
            .await?;
        tracing::info!(classroom_id = %classroom.id, module_id = %module.id, "module deleted");
        Ok(())
    }

    // --- Notes ---

    pub async fn add_note(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        file: Option<FileUpload>,
    ) -> Result<Module, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let file = require_file("noteFile", file)?;

        let (classroom, mut module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::AddNote)?;

        let blob = self.blobs.upload(file).await?;
        module.notes.push(Note {
            id: Uuid::new_v4(),
            file: blob,
            uploaded_at: Utc::now(),
        });
        module.touch();

        self.repo.save(&module).await?;
        Ok(module)
    }

    pub async fn delete_note(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        note_id: &str,
    ) -> Result<(), ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let note_id = parse_id("note_id", note_id)?;

        let (classroom, mut module) = self.load_classroom_module(classroom_id, module_id).await?;
        if module.note(&note_id).is_none() {
            return Err(ApiError::NotFound(ResourceKind::Note));
        }
        policy::authorize(&actor, &classroom, Action::DeleteNote)?;

        let note = module
            .take_note(&note_id)
            .ok_or(ApiError::NotFound(ResourceKind::Note))?;
        module.touch();
        self.discard_blob(&note.file).await;

        self.repo.save(&module).await?;
        Ok(())
    }

    // --- Homework ---

    pub async fn create_homework(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        form: HomeworkForm,
        file: Option<FileUpload>,
    ) -> Result<Homework, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let title = require_label("title", form.title)?;
        let description = within_limit(
            "description",
            require_text("description", form.description)?,
            MAX_DESCRIPTION_CHARS,
        )?;
        let due_date = parse_due_date(&require_text("due_date", form.due_date)?)?;
        let file = require_file("homeworkFile", file)?;

        let (classroom, mut module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::CreateHomework)?;

        let blob = self.blobs.upload(file).await?;
        let now = Utc::now();
        let homework = Homework {
            id: Uuid::new_v4(),
            classroom_id: classroom.id,
            module_id: module.id,
            title,
            description,
            file: blob,
            due_date,
            submissions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        module.attach_homework(homework.id);
        module.touch();

        self.repo
            .commit(vec![Write::put(&homework)?, Write::put(&module)?])
            .await?;
        tracing::info!(module_id = %module.id, homework_id = %homework.id, "homework created");
        Ok(homework)
    }

    /// list_homework
    ///
    /// Owners see every submission; other participants only their own.
    pub async fn list_homework(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
    ) -> Result<Vec<Homework>, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::ReadHomework)?;

        let mut homework = self.repo.load_children::<Homework>(module.id).await?;
        if !classroom.is_owner(&actor) {
            for item in &mut homework {
                item.submissions.retain(|s| s.submitted_by == actor);
            }
        }
        Ok(homework)
    }

    /// update_homework
    ///
    /// Every field is optional. A replacement file is uploaded before anything else
    /// changes; if that upload fails the homework and its current blob are untouched.
    pub async fn update_homework(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        homework_id: &str,
        form: HomeworkForm,
        file: Option<FileUpload>,
    ) -> Result<Homework, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let homework_id = parse_id("homework_id", homework_id)?;
        let title = optional_text("title", form.title, MAX_LABEL_CHARS)?;
        let description = optional_text("description", form.description, MAX_DESCRIPTION_CHARS)?;
        let due_date = optional_text("due_date", form.due_date, MAX_LABEL_CHARS)?
            .map(|raw| parse_due_date(&raw))
            .transpose()?;
        let file = file.filter(|f| !f.bytes.is_empty());
        if title.is_none() && description.is_none() && due_date.is_none() && file.is_none() {
            return Err(ApiError::required("title, description, due_date or homeworkFile"));
        }

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        let mut homework = self.load_homework(&module, homework_id).await?;
        policy::authorize(&actor, &classroom, Action::UpdateHomework)?;

        let superseded = match file {
            Some(file) => {
                let blob = self.blobs.upload(file).await?;
                Some(std::mem::replace(&mut homework.file, blob))
            }
            None => None,
        };

        if let Some(title) = title {
            homework.title = title;
        }
        if let Some(description) = description {
            homework.description = description;
        }
        if let Some(due_date) = due_date {
            homework.due_date = due_date;
        }
        homework.updated_at = Utc::now();

        if let Some(old) = superseded {
            self.discard_blob(&old).await;
        }

        self.repo.save(&homework).await?;
        Ok(homework)
    }

    /// delete_homework
    ///
    /// Discards the homework file and every submission file, then removes the
    /// homework and its id on the module in one commit.
    pub async fn delete_homework(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        homework_id: &str,
    ) -> Result<(), ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let homework_id = parse_id("homework_id", homework_id)?;

        let (classroom, mut module) = self.load_classroom_module(classroom_id, module_id).await?;
        let homework = self.load_homework(&module, homework_id).await?;
        policy::authorize(&actor, &classroom, Action::DeleteHomework)?;

        module.detach_homework(&homework.id);
        module.touch();

        self.discard_blob(&homework.file).await;
        for submission in &homework.submissions {
            self.discard_blob(&submission.file).await;
        }

        self.repo
            .commit(vec![Write::delete::<Homework>(homework.id), Write::put(&module)?])
            .await?;
        Ok(())
    }

    pub async fn submit_homework(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        homework_id: &str,
        file: Option<FileUpload>,
    ) -> Result<Homework, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let homework_id = parse_id("homework_id", homework_id)?;
        let file = require_file("submissionFile", file)?;

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        let mut homework = self.load_homework(&module, homework_id).await?;
        policy::authorize(&actor, &classroom, Action::SubmitHomework)?;

        let blob = self.blobs.upload(file).await?;
        homework.submissions.push(Submission {
            id: Uuid::new_v4(),
            submitted_by: actor,
            file: blob,
            submitted_at: Utc::now(),
        });
        homework.updated_at = Utc::now();

        self.repo.save(&homework).await?;
        tracing::info!(homework_id = %homework.id, member = %actor, "homework submitted");
        Ok(homework)
    }

    // --- Lectures ---

    pub async fn create_lecture(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        req: LectureRequest,
    ) -> Result<Lecture, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let title = require_label("title", req.title)?;

        let (classroom, mut module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::CreateLecture)?;

        let lecture = Lecture {
            id: Uuid::new_v4(),
            classroom_id: classroom.id,
            module_id: module.id,
            title,
            video_ids: Vec::new(),
            created_at: Utc::now(),
        };
        module.attach_lecture(lecture.id);
        module.touch();

        self.repo
            .commit(vec![Write::put(&lecture)?, Write::put(&module)?])
            .await?;
        Ok(lecture)
    }

    pub async fn list_lectures(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
    ) -> Result<Vec<Lecture>, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        policy::authorize(&actor, &classroom, Action::ReadLecture)?;
        Ok(self.repo.load_children::<Lecture>(module.id).await?)
    }

    /// delete_lecture
    ///
    /// Like classrooms, lectures do not cascade: their videos stay in the store.
    pub async fn delete_lecture(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        lecture_id: &str,
    ) -> Result<(), ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let lecture_id = parse_id("lecture_id", lecture_id)?;

        let (classroom, mut module) = self.load_classroom_module(classroom_id, module_id).await?;
        let lecture = self.load_lecture(&module, lecture_id).await?;
        policy::authorize(&actor, &classroom, Action::DeleteLecture)?;

        if !lecture.video_ids.is_empty() {
            tracing::warn!(
                lecture_id = %lecture.id,
                orphaned_videos = lecture.video_ids.len(),
                "deleting lecture without cascading to its videos"
            );
        }
        module.detach_lecture(&lecture.id);
        module.touch();

        self.repo
            .commit(vec![Write::delete::<Lecture>(lecture.id), Write::put(&module)?])
            .await?;
        Ok(())
    }

    // --- Videos ---

    pub async fn add_video(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        lecture_id: &str,
        form: VideoForm,
        file: Option<FileUpload>,
    ) -> Result<Video, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let lecture_id = parse_id("lecture_id", lecture_id)?;
        let title = require_label("title", form.title)?;
        let file = require_file("videoFile", file)?;

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        let mut lecture = self.load_lecture(&module, lecture_id).await?;
        policy::authorize(&actor, &classroom, Action::AddVideo)?;

        let blob = self.blobs.upload(file).await?;
        let video = Video {
            id: Uuid::new_v4(),
            classroom_id: classroom.id,
            lecture_id: lecture.id,
            title,
            file: blob,
            created_at: Utc::now(),
        };
        lecture.attach_video(video.id);

        self.repo
            .commit(vec![Write::put(&video)?, Write::put(&lecture)?])
            .await?;
        Ok(video)
    }

    pub async fn list_videos(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        lecture_id: &str,
    ) -> Result<Vec<Video>, ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let lecture_id = parse_id("lecture_id", lecture_id)?;

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        let lecture = self.load_lecture(&module, lecture_id).await?;
        policy::authorize(&actor, &classroom, Action::ReadLecture)?;
        Ok(self.repo.load_children::<Video>(lecture.id).await?)
    }

    pub async fn delete_video(
        &self,
        actor: Identity,
        classroom_id: &str,
        module_id: &str,
        lecture_id: &str,
        video_id: &str,
    ) -> Result<(), ApiError> {
        let classroom_id = parse_id("classroom_id", classroom_id)?;
        let module_id = parse_id("module_id", module_id)?;
        let lecture_id = parse_id("lecture_id", lecture_id)?;
        let video_id = parse_id("video_id", video_id)?;

        let (classroom, module) = self.load_classroom_module(classroom_id, module_id).await?;
        let mut lecture = self.load_lecture(&module, lecture_id).await?;
        let video = self.load_video(&lecture, video_id).await?;
        policy::authorize(&actor, &classroom, Action::DeleteVideo)?;

        lecture.detach_video(&video.id);
        self.discard_blob(&video.file).await;

        self.repo
            .commit(vec![Write::delete::<Video>(video.id), Write::put(&lecture)?])
            .await?;
        Ok(())
    }

    // --- Profiles ---

    /// The actor's stored profile, or an empty one if no image was ever uploaded.
    pub async fn profile(&self, actor: Identity) -> Result<Profile, ApiError> {
        Ok(self
            .repo
            .load::<Profile>(actor.as_uuid())
            .await?
            .unwrap_or_else(|| Profile::empty(actor)))
    }

    /// update_profile_image
    ///
    /// Profiles belong to their identity, so no classroom policy applies. The new
    /// image is uploaded before the one it replaces is discarded.
    pub async fn update_profile_image(
        &self,
        actor: Identity,
        slot: ProfileImage,
        file: Option<FileUpload>,
    ) -> Result<Profile, ApiError> {
        let file = require_file(slot.field(), file)?;
        let mut profile = self.profile(actor).await?;

        let blob = self.blobs.upload(file).await?;
        if let Some(old) = profile.replace_image(slot, blob) {
            self.discard_blob(&old).await;
        }

        self.repo.save(&profile).await?;
        tracing::info!(user_id = %actor, image = slot.field(), "profile image updated");
        Ok(profile)
    }
}
