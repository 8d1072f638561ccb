use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResponse, ApiResult},
    gateway::MAX_LABEL_CHARS,
    models::{
        AccountDetails, ChangePasswordRequest, Classroom, ClassroomSummary,
        CreateClassroomRequest, Credentials, CurrentUser, FileUpload, Homework, HomeworkForm,
        Identity, JoinClassroomRequest, Lecture, LectureRequest, MemberRequest, Module,
        ModuleRequest, Profile, ProfileImage, RefreshTokenRequest, SearchQuery, TokenPair,
        UpdateAccountRequest, UpdateClassroomRequest, Video, VideoForm,
    },
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State, multipart::MultipartRejection, rejection::JsonRejection,
    },
    http::StatusCode,
};
use std::collections::HashMap;

// --- Request Body Helpers ---

/// Maps an extractor rejection onto the envelope: 413 for oversized bodies, 400 otherwise.
fn rejected(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(text)
    } else {
        ApiError::Validation(text)
    }
}

/// Unwraps a JSON body, turning axum's rejection into an enveloped error.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| rejected(rejection.status(), rejection.body_text()))
}

/// UploadForm
///
/// A fully buffered `multipart/form-data` body: plain text parts by name, and parts
/// carrying a filename as `FileUpload`s.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, FileUpload>,
}

impl UploadForm {
    pub async fn read(payload: Result<Multipart, MultipartRejection>) -> Result<Self, ApiError> {
        let mut multipart =
            payload.map_err(|rejection| rejected(rejection.status(), rejection.body_text()))?;
        let mut form = UploadForm::default();
        let malformed = |e: axum::extract::multipart::MultipartError| {
            rejected(
                e.status(),
                format!("malformed multipart body: {}", e.body_text()),
            )
        };

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.files.insert(
                        name,
                        FileUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    pub fn file(&mut self, name: &str) -> Option<FileUpload> {
        self.files.remove(name)
    }

    fn homework_form(&mut self) -> HomeworkForm {
        HomeworkForm {
            title: self.text("title"),
            description: self.text("description"),
            due_date: self.text("due_date"),
        }
    }
}

// --- User Handlers ---

fn require_credentials(credentials: &Credentials) -> Result<(), ApiError> {
    if credentials.email.trim().is_empty() {
        return Err(ApiError::required("email"));
    }
    if credentials.password.is_empty() {
        return Err(ApiError::required("password"));
    }
    Ok(())
}

/// register
///
/// [Public Route] Creates an account with the identity service.
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    request_body = Credentials,
    responses(
        (status = 201, description = "Registered", body = CurrentUser),
        (status = 400, description = "Missing or rejected credentials"),
        (status = 502, description = "Identity service unavailable")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<CurrentUser> {
    let credentials = json_body(payload)?;
    require_credentials(&credentials)?;

    let id = state.auth.register(&credentials).await?;
    tracing::info!(user_id = %id, "user registered");
    Ok(ApiResponse::created(
        CurrentUser { id },
        "User registered successfully",
    ))
}

/// login
///
/// [Public Route] Exchanges email/password for an access/refresh token pair.
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Logged in", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<TokenPair> {
    let credentials = json_body(payload)?;
    require_credentials(&credentials)?;

    let id = state.auth.authenticate(&credentials).await?;
    let tokens = state.auth.issue_tokens(&id)?;
    Ok(ApiResponse::ok(tokens, "User logged in successfully"))
}

/// refresh_token
#[utoipa::path(
    post,
    path = "/api/v1/users/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Refreshed", body = TokenPair),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> ApiResult<TokenPair> {
    let request = json_body(payload)?;
    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::required("refresh_token"));
    }
    let tokens = state.auth.refresh_tokens(request.refresh_token.trim())?;
    Ok(ApiResponse::ok(tokens, "Access token refreshed"))
}

/// current_user
///
/// [Authenticated Route] The caller's identity with any profile images.
#[utoipa::path(
    get,
    path = "/api/v1/users/current-user",
    responses((status = 200, description = "Current user", body = Profile))
)]
pub async fn current_user(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Profile> {
    let profile = state.gateway.profile(id).await?;
    Ok(ApiResponse::ok(profile, "Current user fetched"))
}

/// logout
///
/// [Authenticated Route] Revokes every token issued to the caller, on all devices.
#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(AuthUser { id }: AuthUser, State(state): State<AppState>) -> ApiResult<()> {
    state.auth.logout(&id);
    Ok(ApiResponse::ok((), "User logged out"))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Missing fields or wrong old password"),
        (status = 502, description = "Identity service unavailable")
    )
)]
pub async fn change_password(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let request = json_body(payload)?;
    let old_password = request
        .old_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::required("old_password"))?;
    let new_password = request
        .new_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::required("new_password"))?;
    if old_password == new_password {
        return Err(ApiError::Validation(
            "new_password must differ from old_password".to_string(),
        ));
    }

    state
        .auth
        .change_password(&id, &old_password, &new_password)
        .await?;
    Ok(ApiResponse::ok((), "Password changed successfully"))
}

/// update_account
///
/// [Authenticated Route] Partial update of the account held by the identity service.
#[utoipa::path(
    patch,
    path = "/api/v1/users/update-account",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = AccountDetails),
        (status = 400, description = "No field given or a field is invalid")
    )
)]
pub async fn update_account(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> ApiResult<AccountDetails> {
    let request = json_body(payload)?;
    let update = UpdateAccountRequest {
        email: request.email.map(|e| e.trim().to_string()),
        full_name: request.full_name.map(|n| n.trim().to_string()),
    };
    match (&update.email, &update.full_name) {
        (None, None) => return Err(ApiError::required("email or full_name")),
        (Some(email), _) if !email.contains('@') => return Err(ApiError::malformed("email")),
        (_, Some(name)) if name.is_empty() => return Err(ApiError::required("full_name")),
        (_, Some(name)) if name.chars().count() > MAX_LABEL_CHARS => {
            return Err(ApiError::too_long("full_name", MAX_LABEL_CHARS));
        }
        _ => {}
    }

    let account = state.auth.update_account(&id, &update).await?;
    Ok(ApiResponse::ok(account, "Account details updated"))
}

async fn replace_profile_image(
    id: Identity,
    state: AppState,
    slot: ProfileImage,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Profile> {
    let mut form = UploadForm::read(multipart).await?;
    let profile = state
        .gateway
        .update_profile_image(id, slot, form.file(slot.field()))
        .await?;
    Ok(ApiResponse::ok(profile, "Profile image updated"))
}

/// update_avatar
///
/// [Authenticated Route] Multipart upload; the file part is `avatar`.
#[utoipa::path(
    patch,
    path = "/api/v1/users/avatar",
    request_body(content = String, content_type = "multipart/form-data", description = "`avatar` part"),
    responses(
        (status = 200, description = "Avatar replaced", body = Profile),
        (status = 400, description = "File missing"),
        (status = 500, description = "Upload failed")
    )
)]
pub async fn update_avatar(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Profile> {
    replace_profile_image(id, state, ProfileImage::Avatar, multipart).await
}

/// update_cover_image
///
/// [Authenticated Route] Multipart upload; the file part is `coverImage`.
#[utoipa::path(
    patch,
    path = "/api/v1/users/cover-image",
    request_body(content = String, content_type = "multipart/form-data", description = "`coverImage` part"),
    responses(
        (status = 200, description = "Cover image replaced", body = Profile),
        (status = 400, description = "File missing"),
        (status = 500, description = "Upload failed")
    )
)]
pub async fn update_cover_image(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Profile> {
    replace_profile_image(id, state, ProfileImage::CoverImage, multipart).await
}

// --- Classroom Handlers ---

/// create_classroom
///
/// [Authenticated Route] The creator becomes the sole owner.
#[utoipa::path(
    post,
    path = "/api/v1/classrooms",
    request_body = CreateClassroomRequest,
    responses(
        (status = 201, description = "Created", body = Classroom),
        (status = 400, description = "Name missing")
    )
)]
pub async fn create_classroom(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateClassroomRequest>, JsonRejection>,
) -> ApiResult<Classroom> {
    let classroom = state.gateway.create_classroom(id, json_body(payload)?).await?;
    Ok(ApiResponse::created(classroom, "Classroom created successfully"))
}

/// list_classrooms
///
/// [Authenticated Route] Classrooms the caller owns or belongs to.
#[utoipa::path(
    get,
    path = "/api/v1/classrooms",
    responses((status = 200, description = "My classrooms", body = [Classroom]))
)]
pub async fn list_classrooms(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<Classroom>> {
    let classrooms = state.gateway.list_classrooms(id).await?;
    Ok(ApiResponse::ok(classrooms, "Classrooms fetched"))
}

#[utoipa::path(
    get,
    path = "/api/v1/classrooms/search",
    params(SearchQuery),
    responses((status = 200, description = "Matching classrooms", body = [ClassroomSummary]))
)]
pub async fn search_classrooms(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<ClassroomSummary>> {
    let found = state.gateway.search_classrooms(id, query.q).await?;
    Ok(ApiResponse::ok(found, "Classrooms fetched"))
}

/// join_classroom
///
/// [Authenticated Route] Idempotent; joining twice is not an error.
#[utoipa::path(
    post,
    path = "/api/v1/classrooms/join",
    request_body = JoinClassroomRequest,
    responses(
        (status = 200, description = "Joined", body = Classroom),
        (status = 404, description = "Classroom not found")
    )
)]
pub async fn join_classroom(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<JoinClassroomRequest>, JsonRejection>,
) -> ApiResult<Classroom> {
    let classroom = state.gateway.join_classroom(id, json_body(payload)?).await?;
    Ok(ApiResponse::ok(classroom, "Joined classroom"))
}

#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Found", body = Classroom),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_classroom(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
) -> ApiResult<Classroom> {
    let classroom = state.gateway.get_classroom(id, &classroom_id).await?;
    Ok(ApiResponse::ok(classroom, "Classroom fetched"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/classrooms/{classroom_id}",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    request_body = UpdateClassroomRequest,
    responses(
        (status = 200, description = "Updated", body = Classroom),
        (status = 403, description = "Not an owner")
    )
)]
pub async fn update_classroom(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
    payload: Result<Json<UpdateClassroomRequest>, JsonRejection>,
) -> ApiResult<Classroom> {
    let classroom = state
        .gateway
        .update_classroom(id, &classroom_id, json_body(payload)?)
        .await?;
    Ok(ApiResponse::ok(classroom, "Classroom updated"))
}

/// delete_classroom
///
/// [Authenticated Route] Owner only. Modules are not deleted with the classroom.
#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not an owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_classroom(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
) -> ApiResult<()> {
    state.gateway.delete_classroom(id, &classroom_id).await?;
    Ok(ApiResponse::ok((), "Classroom deleted"))
}

// --- Membership Handlers ---

#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/members",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    request_body = MemberRequest,
    responses((status = 200, description = "Member added", body = Classroom))
)]
pub async fn add_member(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
    payload: Result<Json<MemberRequest>, JsonRejection>,
) -> ApiResult<Classroom> {
    let classroom = state
        .gateway
        .add_member(id, &classroom_id, json_body(payload)?)
        .await?;
    Ok(ApiResponse::ok(classroom, "Member added"))
}

/// make_owner
///
/// [Authenticated Route] Promotes an existing participant to owner.
#[utoipa::path(
    patch,
    path = "/api/v1/classrooms/{classroom_id}/members",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    request_body = MemberRequest,
    responses(
        (status = 200, description = "Owner added", body = Classroom),
        (status = 404, description = "Target is not a participant")
    )
)]
pub async fn make_owner(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
    payload: Result<Json<MemberRequest>, JsonRejection>,
) -> ApiResult<Classroom> {
    let classroom = state
        .gateway
        .make_owner(id, &classroom_id, json_body(payload)?)
        .await?;
    Ok(ApiResponse::ok(classroom, "Owner added"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/members",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    request_body = MemberRequest,
    responses((status = 200, description = "Member removed", body = Classroom))
)]
pub async fn remove_member(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
    payload: Result<Json<MemberRequest>, JsonRejection>,
) -> ApiResult<Classroom> {
    let classroom = state
        .gateway
        .remove_member(id, &classroom_id, json_body(payload)?)
        .await?;
    Ok(ApiResponse::ok(classroom, "Member removed"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/leave",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Left classroom"),
        (status = 409, description = "Caller is the last owner")
    )
)]
pub async fn leave_classroom(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
) -> ApiResult<()> {
    state.gateway.leave_classroom(id, &classroom_id).await?;
    Ok(ApiResponse::ok((), "Left classroom"))
}

// --- Module & Note Handlers ---

#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/modules",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    request_body = ModuleRequest,
    responses(
        (status = 201, description = "Created", body = Module),
        (status = 403, description = "Not an owner")
    )
)]
pub async fn create_module(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
    payload: Result<Json<ModuleRequest>, JsonRejection>,
) -> ApiResult<Module> {
    let module = state
        .gateway
        .create_module(id, &classroom_id, json_body(payload)?)
        .await?;
    Ok(ApiResponse::created(module, "Module created successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}/modules",
    params(("classroom_id" = String, Path, description = "Classroom ID")),
    responses((status = 200, description = "Modules", body = [Module]))
)]
pub async fn list_modules(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
) -> ApiResult<Vec<Module>> {
    let modules = state.gateway.list_modules(id, &classroom_id).await?;
    Ok(ApiResponse::ok(modules, "Modules fetched"))
}

#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    responses((status = 200, description = "Module", body = Module))
)]
pub async fn get_module(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
) -> ApiResult<Module> {
    let module = state
        .gateway
        .get_module(id, &classroom_id, &module_id)
        .await?;
    Ok(ApiResponse::ok(module, "Module fetched"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    request_body = ModuleRequest,
    responses((status = 200, description = "Renamed", body = Module))
)]
pub async fn update_module(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
    payload: Result<Json<ModuleRequest>, JsonRejection>,
) -> ApiResult<Module> {
    let module = state
        .gateway
        .update_module(id, &classroom_id, &module_id, json_body(payload)?)
        .await?;
    Ok(ApiResponse::ok(module, "Module updated"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_module(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
) -> ApiResult<()> {
    state
        .gateway
        .delete_module(id, &classroom_id, &module_id)
        .await?;
    Ok(ApiResponse::ok((), "Module deleted"))
}

/// add_note
///
/// [Authenticated Route] Multipart upload; the file part is `noteFile`.
#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/notes",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "`noteFile` part"),
    responses(
        (status = 201, description = "Note added", body = Module),
        (status = 500, description = "Upload failed")
    )
)]
pub async fn add_note(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Module> {
    let mut form = UploadForm::read(multipart).await?;
    let module = state
        .gateway
        .add_note(id, &classroom_id, &module_id, form.file("noteFile"))
        .await?;
    Ok(ApiResponse::created(module, "Note added"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/notes/{note_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("note_id" = String, Path, description = "Note ID")
    ),
    responses((status = 200, description = "Note deleted"))
)]
pub async fn delete_note(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, note_id)): Path<(String, String, String)>,
) -> ApiResult<()> {
    state
        .gateway
        .delete_note(id, &classroom_id, &module_id, &note_id)
        .await?;
    Ok(ApiResponse::ok((), "Note deleted"))
}

// --- Homework Handlers ---

/// create_homework
///
/// [Authenticated Route] Multipart with `title`, `description`, `due_date` (RFC 3339)
/// and the `homeworkFile` part.
#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/homework",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    request_body(content = HomeworkForm, content_type = "multipart/form-data"),
    responses((status = 201, description = "Created", body = Homework))
)]
pub async fn create_homework(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Homework> {
    let mut form = UploadForm::read(multipart).await?;
    let fields = form.homework_form();
    let homework = state
        .gateway
        .create_homework(id, &classroom_id, &module_id, fields, form.file("homeworkFile"))
        .await?;
    Ok(ApiResponse::created(homework, "Homework created successfully"))
}

/// list_homework
///
/// [Authenticated Route] Non-owners only see their own submissions.
#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/homework",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    responses((status = 200, description = "Homework", body = [Homework]))
)]
pub async fn list_homework(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
) -> ApiResult<Vec<Homework>> {
    let homework = state
        .gateway
        .list_homework(id, &classroom_id, &module_id)
        .await?;
    Ok(ApiResponse::ok(homework, "Homework fetched"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/homework/{homework_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("homework_id" = String, Path, description = "Homework ID")
    ),
    request_body(content = HomeworkForm, content_type = "multipart/form-data"),
    responses((status = 200, description = "Updated", body = Homework))
)]
pub async fn update_homework(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, homework_id)): Path<(String, String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Homework> {
    let mut form = UploadForm::read(multipart).await?;
    let fields = form.homework_form();
    let homework = state
        .gateway
        .update_homework(
            id,
            &classroom_id,
            &module_id,
            &homework_id,
            fields,
            form.file("homeworkFile"),
        )
        .await?;
    Ok(ApiResponse::ok(homework, "Homework updated"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/homework/{homework_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("homework_id" = String, Path, description = "Homework ID")
    ),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_homework(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, homework_id)): Path<(String, String, String)>,
) -> ApiResult<()> {
    state
        .gateway
        .delete_homework(id, &classroom_id, &module_id, &homework_id)
        .await?;
    Ok(ApiResponse::ok((), "Homework deleted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/homework/{homework_id}/submissions",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("homework_id" = String, Path, description = "Homework ID")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "`submissionFile` part"),
    responses((status = 201, description = "Submitted", body = Homework))
)]
pub async fn submit_homework(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, homework_id)): Path<(String, String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Homework> {
    let mut form = UploadForm::read(multipart).await?;
    let homework = state
        .gateway
        .submit_homework(
            id,
            &classroom_id,
            &module_id,
            &homework_id,
            form.file("submissionFile"),
        )
        .await?;
    Ok(ApiResponse::created(homework, "Homework submitted"))
}

// --- Lecture & Video Handlers ---

#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/lectures",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    request_body = LectureRequest,
    responses((status = 201, description = "Created", body = Lecture))
)]
pub async fn create_lecture(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
    payload: Result<Json<LectureRequest>, JsonRejection>,
) -> ApiResult<Lecture> {
    let lecture = state
        .gateway
        .create_lecture(id, &classroom_id, &module_id, json_body(payload)?)
        .await?;
    Ok(ApiResponse::created(lecture, "Lecture created successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/lectures",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID")
    ),
    responses((status = 200, description = "Lectures", body = [Lecture]))
)]
pub async fn list_lectures(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id)): Path<(String, String)>,
) -> ApiResult<Vec<Lecture>> {
    let lectures = state
        .gateway
        .list_lectures(id, &classroom_id, &module_id)
        .await?;
    Ok(ApiResponse::ok(lectures, "Lectures fetched"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/lectures/{lecture_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("lecture_id" = String, Path, description = "Lecture ID")
    ),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_lecture(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, lecture_id)): Path<(String, String, String)>,
) -> ApiResult<()> {
    state
        .gateway
        .delete_lecture(id, &classroom_id, &module_id, &lecture_id)
        .await?;
    Ok(ApiResponse::ok((), "Lecture deleted"))
}

/// add_video
///
/// [Authenticated Route] Multipart with `title` and the `videoFile` part.
#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/lectures/{lecture_id}/videos",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("lecture_id" = String, Path, description = "Lecture ID")
    ),
    request_body(content = VideoForm, content_type = "multipart/form-data"),
    responses((status = 201, description = "Uploaded", body = Video))
)]
pub async fn add_video(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, lecture_id)): Path<(String, String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Video> {
    let mut form = UploadForm::read(multipart).await?;
    let fields = VideoForm {
        title: form.text("title"),
    };
    let video = state
        .gateway
        .add_video(
            id,
            &classroom_id,
            &module_id,
            &lecture_id,
            fields,
            form.file("videoFile"),
        )
        .await?;
    Ok(ApiResponse::created(video, "Video uploaded"))
}

#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/lectures/{lecture_id}/videos",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("lecture_id" = String, Path, description = "Lecture ID")
    ),
    responses((status = 200, description = "Videos", body = [Video]))
)]
pub async fn list_videos(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, lecture_id)): Path<(String, String, String)>,
) -> ApiResult<Vec<Video>> {
    let videos = state
        .gateway
        .list_videos(id, &classroom_id, &module_id, &lecture_id)
        .await?;
    Ok(ApiResponse::ok(videos, "Videos fetched"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/modules/{module_id}/lectures/{lecture_id}/videos/{video_id}",
    params(
        ("classroom_id" = String, Path, description = "Classroom ID"),
        ("module_id" = String, Path, description = "Module ID"),
        ("lecture_id" = String, Path, description = "Lecture ID"),
        ("video_id" = String, Path, description = "Video ID")
    ),
    responses((status = 200, description = "Deleted"))
)]
pub async fn delete_video(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Path((classroom_id, module_id, lecture_id, video_id)): Path<(String, String, String, String)>,
) -> ApiResult<()> {
    state
        .gateway
        .delete_video(id, &classroom_id, &module_id, &lecture_id, &video_id)
        .await?;
    Ok(ApiResponse::ok((), "Video deleted"))
}
