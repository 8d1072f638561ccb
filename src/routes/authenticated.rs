use crate::{
    AppState, MAX_DOCUMENT_UPLOAD_BYTES, MAX_IMAGE_UPLOAD_BYTES, MAX_VIDEO_UPLOAD_BYTES,
    handlers,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `AuthUser` middleware, so handlers always receive
/// a resolved `Identity`. Whether that identity may touch a given classroom is decided
/// by the gateway on the freshly loaded classroom.
///
/// Multipart routes carry their own `DefaultBodyLimit`; everything else keeps the
/// small router-wide limit.
pub fn authenticated_routes() -> Router<AppState> {
    let documents = DefaultBodyLimit::max(MAX_DOCUMENT_UPLOAD_BYTES);
    let images = DefaultBodyLimit::max(MAX_IMAGE_UPLOAD_BYTES);

    Router::<AppState>::new()
        // --- Account ---
        // GET /users/current-user
        // Identity plus profile images.
        .route("/users/current-user", get(handlers::current_user))
        // POST /users/logout
        // Revokes every outstanding access and refresh token of the caller.
        .route("/users/logout", post(handlers::logout))
        .route("/users/change-password", post(handlers::change_password))
        .route("/users/update-account", patch(handlers::update_account))
        // Multipart, file parts `avatar` and `coverImage`.
        .route(
            "/users/avatar",
            patch(handlers::update_avatar).layer(images),
        )
        .route(
            "/users/cover-image",
            patch(handlers::update_cover_image).layer(images),
        )
        // --- Classrooms ---
        // POST/GET /classrooms
        // Create (caller becomes the owner) or list the caller's classrooms.
        .route(
            "/classrooms",
            post(handlers::create_classroom).get(handlers::list_classrooms),
        )
        // GET /classrooms/search?q=
        // Name search across all classrooms; returns summaries without membership lists.
        .route("/classrooms/search", get(handlers::search_classrooms))
        // POST /classrooms/join
        // Idempotent self-enrollment as a member.
        .route("/classrooms/join", post(handlers::join_classroom))
        .route(
            "/classrooms/{classroom_id}",
            get(handlers::get_classroom)
                .patch(handlers::update_classroom)
                .delete(handlers::delete_classroom),
        )
        // --- Membership ---
        // POST adds a member, PATCH promotes a participant to owner, DELETE removes a member.
        .route(
            "/classrooms/{classroom_id}/members",
            post(handlers::add_member)
                .patch(handlers::make_owner)
                .delete(handlers::remove_member),
        )
        // DELETE /classrooms/{classroom_id}/leave
        // The last owner gets 409.
        .route(
            "/classrooms/{classroom_id}/leave",
            delete(handlers::leave_classroom),
        )
        // --- Modules & Notes ---
        .route(
            "/classrooms/{classroom_id}/modules",
            post(handlers::create_module).get(handlers::list_modules),
        )
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}",
            get(handlers::get_module)
                .patch(handlers::update_module)
                .delete(handlers::delete_module),
        )
        // Multipart, file part `noteFile`.
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/notes",
            post(handlers::add_note).layer(documents),
        )
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/notes/{note_id}",
            delete(handlers::delete_note),
        )
        // --- Homework ---
        // Multipart, file part `homeworkFile`.
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/homework",
            post(handlers::create_homework)
                .get(handlers::list_homework)
                .layer(documents),
        )
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/homework/{homework_id}",
            patch(handlers::update_homework)
                .delete(handlers::delete_homework)
                .layer(documents),
        )
        // Multipart, file part `submissionFile`.
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/homework/{homework_id}/submissions",
            post(handlers::submit_homework).layer(documents),
        )
        // --- Lectures & Videos ---
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/lectures",
            post(handlers::create_lecture).get(handlers::list_lectures),
        )
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/lectures/{lecture_id}",
            delete(handlers::delete_lecture),
        )
        // Multipart, file part `videoFile`.
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/lectures/{lecture_id}/videos",
            post(handlers::add_video)
                .get(handlers::list_videos)
                .layer(DefaultBodyLimit::max(MAX_VIDEO_UPLOAD_BYTES)),
        )
        .route(
            "/classrooms/{classroom_id}/modules/{module_id}/lectures/{lecture_id}/videos/{video_id}",
            delete(handlers::delete_video),
        )
}
