use classroom_api::{
    ResourceGateway,
    error::{ApiError, ResourceKind},
    gateway::MAX_LABEL_CHARS,
    models::{
        CreateClassroomRequest, FileUpload, HomeworkForm, Identity, JoinClassroomRequest,
        LectureRequest, MemberRequest, ModuleRequest, ProfileImage, UpdateClassroomRequest,
        VideoForm,
    },
    policy::DenyReason,
    repository::{Collection, InMemoryRepository, RepositoryState},
    storage::{MockBlobStore, StorageState},
};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Harness ---

struct Harness {
    gateway: ResourceGateway,
    repo: Arc<InMemoryRepository>,
    blobs: Arc<MockBlobStore>,
}

fn harness() -> Harness {
    let repo = Arc::new(InMemoryRepository::new());
    let blobs = Arc::new(MockBlobStore::new());
    let gateway = ResourceGateway::new(
        repo.clone() as RepositoryState,
        blobs.clone() as StorageState,
    );
    Harness {
        gateway,
        repo,
        blobs,
    }
}

fn user() -> Identity {
    Identity::new(Uuid::new_v4())
}

fn pdf(name: &str) -> FileUpload {
    FileUpload {
        file_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.7 test".to_vec(),
    }
}

fn member(target: Identity) -> MemberRequest {
    MemberRequest {
        user_id: Some(target.to_string()),
    }
}

fn homework_form(title: &str) -> HomeworkForm {
    HomeworkForm {
        title: Some(title.to_string()),
        description: Some("Chapter 3 exercises".to_string()),
        due_date: Some("2026-12-01T09:00:00Z".to_string()),
    }
}

impl Harness {
    async fn classroom(&self, owner: Identity, name: &str) -> String {
        self.gateway
            .create_classroom(
                owner,
                CreateClassroomRequest {
                    name: Some(name.to_string()),
                    description: None,
                },
            )
            .await
            .unwrap()
            .id
            .to_string()
    }

    async fn module(&self, owner: Identity, classroom_id: &str, name: &str) -> String {
        self.gateway
            .create_module(
                owner,
                classroom_id,
                ModuleRequest {
                    name: Some(name.to_string()),
                },
            )
            .await
            .unwrap()
            .id
            .to_string()
    }

    async fn join(&self, actor: Identity, classroom_id: &str) {
        self.gateway
            .join_classroom(
                actor,
                JoinClassroomRequest {
                    classroom_id: Some(classroom_id.to_string()),
                },
            )
            .await
            .unwrap();
    }
}

// --- Membership ---

#[tokio::test]
async fn test_member_becomes_owner_and_gains_owner_actions() {
    let h = harness();
    let alice = user();
    let bob = user();

    let algebra = h.classroom(alice, "Algebra").await;
    h.join(bob, &algebra).await;

    let denied = h
        .gateway
        .create_module(
            bob,
            &algebra,
            ModuleRequest {
                name: Some("M1".into()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(denied, ApiError::Forbidden(DenyReason::NotOwner)));

    let classroom = h
        .gateway
        .make_owner(alice, &algebra, member(bob))
        .await
        .unwrap();
    assert!(classroom.is_owner(&bob));

    let module_id = h.module(bob, &algebra, "M1").await;
    let classroom = h.gateway.get_classroom(alice, &algebra).await.unwrap();
    assert_eq!(classroom.module_ids.len(), 1);
    assert_eq!(classroom.module_ids[0].to_string(), module_id);
}

#[tokio::test]
async fn test_join_is_idempotent_and_leave_restores_members() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "History").await;

    let before = h.gateway.get_classroom(owner, &classroom_id).await.unwrap();

    h.join(student, &classroom_id).await;
    h.join(student, &classroom_id).await;
    let joined = h.gateway.get_classroom(student, &classroom_id).await.unwrap();
    assert_eq!(joined.member_ids, vec![student]);

    // The owner joining does not add a member entry either.
    h.join(owner, &classroom_id).await;

    h.gateway
        .leave_classroom(student, &classroom_id)
        .await
        .unwrap();
    let after = h.gateway.get_classroom(owner, &classroom_id).await.unwrap();
    assert_eq!(after.member_ids, before.member_ids);
    assert_eq!(after.owner_ids, before.owner_ids);
}

#[tokio::test]
async fn test_join_reports_missing_and_unknown_classrooms() {
    let h = harness();
    let student = user();

    let missing = h
        .gateway
        .join_classroom(student, JoinClassroomRequest { classroom_id: None })
        .await
        .unwrap_err();
    assert_eq!(missing.to_string(), "classroom_id is required");

    let unknown = h
        .gateway
        .join_classroom(
            student,
            JoinClassroomRequest {
                classroom_id: Some(Uuid::new_v4().to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(unknown, ApiError::NotFound(ResourceKind::Classroom)));
}

#[tokio::test]
async fn test_last_owner_cannot_leave() {
    let h = harness();
    let alice = user();
    let bob = user();
    let classroom_id = h.classroom(alice, "Physics").await;

    let err = h
        .gateway
        .leave_classroom(alice, &classroom_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(err.status().as_u16(), 409);

    h.join(bob, &classroom_id).await;
    h.gateway
        .make_owner(alice, &classroom_id, member(bob))
        .await
        .unwrap();
    h.gateway
        .leave_classroom(alice, &classroom_id)
        .await
        .unwrap();

    let classroom = h.gateway.get_classroom(bob, &classroom_id).await.unwrap();
    assert_eq!(classroom.owner_ids, vec![bob]);
    assert!(!classroom.is_participant(&alice));
}

#[tokio::test]
async fn test_membership_changes_on_unknown_targets() {
    let h = harness();
    let owner = user();
    let stranger = user();
    let classroom_id = h.classroom(owner, "Biology").await;

    let promote = h
        .gateway
        .make_owner(owner, &classroom_id, member(stranger))
        .await
        .unwrap_err();
    assert!(matches!(promote, ApiError::NotFound(ResourceKind::Member)));

    let remove = h
        .gateway
        .remove_member(owner, &classroom_id, member(stranger))
        .await
        .unwrap_err();
    assert!(matches!(remove, ApiError::NotFound(ResourceKind::Member)));

    let malformed = h
        .gateway
        .add_member(
            owner,
            &classroom_id,
            MemberRequest {
                user_id: Some("bob".into()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(malformed.to_string(), "user_id is malformed");
}

#[tokio::test]
async fn test_add_member_twice_keeps_one_entry() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Chemistry").await;

    h.gateway
        .add_member(owner, &classroom_id, member(student))
        .await
        .unwrap();
    let classroom = h
        .gateway
        .add_member(owner, &classroom_id, member(student))
        .await
        .unwrap();
    assert_eq!(classroom.member_ids, vec![student]);

    let classroom = h
        .gateway
        .remove_member(owner, &classroom_id, member(student))
        .await
        .unwrap();
    assert!(classroom.member_ids.is_empty());
}

#[tokio::test]
async fn test_members_cannot_manage_membership() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Art").await;
    h.join(student, &classroom_id).await;

    let err = h
        .gateway
        .add_member(student, &classroom_id, member(user()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(DenyReason::NotOwner)));
}

// --- Classrooms ---

#[tokio::test]
async fn test_outsider_cannot_read_classroom() {
    let h = harness();
    let classroom_id = h.classroom(user(), "Private").await;

    let err = h
        .gateway
        .get_classroom(user(), &classroom_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(DenyReason::NotMember)));
}

#[tokio::test]
async fn test_create_classroom_requires_name() {
    let h = harness();
    let err = h
        .gateway
        .create_classroom(
            user(),
            CreateClassroomRequest {
                name: Some("   ".into()),
                description: Some("blank name".into()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "name is required");
    assert_eq!(h.repo.count(Collection::Classrooms).await, 0);
}

#[tokio::test]
async fn test_oversized_names_and_titles_are_rejected() {
    let h = harness();
    let owner = user();
    let long = "a".repeat(MAX_LABEL_CHARS + 1);

    let err = h
        .gateway
        .create_classroom(
            owner,
            CreateClassroomRequest {
                name: Some(long.clone()),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(h.repo.count(Collection::Classrooms).await, 0);

    let classroom_id = h.classroom(owner, "Bounded").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    let err = h
        .gateway
        .create_lecture(
            owner,
            &classroom_id,
            &module_id,
            LectureRequest {
                title: Some(long),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("title must be at most {MAX_LABEL_CHARS} characters")
    );
}

#[tokio::test]
async fn test_update_classroom_is_partial() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Old name").await;

    let updated = h
        .gateway
        .update_classroom(
            owner,
            &classroom_id,
            UpdateClassroomRequest {
                name: None,
                description: Some("Tuesdays".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Old name");
    assert_eq!(updated.description.as_deref(), Some("Tuesdays"));

    let empty = h
        .gateway
        .update_classroom(owner, &classroom_id, UpdateClassroomRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(empty, ApiError::Validation(_)));
}

#[tokio::test]
async fn test_list_and_search_classrooms() {
    let h = harness();
    let alice = user();
    let bob = user();
    let algebra = h.classroom(alice, "Linear Algebra").await;
    h.classroom(bob, "Algebraic Topology").await;
    h.classroom(bob, "Poetry").await;

    let mine = h.gateway.list_classrooms(alice).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id.to_string(), algebra);

    let found = h
        .gateway
        .search_classrooms(alice, Some("algebra".into()))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|c| c.name.to_lowercase().contains("algebra")));

    let missing = h.gateway.search_classrooms(alice, None).await.unwrap_err();
    assert_eq!(missing.to_string(), "q is required");
}

#[tokio::test]
async fn test_deleting_classroom_leaves_modules_and_homework_in_store() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Doomed").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    h.gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            homework_form("HW1"),
            Some(pdf("hw1.pdf")),
        )
        .await
        .unwrap();

    h.gateway
        .delete_classroom(owner, &classroom_id)
        .await
        .unwrap();

    assert_eq!(h.repo.count(Collection::Classrooms).await, 0);
    // Deletion does not cascade.
    assert_eq!(h.repo.count(Collection::Modules).await, 1);
    assert_eq!(h.repo.count(Collection::Homework).await, 1);
    assert_eq!(h.blobs.len().await, 1);

    let gone = h
        .gateway
        .get_module(owner, &classroom_id, &module_id)
        .await
        .unwrap_err();
    assert!(matches!(gone, ApiError::NotFound(ResourceKind::Classroom)));
}

// --- Modules & Notes ---

#[tokio::test]
async fn test_create_then_delete_module() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Geometry").await;
    let module_id = h.module(owner, &classroom_id, "Triangles").await;
    assert_eq!(h.repo.count(Collection::Modules).await, 1);

    h.gateway
        .delete_module(owner, &classroom_id, &module_id)
        .await
        .unwrap();

    let classroom = h.gateway.get_classroom(owner, &classroom_id).await.unwrap();
    assert!(classroom.module_ids.is_empty());
    assert_eq!(h.repo.count(Collection::Modules).await, 0);

    let err = h
        .gateway
        .get_module(owner, &classroom_id, &module_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(ResourceKind::Module)));
}

#[tokio::test]
async fn test_module_must_belong_to_classroom_in_path() {
    let h = harness();
    let owner = user();
    let first = h.classroom(owner, "First").await;
    let second = h.classroom(owner, "Second").await;
    let module_id = h.module(owner, &first, "Only in first").await;

    let err = h
        .gateway
        .get_module(owner, &second, &module_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(ResourceKind::Module)));
}

#[tokio::test]
async fn test_notes_upload_and_delete_blobs() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Notes").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;

    let module = h
        .gateway
        .add_note(owner, &classroom_id, &module_id, Some(pdf("intro.pdf")))
        .await
        .unwrap();
    let note = module.notes[0].clone();
    assert!(h.blobs.contains(&note.file.storage_id).await);

    h.gateway
        .delete_note(owner, &classroom_id, &module_id, &note.id.to_string())
        .await
        .unwrap();
    assert!(!h.blobs.contains(&note.file.storage_id).await);

    let module = h
        .gateway
        .get_module(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert!(module.notes.is_empty());

    let again = h
        .gateway
        .delete_note(owner, &classroom_id, &module_id, &note.id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(again, ApiError::NotFound(ResourceKind::Note)));
}

#[tokio::test]
async fn test_add_note_requires_file_and_owner() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Notes").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    h.join(student, &classroom_id).await;

    let missing = h
        .gateway
        .add_note(owner, &classroom_id, &module_id, None)
        .await
        .unwrap_err();
    assert_eq!(missing.to_string(), "noteFile is required");

    let forbidden = h
        .gateway
        .add_note(student, &classroom_id, &module_id, Some(pdf("x.pdf")))
        .await
        .unwrap_err();
    assert!(matches!(forbidden, ApiError::Forbidden(_)));
    // Nothing reaches blob storage before authorization succeeds.
    assert!(h.blobs.is_empty().await);
}

#[tokio::test]
async fn test_delete_module_discards_note_blobs() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Cleanup").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    for name in ["a.pdf", "b.pdf"] {
        h.gateway
            .add_note(owner, &classroom_id, &module_id, Some(pdf(name)))
            .await
            .unwrap();
    }
    assert_eq!(h.blobs.len().await, 2);

    h.gateway
        .delete_module(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert!(h.blobs.is_empty().await);
}

// --- Homework ---

#[tokio::test]
async fn test_homework_replacement_upload_failure_keeps_old_blob() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Calculus").await;
    let module_id = h.module(owner, &classroom_id, "Limits").await;
    let homework = h
        .gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            homework_form("HW1"),
            Some(pdf("v1.pdf")),
        )
        .await
        .unwrap();
    let homework_id = homework.id.to_string();

    h.blobs.set_fail_uploads(true);
    let err = h
        .gateway
        .update_homework(
            owner,
            &classroom_id,
            &module_id,
            &homework_id,
            HomeworkForm {
                title: Some("HW1 revised".into()),
                ..HomeworkForm::default()
            },
            Some(pdf("v2.pdf")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Upload(_)));
    assert_eq!(err.status().as_u16(), 500);

    assert!(h.blobs.contains(&homework.file.storage_id).await);
    let stored = h
        .gateway
        .list_homework(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert_eq!(stored[0].title, "HW1");
    assert_eq!(stored[0].file, homework.file);

    h.blobs.set_fail_uploads(false);
    let replaced = h
        .gateway
        .update_homework(
            owner,
            &classroom_id,
            &module_id,
            &homework_id,
            HomeworkForm::default(),
            Some(pdf("v2.pdf")),
        )
        .await
        .unwrap();
    assert_ne!(replaced.file, homework.file);
    assert!(!h.blobs.contains(&homework.file.storage_id).await);
    assert!(h.blobs.contains(&replaced.file.storage_id).await);
}

#[tokio::test]
async fn test_update_homework_needs_at_least_one_change() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Calculus").await;
    let module_id = h.module(owner, &classroom_id, "Limits").await;
    let homework = h
        .gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            homework_form("HW1"),
            Some(pdf("v1.pdf")),
        )
        .await
        .unwrap();

    let err = h
        .gateway
        .update_homework(
            owner,
            &classroom_id,
            &module_id,
            &homework.id.to_string(),
            HomeworkForm::default(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let bad_date = h
        .gateway
        .update_homework(
            owner,
            &classroom_id,
            &module_id,
            &homework.id.to_string(),
            HomeworkForm {
                due_date: Some("tomorrow".into()),
                ..HomeworkForm::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(bad_date.to_string(), "due_date is malformed");
}

#[tokio::test]
async fn test_create_homework_reports_first_missing_field() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Calculus").await;
    let module_id = h.module(owner, &classroom_id, "Limits").await;

    let err = h
        .gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            HomeworkForm {
                title: Some("HW".into()),
                description: None,
                due_date: None,
            },
            Some(pdf("hw.pdf")),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "description is required");

    let no_file = h
        .gateway
        .create_homework(owner, &classroom_id, &module_id, homework_form("HW"), None)
        .await
        .unwrap_err();
    assert_eq!(no_file.to_string(), "homeworkFile is required");
    assert_eq!(h.repo.count(Collection::Homework).await, 0);
}

#[tokio::test]
async fn test_students_only_see_their_own_submissions() {
    let h = harness();
    let owner = user();
    let ann = user();
    let ben = user();
    let classroom_id = h.classroom(owner, "Essays").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    h.join(ann, &classroom_id).await;
    h.join(ben, &classroom_id).await;

    let homework_id = h
        .gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            homework_form("Essay"),
            Some(pdf("prompt.pdf")),
        )
        .await
        .unwrap()
        .id
        .to_string();

    for (student, file) in [(ann, "ann.pdf"), (ben, "ben.pdf")] {
        h.gateway
            .submit_homework(student, &classroom_id, &module_id, &homework_id, Some(pdf(file)))
            .await
            .unwrap();
    }

    let as_ann = h
        .gateway
        .list_homework(ann, &classroom_id, &module_id)
        .await
        .unwrap();
    assert_eq!(as_ann[0].submissions.len(), 1);
    assert_eq!(as_ann[0].submissions[0].submitted_by, ann);

    let as_owner = h
        .gateway
        .list_homework(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert_eq!(as_owner[0].submissions.len(), 2);
}

#[tokio::test]
async fn test_delete_homework_discards_submission_blobs() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Essays").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    h.join(student, &classroom_id).await;
    let homework_id = h
        .gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            homework_form("Essay"),
            Some(pdf("prompt.pdf")),
        )
        .await
        .unwrap()
        .id
        .to_string();
    h.gateway
        .submit_homework(student, &classroom_id, &module_id, &homework_id, Some(pdf("s.pdf")))
        .await
        .unwrap();
    assert_eq!(h.blobs.len().await, 2);

    h.gateway
        .delete_homework(owner, &classroom_id, &module_id, &homework_id)
        .await
        .unwrap();

    assert!(h.blobs.is_empty().await);
    assert_eq!(h.repo.count(Collection::Homework).await, 0);
    let module = h
        .gateway
        .get_module(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert!(module.homework_ids.is_empty());
}

#[tokio::test]
async fn test_blob_delete_failure_does_not_fail_the_request() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Flaky storage").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    let module = h
        .gateway
        .add_note(owner, &classroom_id, &module_id, Some(pdf("n.pdf")))
        .await
        .unwrap();

    h.blobs.set_fail_deletes(true);
    h.gateway
        .delete_note(owner, &classroom_id, &module_id, &module.notes[0].id.to_string())
        .await
        .unwrap();

    let module = h
        .gateway
        .get_module(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert!(module.notes.is_empty());
}

// --- Authorization Before Blob Deletion ---

#[tokio::test]
async fn test_member_cannot_delete_note_or_its_blob() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Notes").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    h.join(student, &classroom_id).await;

    let module = h
        .gateway
        .add_note(owner, &classroom_id, &module_id, Some(pdf("slides.pdf")))
        .await
        .unwrap();
    let note = module.notes[0].clone();

    let err = h
        .gateway
        .delete_note(student, &classroom_id, &module_id, &note.id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(DenyReason::NotOwner)));

    assert!(h.blobs.contains(&note.file.storage_id).await);
    let stored = h
        .gateway
        .get_module(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert_eq!(stored.notes.len(), 1);
    assert_eq!(stored.notes[0].file, note.file);
}

#[tokio::test]
async fn test_member_cannot_delete_homework_or_its_blobs() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Physics").await;
    let module_id = h.module(owner, &classroom_id, "Optics").await;
    h.join(student, &classroom_id).await;

    let homework = h
        .gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            homework_form("Lenses"),
            Some(pdf("lenses.pdf")),
        )
        .await
        .unwrap();
    let homework_id = homework.id.to_string();
    let submitted = h
        .gateway
        .submit_homework(
            student,
            &classroom_id,
            &module_id,
            &homework_id,
            Some(pdf("answers.pdf")),
        )
        .await
        .unwrap();
    let submission_blob = submitted.submissions[0].file.clone();

    let err = h
        .gateway
        .delete_homework(student, &classroom_id, &module_id, &homework_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(DenyReason::NotOwner)));

    assert!(h.blobs.contains(&homework.file.storage_id).await);
    assert!(h.blobs.contains(&submission_blob.storage_id).await);
    assert_eq!(h.repo.count(Collection::Homework).await, 1);
    let module = h
        .gateway
        .get_module(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert_eq!(module.homework_ids, vec![homework.id]);
}

#[tokio::test]
async fn test_member_cannot_replace_homework_file() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Chemistry").await;
    let module_id = h.module(owner, &classroom_id, "Bonds").await;
    h.join(student, &classroom_id).await;

    let homework = h
        .gateway
        .create_homework(
            owner,
            &classroom_id,
            &module_id,
            homework_form("Covalent"),
            Some(pdf("v1.pdf")),
        )
        .await
        .unwrap();

    let err = h
        .gateway
        .update_homework(
            student,
            &classroom_id,
            &module_id,
            &homework.id.to_string(),
            HomeworkForm {
                title: Some("Hijacked".into()),
                ..HomeworkForm::default()
            },
            Some(pdf("v2.pdf")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(DenyReason::NotOwner)));

    // The replacement was never uploaded and the original is still in place.
    assert_eq!(h.blobs.len().await, 1);
    assert!(h.blobs.contains(&homework.file.storage_id).await);
    let stored = h
        .gateway
        .list_homework(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert_eq!(stored[0].title, "Covalent");
    assert_eq!(stored[0].file, homework.file);
}

// --- Profiles ---

fn png(name: &str) -> FileUpload {
    FileUpload {
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: b"\x89PNG test".to_vec(),
    }
}

#[tokio::test]
async fn test_profile_starts_empty() {
    let h = harness();
    let alice = user();
    let profile = h.gateway.profile(alice).await.unwrap();
    assert_eq!(profile.id, alice);
    assert!(profile.avatar.is_none());
    assert!(profile.cover_image.is_none());
    assert_eq!(h.repo.count(Collection::Profiles).await, 0);
}

#[tokio::test]
async fn test_replacing_avatar_discards_previous_blob() {
    let h = harness();
    let alice = user();

    let first = h
        .gateway
        .update_profile_image(alice, ProfileImage::Avatar, Some(png("me.png")))
        .await
        .unwrap();
    let first_avatar = first.avatar.clone().unwrap();

    let second = h
        .gateway
        .update_profile_image(alice, ProfileImage::Avatar, Some(png("me2.png")))
        .await
        .unwrap();
    let second_avatar = second.avatar.clone().unwrap();

    assert!(!h.blobs.contains(&first_avatar.storage_id).await);
    assert!(h.blobs.contains(&second_avatar.storage_id).await);
    assert!(second.cover_image.is_none());

    let cover = h
        .gateway
        .update_profile_image(alice, ProfileImage::CoverImage, Some(png("banner.png")))
        .await
        .unwrap();
    assert_eq!(cover.avatar, Some(second_avatar));
    assert!(cover.cover_image.is_some());
    assert_eq!(h.blobs.len().await, 2);
    assert_eq!(h.repo.count(Collection::Profiles).await, 1);
}

#[tokio::test]
async fn test_failed_avatar_upload_keeps_current_avatar() {
    let h = harness();
    let alice = user();
    let current = h
        .gateway
        .update_profile_image(alice, ProfileImage::Avatar, Some(png("me.png")))
        .await
        .unwrap()
        .avatar
        .unwrap();

    let missing = h
        .gateway
        .update_profile_image(alice, ProfileImage::Avatar, None)
        .await
        .unwrap_err();
    assert_eq!(missing.to_string(), "avatar is required");

    h.blobs.set_fail_uploads(true);
    let err = h
        .gateway
        .update_profile_image(alice, ProfileImage::Avatar, Some(png("new.png")))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Upload(_)));

    assert!(h.blobs.contains(&current.storage_id).await);
    let profile = h.gateway.profile(alice).await.unwrap();
    assert_eq!(profile.avatar, Some(current));
}

// --- Lectures & Videos ---

#[tokio::test]
async fn test_lecture_and_video_lifecycle() {
    let h = harness();
    let owner = user();
    let student = user();
    let classroom_id = h.classroom(owner, "Film").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    h.join(student, &classroom_id).await;

    let lecture = h
        .gateway
        .create_lecture(
            owner,
            &classroom_id,
            &module_id,
            LectureRequest {
                title: Some("Montage".into()),
            },
        )
        .await
        .unwrap();
    let lecture_id = lecture.id.to_string();

    let video = h
        .gateway
        .add_video(
            owner,
            &classroom_id,
            &module_id,
            &lecture_id,
            VideoForm {
                title: Some("Part 1".into()),
            },
            Some(FileUpload {
                file_name: "part1.mp4".into(),
                content_type: "video/mp4".into(),
                bytes: vec![0, 0, 0, 24],
            }),
        )
        .await
        .unwrap();
    assert!(video.file.storage_id.ends_with(".mp4"));

    let videos = h
        .gateway
        .list_videos(student, &classroom_id, &module_id, &lecture_id)
        .await
        .unwrap();
    assert_eq!(videos.len(), 1);

    let forbidden = h
        .gateway
        .delete_video(
            student,
            &classroom_id,
            &module_id,
            &lecture_id,
            &video.id.to_string(),
        )
        .await
        .unwrap_err();
    assert!(matches!(forbidden, ApiError::Forbidden(DenyReason::NotOwner)));

    h.gateway
        .delete_video(
            owner,
            &classroom_id,
            &module_id,
            &lecture_id,
            &video.id.to_string(),
        )
        .await
        .unwrap();
    assert!(h.blobs.is_empty().await);
    assert_eq!(h.repo.count(Collection::Videos).await, 0);
}

#[tokio::test]
async fn test_deleting_lecture_leaves_videos() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Film").await;
    let module_id = h.module(owner, &classroom_id, "Week 1").await;
    let lecture_id = h
        .gateway
        .create_lecture(
            owner,
            &classroom_id,
            &module_id,
            LectureRequest {
                title: Some("Cuts".into()),
            },
        )
        .await
        .unwrap()
        .id
        .to_string();
    h.gateway
        .add_video(
            owner,
            &classroom_id,
            &module_id,
            &lecture_id,
            VideoForm {
                title: Some("Jump cut".into()),
            },
            Some(pdf("clip.mp4")),
        )
        .await
        .unwrap();

    h.gateway
        .delete_lecture(owner, &classroom_id, &module_id, &lecture_id)
        .await
        .unwrap();

    assert_eq!(h.repo.count(Collection::Lectures).await, 0);
    assert_eq!(h.repo.count(Collection::Videos).await, 1);
    let lectures = h
        .gateway
        .list_lectures(owner, &classroom_id, &module_id)
        .await
        .unwrap();
    assert!(lectures.is_empty());
}

// --- Failure Mapping ---

#[tokio::test]
async fn test_store_outage_surfaces_as_storage_error() {
    let h = harness();
    let owner = user();
    let classroom_id = h.classroom(owner, "Outage").await;

    h.repo.set_unavailable(true);
    let err = h
        .gateway
        .get_classroom(owner, &classroom_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Storage(_)));
    assert_eq!(err.status().as_u16(), 500);
}

#[tokio::test]
async fn test_malformed_path_ids_are_validation_errors() {
    let h = harness();
    let err = h
        .gateway
        .list_modules(user(), "not-a-uuid")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "classroom_id is malformed");
    assert_eq!(err.status().as_u16(), 400);
}
