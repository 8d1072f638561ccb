use classroom_api::models::{
    Classroom, ClassroomSummary, Identity, Module, Note, UpdateClassroomRequest,
};
use chrono::Utc;
use uuid::Uuid;

fn user() -> Identity {
    Identity::new(Uuid::new_v4())
}

#[test]
fn test_new_classroom_has_creator_as_sole_owner() {
    let creator = user();
    let classroom = Classroom::new(creator, "Algebra".into(), None);

    assert_eq!(classroom.owner_ids, vec![creator]);
    assert!(classroom.member_ids.is_empty());
    assert!(classroom.is_participant(&creator));
    assert!(!classroom.is_member(&creator));
}

#[test]
fn test_membership_lists_behave_as_sets() {
    let mut classroom = Classroom::new(user(), "Sets".into(), None);
    let student = user();

    assert!(classroom.add_member(student));
    assert!(!classroom.add_member(student));
    assert_eq!(classroom.member_ids.len(), 1);

    // Owner and member sets may overlap.
    assert!(classroom.add_owner(student));
    assert!(classroom.is_owner(&student) && classroom.is_member(&student));

    assert!(classroom.remove_member(&student));
    assert!(!classroom.remove_member(&student));
    assert!(classroom.is_owner(&student));
}

#[test]
fn test_module_ids_keep_order_without_duplicates() {
    let mut classroom = Classroom::new(user(), "Order".into(), None);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    classroom.attach_module(a);
    classroom.attach_module(b);
    classroom.attach_module(a);
    assert_eq!(classroom.module_ids, vec![a, b]);

    assert!(classroom.detach_module(&a));
    assert_eq!(classroom.module_ids, vec![b]);
}

#[test]
fn test_take_note_removes_only_that_note() {
    let mut module = Module::new(Uuid::new_v4(), "Week 1".into());
    let keep = Note {
        id: Uuid::new_v4(),
        file: Default::default(),
        uploaded_at: Utc::now(),
    };
    let gone = Note {
        id: Uuid::new_v4(),
        ..keep.clone()
    };
    module.notes = vec![keep.clone(), gone.clone()];

    let taken = module.take_note(&gone.id).unwrap();
    assert_eq!(taken.id, gone.id);
    assert_eq!(module.notes.len(), 1);
    assert!(module.note(&keep.id).is_some());
    assert!(module.take_note(&gone.id).is_none());
}

#[test]
fn test_identity_serializes_as_plain_uuid() {
    let id = Uuid::new_v4();
    let json = serde_json::to_value(Identity::new(id)).unwrap();
    assert_eq!(json, serde_json::Value::String(id.to_string()));
}

#[test]
fn test_summary_hides_membership() {
    let mut classroom = Classroom::new(user(), "Summary".into(), Some("desc".into()));
    classroom.add_member(user());
    classroom.add_member(user());

    let summary = ClassroomSummary::from(&classroom);
    assert_eq!(summary.owner_count, 1);
    assert_eq!(summary.member_count, 2);

    let json = serde_json::to_value(&summary).unwrap();
    assert!(json.get("owner_ids").is_none());
    assert!(json.get("member_ids").is_none());
}

#[test]
fn test_missing_request_fields_deserialize_as_none() {
    let partial: UpdateClassroomRequest =
        serde_json::from_str(r#"{ "description": "Fridays" }"#).unwrap();
    assert!(partial.name.is_none());
    assert_eq!(partial.description.as_deref(), Some("Fridays"));
}
