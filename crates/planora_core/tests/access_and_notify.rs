use planora_core::{
    open_db_in_memory, ChangeEvent, ChangeNotifier, CollaboratorGrant, Container, Engine,
    EngineConfig, EntityKind, NewHabit, NewProject, NewTask, NotifyError, OwnerId,
    ServiceError, SqliteAccessCheck, UserId,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingNotifier {
    fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn push(&self, event: ChangeEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn notify_changed(&self, owner_id: OwnerId, timestamp_ms: i64) -> Result<(), NotifyError> {
        self.push(ChangeEvent::Changed {
            owner_id,
            timestamp_ms,
        })
    }

    fn notify_deleted(
        &self,
        owner_id: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        self.push(ChangeEvent::Deleted {
            owner_id,
            kind,
            entity_id,
        })
    }

    fn notify_collaborators_changed(
        &self,
        collaborators: &[UserId],
        timestamp_ms: i64,
    ) -> Result<(), NotifyError> {
        self.push(ChangeEvent::CollaboratorsChanged {
            collaborators: collaborators.to_vec(),
            timestamp_ms,
        })
    }

    fn notify_collaborators_deleted(
        &self,
        collaborators: &[UserId],
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        self.push(ChangeEvent::CollaboratorsDeleted {
            collaborators: collaborators.to_vec(),
            kind,
            entity_id,
        })
    }
}

struct FailingNotifier;

impl ChangeNotifier for FailingNotifier {
    fn notify_changed(&self, _owner_id: OwnerId, _timestamp_ms: i64) -> Result<(), NotifyError> {
        Err(NotifyError("push gateway down".to_string()))
    }

    fn notify_deleted(
        &self,
        _owner_id: OwnerId,
        _kind: EntityKind,
        _entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        Err(NotifyError("push gateway down".to_string()))
    }

    fn notify_collaborators_changed(
        &self,
        _collaborators: &[UserId],
        _timestamp_ms: i64,
    ) -> Result<(), NotifyError> {
        Err(NotifyError("push gateway down".to_string()))
    }

    fn notify_collaborators_deleted(
        &self,
        _collaborators: &[UserId],
        _kind: EntityKind,
        _entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        Err(NotifyError("push gateway down".to_string()))
    }
}

fn event_names(events: &[ChangeEvent]) -> Vec<&'static str> {
    events.iter().map(ChangeEvent::name).collect()
}

#[test]
fn owner_changes_notify_the_owner_once_per_mutation() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Arc::new(RecordingNotifier::default());
    let engine = Engine::new(
        &conn,
        SqliteAccessCheck::new(&conn),
        recorder.clone(),
        EngineConfig::default(),
    );
    let owner = Uuid::new_v4();
    let project = engine
        .projects()
        .add(owner, None, NewProject::named("Solo"))
        .unwrap();

    let events = recorder.take();
    assert_eq!(events.len(), 1);
    match &events[0] {
        ChangeEvent::Changed {
            owner_id,
            timestamp_ms,
        } => {
            assert_eq!(*owner_id, owner);
            assert_eq!(*timestamp_ms, project.modified_at);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn shared_project_changes_reach_collaborators() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Arc::new(RecordingNotifier::default());
    let engine = Engine::new(
        &conn,
        SqliteAccessCheck::new(&conn),
        recorder.clone(),
        EngineConfig::default(),
    );
    let owner = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let parent = engine
        .projects()
        .add(owner, None, NewProject::named("Family"))
        .unwrap();
    let child = engine
        .projects()
        .add(owner, Some(parent.id), NewProject::named("Groceries"))
        .unwrap();
    engine
        .projects()
        .add_collaborator(owner, parent.id, guest, CollaboratorGrant::Edit)
        .unwrap();
    recorder.take();

    let task = engine
        .tasks()
        .add(guest, Container::Project(child.id), NewTask::titled("Milk"))
        .unwrap();

    assert_eq!(task.owner_id, owner);
    let events = recorder.take();
    assert_eq!(event_names(&events), vec!["changed", "collaborators_changed"]);
    assert!(matches!(
        &events[1],
        ChangeEvent::CollaboratorsChanged { collaborators, .. } if collaborators == &vec![guest]
    ));
}

#[test]
fn deleting_a_shared_project_notifies_deletion_to_everyone() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Arc::new(RecordingNotifier::default());
    let engine = Engine::new(
        &conn,
        SqliteAccessCheck::new(&conn),
        recorder.clone(),
        EngineConfig::default(),
    );
    let owner = Uuid::new_v4();
    let guest = Uuid::new_v4();
    let project = engine
        .projects()
        .add(owner, None, NewProject::named("Shared"))
        .unwrap();
    engine
        .projects()
        .add_collaborator(owner, project.id, guest, CollaboratorGrant::View)
        .unwrap();
    recorder.take();

    let snapshot = engine.projects().delete(owner, project.id).unwrap();

    assert_eq!(snapshot.collaborators, vec![guest]);
    let events = recorder.take();
    assert_eq!(
        events,
        vec![
            ChangeEvent::Deleted {
                owner_id: owner,
                kind: EntityKind::Project,
                entity_id: project.id,
            },
            ChangeEvent::CollaboratorsDeleted {
                collaborators: vec![guest],
                kind: EntityKind::Project,
                entity_id: project.id,
            },
        ]
    );
}

#[test]
fn failed_mutations_deliver_nothing() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Arc::new(RecordingNotifier::default());
    let engine = Engine::new(
        &conn,
        SqliteAccessCheck::new(&conn),
        recorder.clone(),
        EngineConfig::default(),
    );
    let owner = Uuid::new_v4();
    let habit = engine
        .habits()
        .add(owner, None, NewHabit::positive("Stretch"))
        .unwrap();
    recorder.take();

    let err = engine.habits().complete_negative(owner, habit.id).unwrap_err();

    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert!(recorder.take().is_empty());
}

#[test]
fn notifier_failures_do_not_fail_the_mutation() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::new(
        &conn,
        SqliteAccessCheck::new(&conn),
        FailingNotifier,
        EngineConfig::default(),
    );
    let owner = Uuid::new_v4();

    let project = engine
        .projects()
        .add(owner, None, NewProject::named("Resilient"))
        .unwrap();
    engine.projects().delete(owner, project.id).unwrap();

    assert!(engine.projects().list_children(owner, None).unwrap().is_empty());
}

#[test]
fn grants_gate_capabilities() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let finisher = Uuid::new_v4();
    let project = engine
        .projects()
        .add(owner, None, NewProject::named("Team"))
        .unwrap();
    let task = engine
        .tasks()
        .add(owner, Container::Project(project.id), NewTask::titled("Ship"))
        .unwrap();
    engine
        .projects()
        .add_collaborator(owner, project.id, viewer, CollaboratorGrant::View)
        .unwrap();
    engine
        .projects()
        .add_collaborator(owner, project.id, finisher, CollaboratorGrant::CompleteOnly)
        .unwrap();

    assert_eq!(engine.tasks().get(viewer, task.id).unwrap().id, task.id);
    assert!(matches!(
        engine.tasks().complete(viewer, task.id).unwrap_err(),
        ServiceError::AccessDenied { .. }
    ));
    assert!(engine.tasks().complete(finisher, task.id).unwrap().is_completed);
    assert!(matches!(
        engine
            .tasks()
            .update_content(finisher, task.id, "Renamed", "")
            .unwrap_err(),
        ServiceError::AccessDenied { .. }
    ));
    assert!(matches!(
        engine
            .tasks()
            .add(viewer, Container::Project(project.id), NewTask::titled("Nope"))
            .unwrap_err(),
        ServiceError::AccessDenied { .. }
    ));
    assert_eq!(engine.projects().collaborators(owner, project.id).unwrap().len(), 2);
}

#[test]
fn only_the_owner_manages_collaborators() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let owner = Uuid::new_v4();
    let editor = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    let project = engine
        .projects()
        .add(owner, None, NewProject::named("Club"))
        .unwrap();
    engine
        .projects()
        .add_collaborator(owner, project.id, editor, CollaboratorGrant::Edit)
        .unwrap();

    let by_editor = engine
        .projects()
        .add_collaborator(editor, project.id, outsider, CollaboratorGrant::View)
        .unwrap_err();
    let owner_as_guest = engine
        .projects()
        .add_collaborator(owner, project.id, owner, CollaboratorGrant::Edit)
        .unwrap_err();

    assert!(matches!(by_editor, ServiceError::AccessDenied { .. }));
    assert!(matches!(owner_as_guest, ServiceError::InvalidInput(_)));
    assert!(engine
        .projects()
        .remove_collaborator(owner, project.id, editor)
        .unwrap());
    assert!(!engine
        .projects()
        .remove_collaborator(owner, project.id, editor)
        .unwrap());
    assert!(matches!(
        engine.projects().get(editor, project.id).unwrap_err(),
        ServiceError::AccessDenied { .. }
    ));
}

#[test]
fn outsiders_get_access_denied_and_unknown_ids_not_found() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let owner = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    let task = engine
        .tasks()
        .add(owner, Container::Root, NewTask::titled("Private"))
        .unwrap();

    let denied = engine.tasks().delete(outsider, task.id).unwrap_err();
    let missing = engine.tasks().get(owner, Uuid::new_v4()).unwrap_err();

    assert_eq!(denied.code(), "access_denied");
    assert_eq!(missing.code(), "not_found");
    assert_eq!(engine.tasks().get(owner, task.id).unwrap().title, "Private");
}
