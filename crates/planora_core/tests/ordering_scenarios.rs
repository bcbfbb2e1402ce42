use planora_core::{
    open_db_in_memory, Container, Engine, NewLabel, NewProject, NewTask, ProjectId, ServiceError,
    UserId,
};
use uuid::Uuid;

fn add_projects<A, N>(engine: &Engine<'_, A, N>, actor: UserId, names: &[&str]) -> Vec<ProjectId>
where
    A: planora_core::AccessCheck,
    N: planora_core::ChangeNotifier,
{
    names
        .iter()
        .map(|name| {
            engine
                .projects()
                .add(actor, None, NewProject::named(*name))
                .unwrap()
                .id
        })
        .collect()
}

fn project_positions<A, N>(engine: &Engine<'_, A, N>, actor: UserId, ids: &[ProjectId]) -> Vec<i64>
where
    A: planora_core::AccessCheck,
    N: planora_core::ChangeNotifier,
{
    ids.iter()
        .map(|id| engine.projects().get(actor, *id).unwrap().position)
        .collect()
}

#[test]
fn appends_start_at_one_and_grow_by_one() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();

    let ids = add_projects(&engine, actor, &["P1", "P2", "P3"]);

    assert_eq!(project_positions(&engine, actor, &ids), vec![1, 2, 3]);
}

#[test]
fn add_after_takes_pivot_plus_one_and_shifts_followers() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2", "P3"]);

    let new = engine
        .projects()
        .add_after(actor, ids[1], NewProject::named("New"))
        .unwrap();

    assert_eq!(new.position, 3);
    assert_eq!(project_positions(&engine, actor, &ids), vec![1, 2, 4]);
    let listed: Vec<String> = engine
        .projects()
        .list_children(actor, None)
        .unwrap()
        .into_iter()
        .map(|project| project.name)
        .collect();
    assert_eq!(listed, vec!["P1", "P2", "New", "P3"]);
}

#[test]
fn add_before_takes_pivot_slot_and_shifts_pivot() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2", "P3"]);

    let new = engine
        .projects()
        .add_before(actor, ids[0], NewProject::named("New"))
        .unwrap();

    assert_eq!(new.position, 1);
    assert_eq!(project_positions(&engine, actor, &ids), vec![2, 3, 4]);
}

#[test]
fn move_as_first_shifts_everyone_down() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2", "P3"]);

    let moved = engine.projects().move_as_first(actor, ids[2]).unwrap();

    assert_eq!(moved.position, 1);
    assert_eq!(project_positions(&engine, actor, &ids), vec![2, 3, 1]);
}

#[test]
fn move_as_first_on_first_item_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2"]);
    let before = engine.projects().get(actor, ids[1]).unwrap();

    engine.projects().move_as_first(actor, ids[0]).unwrap();

    assert_eq!(project_positions(&engine, actor, &ids), vec![1, 2]);
    assert_eq!(
        engine.projects().get(actor, ids[1]).unwrap().modified_at,
        before.modified_at
    );
}

#[test]
fn move_after_leaves_a_gap_in_the_origin() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2", "P3"]);

    let moved = engine.projects().move_after(actor, ids[0], ids[2]).unwrap();

    assert_eq!(moved.position, 4);
    assert_eq!(project_positions(&engine, actor, &ids), vec![4, 2, 3]);
}

#[test]
fn move_after_self_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2"]);

    let same = engine.projects().move_after(actor, ids[0], ids[0]).unwrap();

    assert_eq!(same.position, 1);
    assert_eq!(project_positions(&engine, actor, &ids), vec![1, 2]);
}

#[test]
fn move_after_current_predecessor_keeps_positions() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2", "P3"]);

    engine.projects().move_after(actor, ids[1], ids[0]).unwrap();

    assert_eq!(project_positions(&engine, actor, &ids), vec![1, 2, 3]);
}

#[test]
fn appending_after_a_gap_uses_max_plus_one() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let ids = add_projects(&engine, actor, &["P1", "P2", "P3"]);
    engine.projects().delete(actor, ids[2]).unwrap();
    engine.projects().move_after(actor, ids[0], ids[1]).unwrap();

    let appended = engine
        .projects()
        .add(actor, None, NewProject::named("P4"))
        .unwrap();

    assert_eq!(appended.position, 4);
}

#[test]
fn scopes_are_independent_per_owner() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    add_projects(&engine, alice, &["A1", "A2"]);
    let bob_first = engine
        .projects()
        .add(bob, None, NewProject::named("B1"))
        .unwrap();

    assert_eq!(bob_first.position, 1);
}

#[test]
fn moving_a_task_into_another_project_re_scopes_it() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let [home, work]: [ProjectId; 2] = add_projects(&engine, actor, &["Home", "Work"])
        .try_into()
        .unwrap();
    let dishes = engine
        .tasks()
        .add(actor, Container::Project(home), NewTask::titled("Dishes"))
        .unwrap();
    let report = engine
        .tasks()
        .add(actor, Container::Project(work), NewTask::titled("Report"))
        .unwrap();
    let review = engine
        .tasks()
        .add(actor, Container::Project(work), NewTask::titled("Review"))
        .unwrap();

    let moved = engine.tasks().move_after(actor, dishes.id, report.id).unwrap();

    assert_eq!(moved.project_id, Some(work));
    assert_eq!(moved.position, 2);
    assert_eq!(engine.tasks().get(actor, review.id).unwrap().position, 3);
    assert!(engine
        .tasks()
        .list_scope(actor, Container::Project(home))
        .unwrap()
        .is_empty());
}

#[test]
fn labels_share_one_list_per_owner() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let urgent = engine.labels().add(actor, NewLabel::named("urgent")).unwrap();
    let later = engine.labels().add(actor, NewLabel::named("later")).unwrap();

    let inserted = engine
        .labels()
        .add_before(actor, later.id, NewLabel::named("soon"))
        .unwrap();

    assert_eq!(inserted.position, 2);
    let names: Vec<String> = engine
        .labels()
        .list(actor)
        .unwrap()
        .into_iter()
        .map(|label| label.name)
        .collect();
    assert_eq!(names, vec!["urgent", "soon", "later"]);
    assert_eq!(engine.labels().get(actor, urgent.id).unwrap().position, 1);
}

#[test]
fn moving_across_owners_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mine = engine
        .projects()
        .add(alice, None, NewProject::named("Mine"))
        .unwrap();
    let theirs = engine
        .projects()
        .add(bob, None, NewProject::named("Theirs"))
        .unwrap();

    let err = engine
        .projects()
        .move_after(alice, mine.id, theirs.id)
        .unwrap_err();

    assert!(matches!(err, ServiceError::AccessDenied { .. }));
}

#[test]
fn unknown_pivot_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();

    let err = engine
        .projects()
        .add_after(actor, Uuid::new_v4(), NewProject::named("Orphan"))
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound { .. }));
    assert_eq!(err.code(), "not_found");
}

#[test]
fn blank_names_are_invalid_input() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);

    let err = engine
        .projects()
        .add(Uuid::new_v4(), None, NewProject::named("   "))
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidInput(_)));
}
