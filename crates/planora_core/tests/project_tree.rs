use planora_core::{
    open_db_in_memory, Container, Engine, EntityKind, NewHabit, NewProject, NewTask, ProjectId,
    ProjectPatch, ServiceError, UserId,
};
use rusqlite::Connection;
use uuid::Uuid;

struct Fixture {
    root: ProjectId,
    children: [ProjectId; 2],
    tasks: [Uuid; 2],
    habit: Uuid,
}

/// Root project with two child projects, two tasks and one habit.
fn seed_tree(conn: &Connection, actor: UserId) -> Fixture {
    let engine = Engine::with_defaults(conn);
    let projects = engine.projects();
    let root = projects.add(actor, None, NewProject::named("Root")).unwrap().id;
    let first = projects
        .add(actor, Some(root), NewProject::named("Child A"))
        .unwrap()
        .id;
    let second = projects
        .add(actor, Some(root), NewProject::named("Child B"))
        .unwrap()
        .id;
    let top_task = engine
        .tasks()
        .add(actor, Container::Project(root), NewTask::titled("Top"))
        .unwrap()
        .id;
    let nested_task = engine
        .tasks()
        .add(actor, Container::Project(first), NewTask::titled("Nested"))
        .unwrap()
        .id;
    let habit = engine
        .habits()
        .add(actor, Some(second), NewHabit::positive("Stretch"))
        .unwrap()
        .id;
    Fixture {
        root,
        children: [first, second],
        tasks: [top_task, nested_task],
        habit,
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn archived(conn: &Connection, table: &str, id: Uuid) -> bool {
    conn.query_row(
        &format!("SELECT is_archived FROM {table} WHERE uuid = ?1;"),
        [id.to_string()],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}

#[test]
fn deleting_a_project_removes_its_whole_subtree() {
    let conn = open_db_in_memory().unwrap();
    let actor = Uuid::new_v4();
    let fixture = seed_tree(&conn, actor);
    let engine = Engine::with_defaults(&conn);

    let snapshot = engine.projects().delete(actor, fixture.root).unwrap();

    assert_eq!(snapshot.projects.len(), 3);
    assert_eq!(snapshot.projects[0], fixture.root);
    assert_eq!(snapshot.tasks.len(), 2);
    assert_eq!(snapshot.habits, vec![fixture.habit]);
    assert_eq!(snapshot.entities().len(), 6);
    assert_eq!(count(&conn, "projects"), 0);
    assert_eq!(count(&conn, "tasks"), 0);
    assert_eq!(count(&conn, "habits"), 0);
}

#[test]
fn deleting_a_child_keeps_sibling_positions() {
    let conn = open_db_in_memory().unwrap();
    let actor = Uuid::new_v4();
    let fixture = seed_tree(&conn, actor);
    let engine = Engine::with_defaults(&conn);

    engine.projects().delete(actor, fixture.children[0]).unwrap();

    let remaining = engine
        .projects()
        .list_children(actor, Some(fixture.root))
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, fixture.children[1]);
    assert_eq!(remaining[0].position, 2);
    let err = engine.tasks().get(actor, fixture.tasks[1]).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            kind: EntityKind::Task,
            ..
        }
    ));
}

#[test]
fn archiving_cascades_through_every_level() {
    let conn = open_db_in_memory().unwrap();
    let actor = Uuid::new_v4();
    let fixture = seed_tree(&conn, actor);
    let engine = Engine::with_defaults(&conn);

    let outcome = engine.projects().archive(actor, fixture.root).unwrap();

    assert_eq!(outcome.projects, 3);
    assert_eq!(outcome.tasks, 2);
    assert_eq!(outcome.habits, 1);
    assert!(archived(&conn, "projects", fixture.root));
    for child in fixture.children {
        assert!(archived(&conn, "projects", child));
    }
    for task in fixture.tasks {
        assert!(archived(&conn, "tasks", task));
    }
    assert!(archived(&conn, "habits", fixture.habit));
}

#[test]
fn archiving_a_mid_level_project_leaves_the_rest_of_the_tree_alone() {
    let conn = open_db_in_memory().unwrap();
    let actor = Uuid::new_v4();
    let fixture = seed_tree(&conn, actor);
    let engine = Engine::with_defaults(&conn);
    let [mid, sibling] = fixture.children;
    let grandchild = engine
        .projects()
        .add(actor, Some(mid), NewProject::named("Grandchild"))
        .unwrap()
        .id;
    let sibling_task = engine
        .tasks()
        .add(actor, Container::Project(sibling), NewTask::titled("Sibling task"))
        .unwrap()
        .id;

    let outcome = engine.projects().archive(actor, mid).unwrap();

    assert_eq!(outcome.projects, 2);
    assert_eq!(outcome.tasks, 1);
    assert_eq!(outcome.habits, 0);
    assert!(archived(&conn, "projects", mid));
    assert!(archived(&conn, "projects", grandchild));
    assert!(archived(&conn, "tasks", fixture.tasks[1]));
    assert!(!archived(&conn, "projects", fixture.root));
    assert!(!archived(&conn, "projects", sibling));
    assert!(!archived(&conn, "tasks", fixture.tasks[0]));
    assert!(!archived(&conn, "tasks", sibling_task));
    assert!(!archived(&conn, "habits", fixture.habit));
}

#[test]
fn unarchive_restores_only_the_target() {
    let conn = open_db_in_memory().unwrap();
    let actor = Uuid::new_v4();
    let fixture = seed_tree(&conn, actor);
    let engine = Engine::with_defaults(&conn);
    engine.projects().archive(actor, fixture.root).unwrap();

    let restored = engine.projects().unarchive(actor, fixture.root).unwrap();

    assert!(!restored.is_archived);
    for child in fixture.children {
        assert!(archived(&conn, "projects", child));
    }
    assert!(archived(&conn, "tasks", fixture.tasks[0]));
}

#[test]
fn archive_completed_tasks_only_touches_completed_ones() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let project = engine
        .projects()
        .add(actor, None, NewProject::named("Errands"))
        .unwrap()
        .id;
    let ids: Vec<Uuid> = ["Bank", "Post", "Shop"]
        .into_iter()
        .map(|title| {
            engine
                .tasks()
                .add(actor, Container::Project(project), NewTask::titled(title))
                .unwrap()
                .id
        })
        .collect();
    engine.tasks().complete(actor, ids[1]).unwrap();
    engine.tasks().complete(actor, ids[2]).unwrap();

    let archived_count = engine
        .projects()
        .archive_completed_tasks(actor, project)
        .unwrap();

    assert_eq!(archived_count, 2);
    assert!(!engine.tasks().get(actor, ids[0]).unwrap().is_archived);
    assert!(engine.tasks().get(actor, ids[1]).unwrap().is_archived);
    assert!(engine.tasks().get(actor, ids[2]).unwrap().is_archived);
    assert_eq!(
        engine
            .projects()
            .archive_completed_tasks(actor, project)
            .unwrap(),
        0
    );
}

#[test]
fn moving_a_project_under_its_descendant_is_invalid_state() {
    let conn = open_db_in_memory().unwrap();
    let actor = Uuid::new_v4();
    let fixture = seed_tree(&conn, actor);
    let engine = Engine::with_defaults(&conn);
    let grandchild = engine
        .projects()
        .add(actor, Some(fixture.children[0]), NewProject::named("Deep"))
        .unwrap()
        .id;

    let under_grandchild = engine
        .projects()
        .move_as_first_child(actor, fixture.root, grandchild)
        .unwrap_err();
    let under_itself = engine
        .projects()
        .move_as_first_child(actor, fixture.root, fixture.root)
        .unwrap_err();
    let beside_grandchild = engine
        .projects()
        .move_after(actor, fixture.children[0], grandchild)
        .unwrap_err();

    assert!(matches!(under_grandchild, ServiceError::InvalidState(_)));
    assert!(matches!(under_itself, ServiceError::InvalidState(_)));
    assert!(matches!(beside_grandchild, ServiceError::InvalidState(_)));
    assert_eq!(engine.projects().get(actor, fixture.root).unwrap().parent_id, None);
}

#[test]
fn move_as_first_child_re_parents_at_position_one() {
    let conn = open_db_in_memory().unwrap();
    let actor = Uuid::new_v4();
    let fixture = seed_tree(&conn, actor);
    let engine = Engine::with_defaults(&conn);
    let other = engine
        .projects()
        .add(actor, None, NewProject::named("Other"))
        .unwrap()
        .id;

    let moved = engine
        .projects()
        .move_as_first_child(actor, other, fixture.root)
        .unwrap();

    assert_eq!(moved.parent_id, Some(fixture.root));
    assert_eq!(moved.position, 1);
    let positions: Vec<i64> = engine
        .projects()
        .list_children(actor, Some(fixture.root))
        .unwrap()
        .into_iter()
        .map(|project| project.position)
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[test]
fn duplicate_copies_tasks_and_habits_next_to_the_source() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let source = engine
        .projects()
        .add(actor, None, NewProject::named("Trip"))
        .unwrap();
    let follower = engine
        .projects()
        .add(actor, None, NewProject::named("After"))
        .unwrap();
    let pack = engine
        .tasks()
        .add(actor, Container::Project(source.id), NewTask::titled("Pack"))
        .unwrap();
    engine
        .tasks()
        .add_as_child(actor, pack.id, NewTask::titled("Socks"))
        .unwrap();
    engine
        .habits()
        .add(actor, Some(source.id), NewHabit::positive("Walk"))
        .unwrap();
    engine.tasks().complete(actor, pack.id).unwrap();

    let copy = engine.projects().duplicate(actor, source.id).unwrap();

    assert_ne!(copy.id, source.id);
    assert_eq!(copy.name, "Trip");
    assert_eq!(copy.position, 2);
    assert_eq!(engine.projects().get(actor, follower.id).unwrap().position, 3);
    let copied_tasks = engine
        .tasks()
        .list_scope(actor, Container::Project(copy.id))
        .unwrap();
    assert_eq!(copied_tasks.len(), 1);
    assert_eq!(copied_tasks[0].title, "Pack");
    let copied_children = engine
        .tasks()
        .list_scope(actor, Container::ParentTask(copied_tasks[0].id))
        .unwrap();
    assert_eq!(copied_children.len(), 1);
    assert_eq!(copied_children[0].project_id, Some(copy.id));
    assert_eq!(
        engine.habits().list_scope(actor, Some(copy.id)).unwrap().len(),
        1
    );
}

#[test]
fn update_applies_only_present_fields() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let project = engine
        .projects()
        .add(actor, None, NewProject::named("Inbox"))
        .unwrap();

    let updated = engine
        .projects()
        .update(
            actor,
            project.id,
            ProjectPatch {
                color: Some("#ff0000".to_string()),
                is_favorite: Some(true),
                ..ProjectPatch::default()
            },
        )
        .unwrap();

    assert_eq!(updated.name, "Inbox");
    assert_eq!(updated.color, "#ff0000");
    assert!(updated.is_favorite);
    assert_eq!(updated.position, project.position);

    let err = engine
        .projects()
        .update(
            actor,
            project.id,
            ProjectPatch {
                color: Some("red".to_string()),
                ..ProjectPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}
