use planora_core::{
    open_db_in_memory, Container, Engine, NewFilter, NewHabit, NewLabel, NewProject, NewTask,
    SyncReader,
};
use std::thread::sleep;
use std::time::Duration;
use uuid::Uuid;

/// Lets `now_epoch_ms` advance so later writes get a strictly larger stamp.
fn tick() {
    sleep(Duration::from_millis(5));
}

#[test]
fn empty_feed_keeps_the_requested_high_water_mark() {
    let conn = open_db_in_memory().unwrap();

    let batch = SyncReader::new(&conn)
        .changes_since(Uuid::new_v4(), 1_234)
        .unwrap();

    assert!(batch.is_empty());
    assert_eq!(batch.high_water_ms, 1_234);
}

#[test]
fn changes_since_returns_every_kind_for_one_owner() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    let project = engine
        .projects()
        .add(owner, None, NewProject::named("Sync"))
        .unwrap();
    engine
        .tasks()
        .add(owner, Container::Project(project.id), NewTask::titled("Pull"))
        .unwrap();
    engine.labels().add(owner, NewLabel::named("net")).unwrap();
    engine
        .filters()
        .add(owner, NewFilter::new("Net", "#net"))
        .unwrap();
    let habit = engine
        .habits()
        .add(owner, Some(project.id), NewHabit::positive("Backup"))
        .unwrap();
    engine
        .projects()
        .add(other, None, NewProject::named("Elsewhere"))
        .unwrap();

    let batch = SyncReader::new(&conn).changes_since(owner, 0).unwrap();

    assert_eq!(batch.projects.len(), 1);
    assert_eq!(batch.tasks.len(), 1);
    assert_eq!(batch.labels.len(), 1);
    assert_eq!(batch.filters.len(), 1);
    assert_eq!(batch.habits.len(), 1);
    assert_eq!(batch.len(), 5);
    assert!(batch.high_water_ms >= habit.modified_at);
}

#[test]
fn shifted_siblings_show_up_in_the_feed() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let owner = Uuid::new_v4();
    let first = engine
        .tasks()
        .add(owner, Container::Root, NewTask::titled("First"))
        .unwrap();
    let second = engine
        .tasks()
        .add(owner, Container::Root, NewTask::titled("Second"))
        .unwrap();
    let third = engine
        .tasks()
        .add(owner, Container::Root, NewTask::titled("Third"))
        .unwrap();
    let reader = SyncReader::new(&conn);
    let mark = reader.changes_since(owner, 0).unwrap().high_water_ms;
    tick();

    engine
        .tasks()
        .add_after(owner, first.id, NewTask::titled("Inserted"))
        .unwrap();

    let changed: Vec<Uuid> = reader
        .tasks_since(owner, mark)
        .unwrap()
        .into_iter()
        .map(|task| task.id)
        .collect();
    assert_eq!(changed.len(), 3);
    assert!(changed.contains(&second.id));
    assert!(changed.contains(&third.id));
    assert!(!changed.contains(&first.id));
}

#[test]
fn cascades_stamp_every_touched_row() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let owner = Uuid::new_v4();
    let project = engine
        .projects()
        .add(owner, None, NewProject::named("Archive me"))
        .unwrap();
    engine
        .projects()
        .add(owner, Some(project.id), NewProject::named("Child"))
        .unwrap();
    engine
        .tasks()
        .add(owner, Container::Project(project.id), NewTask::titled("Task"))
        .unwrap();
    let reader = SyncReader::new(&conn);
    let mark = reader.changes_since(owner, 0).unwrap().high_water_ms;
    tick();

    engine.projects().archive(owner, project.id).unwrap();

    let batch = reader.changes_since(owner, mark).unwrap();
    assert_eq!(batch.projects.len(), 2);
    assert_eq!(batch.tasks.len(), 1);
    assert!(batch.high_water_ms > mark);
    assert!(reader.changes_since(owner, batch.high_water_ms).unwrap().is_empty());
}

#[test]
fn batch_serializes_as_a_read_model() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let owner = Uuid::new_v4();
    engine.labels().add(owner, NewLabel::named("json")).unwrap();

    let batch = SyncReader::new(&conn).changes_since(owner, 0).unwrap();
    let value = serde_json::to_value(&batch).unwrap();

    assert_eq!(value["labels"][0]["name"], "json");
    assert_eq!(value["labels"][0]["position"], 1);
    assert_eq!(value["labels"][0]["owner_id"], owner.to_string());
    assert_eq!(value["high_water_ms"], batch.high_water_ms);
    assert!(value["projects"].as_array().unwrap().is_empty());
}
