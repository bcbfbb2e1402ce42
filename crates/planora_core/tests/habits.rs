use planora_core::{open_db_in_memory, Engine, NewHabit, NewProject, ServiceError};
use uuid::Uuid;

#[test]
fn habits_are_ordered_per_project_and_unfiled() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let project = engine
        .projects()
        .add(actor, None, NewProject::named("Health"))
        .unwrap();

    let unfiled = engine
        .habits()
        .add(actor, None, NewHabit::positive("Read"))
        .unwrap();
    let filed = engine
        .habits()
        .add(actor, Some(project.id), NewHabit::positive("Run"))
        .unwrap();
    let before = engine
        .habits()
        .add_before(actor, filed.id, NewHabit::negative("Smoke"))
        .unwrap();

    assert_eq!(unfiled.position, 1);
    assert_eq!(before.position, 1);
    assert_eq!(before.project_id, Some(project.id));
    let titles: Vec<String> = engine
        .habits()
        .list_scope(actor, Some(project.id))
        .unwrap()
        .into_iter()
        .map(|habit| habit.title)
        .collect();
    assert_eq!(titles, vec!["Smoke", "Run"]);
}

#[test]
fn completing_a_disallowed_polarity_is_invalid_state() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let habit = engine
        .habits()
        .add(actor, None, NewHabit::positive("Floss"))
        .unwrap();

    let err = engine
        .habits()
        .complete_negative(actor, habit.id)
        .unwrap_err();
    let counted = engine.habits().complete_positive(actor, habit.id).unwrap();

    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(err.code(), "invalid_state");
    assert_eq!(counted.positive_count, 1);
    assert_eq!(counted.negative_count, 0);
}

#[test]
fn habit_without_polarity_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);

    let err = engine
        .habits()
        .add(
            Uuid::new_v4(),
            None,
            NewHabit {
                title: "Nothing".to_string(),
                is_positive: false,
                is_negative: false,
            },
        )
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[test]
fn duplicate_resets_counters_and_reset_zeroes_them() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let habit = engine
        .habits()
        .add(actor, None, NewHabit::positive("Water"))
        .unwrap();
    engine.habits().complete_positive(actor, habit.id).unwrap();
    engine.habits().complete_positive(actor, habit.id).unwrap();

    let copy = engine.habits().duplicate(actor, habit.id).unwrap();
    let reset = engine.habits().reset_counters(actor, habit.id).unwrap();

    assert_eq!(copy.positive_count, 0);
    assert_eq!(copy.position, 2);
    assert_eq!(reset.positive_count, 0);
    assert_eq!(reset.position, 1);
}

#[test]
fn update_project_appends_to_the_target_and_move_after_follows_pivot() {
    let conn = open_db_in_memory().unwrap();
    let engine = Engine::with_defaults(&conn);
    let actor = Uuid::new_v4();
    let project = engine
        .projects()
        .add(actor, None, NewProject::named("Mind"))
        .unwrap();
    let meditate = engine
        .habits()
        .add(actor, Some(project.id), NewHabit::positive("Meditate"))
        .unwrap();
    let journal = engine
        .habits()
        .add(actor, None, NewHabit::positive("Journal"))
        .unwrap();
    let snack = engine
        .habits()
        .add(actor, None, NewHabit::negative("Snack"))
        .unwrap();

    let moved = engine
        .habits()
        .update_project(actor, journal.id, Some(project.id))
        .unwrap();
    assert_eq!(moved.project_id, Some(project.id));
    assert_eq!(moved.position, 2);

    let back = engine
        .habits()
        .move_after(actor, meditate.id, snack.id)
        .unwrap();
    assert_eq!(back.project_id, None);
    assert_eq!(back.position, 3);

    engine.habits().delete(actor, snack.id).unwrap();
    assert_eq!(engine.habits().list_scope(actor, None).unwrap().len(), 1);
}
