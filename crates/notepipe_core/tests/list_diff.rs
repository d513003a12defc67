use notepipe_core::{diff, EditOp, Note};

fn note(id: i64, title: &str, priority: i32) -> Note {
    Note::new(title, format!("{title} body"), priority).with_id(id)
}

fn sorted(mut notes: Vec<Note>) -> Vec<Note> {
    notes.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
    notes
}

fn snapshot() -> Vec<Note> {
    sorted(vec![
        note(1, "groceries", 2),
        note(2, "taxes", 9),
        note(3, "call mum", 5),
        note(4, "gym", 3),
        note(5, "book", 7),
    ])
}

fn round_trip(old: &[Note], new: &[Note]) {
    let script = diff(old, new);
    let mut applied = old.to_vec();
    script.apply_to(&mut applied);
    assert_eq!(applied, new);
}

#[test]
fn self_diff_is_empty() {
    let list = snapshot();
    assert!(diff(&list, &list).is_empty());
    assert!(diff::<Note>(&[], &[]).is_empty());
}

#[test]
fn single_insert_is_one_insert_at_sorted_position() {
    let old = snapshot();
    let added = note(6, "dentist", 6);
    let mut next = old.clone();
    next.push(added.clone());
    let new = sorted(next);
    assert_eq!(new.len(), old.len() + 1);

    let script = diff(&old, &new);
    let expected_index = new.iter().position(|n| n.id == Some(6)).unwrap();
    assert_eq!(
        script.ops(),
        &[EditOp::Insert {
            index: expected_index,
            item: added,
        }]
    );
    round_trip(&old, &new);
}

#[test]
fn content_change_without_reorder_is_one_change() {
    let old = snapshot();
    let new: Vec<Note> = old
        .iter()
        .cloned()
        .map(|n| {
            if n.id == Some(3) {
                Note {
                    description: "call mum on sunday".to_string(),
                    ..n
                }
            } else {
                n
            }
        })
        .collect();

    let script = diff(&old, &new);
    assert_eq!(script.len(), 1);
    assert_eq!(script.changes(), 1);
    round_trip(&old, &new);
}

#[test]
fn priority_change_that_reorders_is_one_move_plus_one_change() {
    let old = snapshot();
    let bumped: Vec<Note> = old
        .iter()
        .cloned()
        .map(|n| if n.id == Some(1) { Note { priority: 10, ..n } } else { n })
        .collect();
    let new = sorted(bumped);
    assert_eq!(new[0].id, Some(1));

    let script = diff(&old, &new);
    assert_eq!(script.changes(), 1);
    assert_eq!(script.inserts(), 0);
    assert_eq!(script.removes(), 0);
    assert_eq!(script.moves(), 1);
    assert!(matches!(
        script.ops().last(),
        Some(EditOp::Change { index: 0, item }) if item.priority == 10
    ));
    round_trip(&old, &new);
}

#[test]
fn empty_old_is_all_inserts_and_empty_new_is_all_removes() {
    let list = snapshot();

    let grow = diff(&[], &list);
    assert_eq!(grow.inserts(), list.len());
    assert_eq!(grow.len(), list.len());
    round_trip(&[], &list);

    let shrink = diff(&list, &[]);
    assert_eq!(shrink.removes(), list.len());
    assert_eq!(shrink.len(), list.len());
    round_trip(&list, &[]);
}

#[test]
fn disjoint_lists_are_fully_replaced() {
    let old = snapshot();
    let new = sorted(vec![note(10, "a", 1), note(11, "b", 4), note(12, "c", 8)]);
    let script = diff(&old, &new);
    assert_eq!(script.removes(), old.len());
    assert_eq!(script.inserts(), new.len());
    assert_eq!(script.moves() + script.changes(), 0);
    round_trip(&old, &new);
}

#[test]
fn mixed_churn_round_trips() {
    let old = snapshot();
    let mut next: Vec<Note> = old
        .iter()
        .filter(|n| n.id != Some(4))
        .cloned()
        .map(|n| match n.id {
            Some(2) => Note { priority: 1, ..n },
            Some(5) => Note {
                title: "novel".to_string(),
                ..n
            },
            _ => n,
        })
        .collect();
    next.push(note(7, "plants", 5));
    next.push(note(8, "bills", 10));
    let new = sorted(next);

    let script = diff(&old, &new);
    assert_eq!(script.removes(), 1);
    assert_eq!(script.inserts(), 2);
    assert_eq!(script.changes(), 2);
    round_trip(&old, &new);
}

#[test]
fn unsaved_notes_never_match_each_other() {
    let draft = Note::new("draft", "body", 4);
    assert!(!draft.same_entity(&draft.clone()));

    let old = vec![note(1, "kept", 5), draft.clone()];
    let new = vec![note(1, "kept", 5), draft];
    let script = diff(&old, &new);
    assert_eq!(script.removes(), 1);
    assert_eq!(script.inserts(), 1);
    assert_eq!(script.moves(), 0);
    assert_eq!(script.changes(), 0);
    round_trip(&old, &new);
}
