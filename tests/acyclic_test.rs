mod helpers;

use curator::error::GraphError;
use curator::graph::note::NewNote;
use curator::graph::thing::NewThing;
use helpers::test_notebook;

#[test]
fn note_cannot_be_about_itself() {
    let (mut nb, _tmp) = test_notebook();
    let thing = nb.create_thing(&NewThing::named("t")).unwrap();
    let note = nb.create_note(&NewNote::about(&thing, "first")).unwrap();

    let err = nb.retarget_note(&note, &note).unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }), "got {err:?}");

    let err = nb
        .create_note(&NewNote {
            id: Some("note-self".into()),
            ..NewNote::about("note-self", "loop")
        })
        .unwrap_err();
    assert_eq!(err.kind(), "cycle_detected");
}

#[test]
fn retarget_rejects_transitive_cycles() {
    let (mut nb, _tmp) = test_notebook();
    let thing = nb.create_thing(&NewThing::named("t")).unwrap();
    let n1 = nb.create_note(&NewNote::about(&thing, "n1")).unwrap();
    let n2 = nb.create_note(&NewNote::about(&n1, "n2")).unwrap();
    let n3 = nb.create_note(&NewNote::about(&n2, "n3")).unwrap();

    let err = nb.retarget_note(&n1, &n3).unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { .. }), "got {err:?}");

    // unchanged after the rejected write
    assert_eq!(nb.provenance_chain(&n3).unwrap(), vec![n2, n1, thing]);
}

#[test]
fn retarget_to_a_sibling_branch_is_fine() {
    let (mut nb, _tmp) = test_notebook();
    let thing = nb.create_thing(&NewThing::named("t")).unwrap();
    let left = nb.create_note(&NewNote::about(&thing, "left")).unwrap();
    let right = nb.create_note(&NewNote::about(&thing, "right")).unwrap();
    let leaf = nb.create_note(&NewNote::about(&left, "leaf")).unwrap();

    nb.retarget_note(&leaf, &right).unwrap();
    assert_eq!(nb.provenance_chain(&leaf).unwrap(), vec![right, thing]);
}
