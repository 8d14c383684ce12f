//! Cross-replica behavior: the same set of edits, delivered in different
//! orders, must leave every replica with the same document.

use std::collections::HashMap;

use rand::prelude::*;
use weave_text::{ActorId, Text, TextNodeId, TextNodePos, Ticket};

fn actor(b: u8) -> ActorId {
    ActorId::from_bytes([b; 12])
}

fn t(lamport: u64, a: u8) -> Ticket {
    Ticket::new(lamport, 0, actor(a))
}

fn new_text() -> Text {
    Text::new(Ticket::INITIAL)
}

/// A recorded edit: the tuple a replica broadcasts after executing locally.
#[derive(Clone)]
struct Edit {
    from: TextNodePos,
    to: TextNodePos,
    max_created_at: HashMap<ActorId, Ticket>,
    content: String,
    edited_at: Ticket,
}

/// Execute an edit locally (unconditional delete) and record the tuple that
/// gets sent to other replicas. The returned deleted-map becomes the causal
/// bound for remote replay.
fn local_edit(text: &mut Text, from: usize, to: usize, content: &str, edited_at: Ticket) -> Edit {
    let (from_pos, to_pos) = text.find_boundary(from, to).unwrap();
    let (_, deleted) = text
        .edit(from_pos, to_pos, None, content, edited_at)
        .unwrap();
    Edit {
        from: from_pos,
        to: to_pos,
        max_created_at: deleted,
        content: content.into(),
        edited_at,
    }
}

fn apply_remote(text: &mut Text, edit: &Edit) {
    text.edit(
        edit.from,
        edit.to,
        Some(&edit.max_created_at),
        &edit.content,
        edit.edited_at,
    )
    .unwrap();
}

#[test]
fn simple_insert() {
    let mut text = new_text();
    let (caret, deleted) = text.edit_at(0, 0, "Hello", t(1, 1)).unwrap();

    assert_eq!(text.marshal(), "Hello");
    assert!(deleted.is_empty());
    // Caret sits at the end of the fresh insert: absolute ID (t1, 5).
    assert_eq!(caret.id(), TextNodeId::new(t(1, 1), 0));
    assert_eq!(caret.relative_offset(), 5);
    text.dbg_check(true);
}

#[test]
fn replace_middle() {
    let mut text = new_text();
    text.edit_at(0, 0, "Hello", t(1, 1)).unwrap();
    text.edit_at(2, 4, "y", t(2, 1)).unwrap();
    assert_eq!(text.marshal(), "Heyo");
    text.dbg_check(true);
}

#[test]
fn concurrent_inserts_converge() {
    // Both actors type into an empty document; the edit with the greater
    // ticket wins the spot next to the head.
    let mut ra = new_text();
    let ea = local_edit(&mut ra, 0, 0, "A", t(1, 1));

    let mut rb = new_text();
    let eb = local_edit(&mut rb, 0, 0, "B", t(2, 2));

    apply_remote(&mut ra, &eb);
    apply_remote(&mut rb, &ea);

    assert_eq!(ra.marshal(), "BA");
    assert_eq!(rb.marshal(), "BA");
    assert_eq!(ra.annotated_string(), rb.annotated_string());
    ra.dbg_check(true);
    rb.dbg_check(true);
}

#[test]
fn delete_delivered_before_its_insert_is_a_noop() {
    // A inserts "X". B's delete of [0, 1) was issued before B saw the
    // insert, so its causal bound for A is the initial ticket.
    let mut ra = new_text();
    let ea = local_edit(&mut ra, 0, 0, "X", t(1, 1));

    let head = TextNodePos::new(TextNodeId::new(Ticket::INITIAL, 0), 0);
    let eb = Edit {
        from: head,
        to: TextNodePos::new(TextNodeId::new(t(1, 1), 0), 1),
        max_created_at: HashMap::from([(actor(1), Ticket::INITIAL)]),
        content: String::new(),
        edited_at: t(2, 2),
    };

    // Out of order: the delete refers to an insert this replica has not
    // seen, so it applies as a pure no-op.
    let mut out_of_order = new_text();
    apply_remote(&mut out_of_order, &eb);
    assert_eq!(out_of_order.marshal(), "");
    apply_remote(&mut out_of_order, &ea);
    assert_eq!(out_of_order.marshal(), "X");

    // In order: the causal bound keeps the delete away from A's insert.
    let mut in_order = new_text();
    apply_remote(&mut in_order, &ea);
    apply_remote(&mut in_order, &eb);
    assert_eq!(in_order.marshal(), "X");

    assert_eq!(out_of_order.annotated_string(), in_order.annotated_string());
    out_of_order.dbg_check(true);
    in_order.dbg_check(true);
}

#[test]
fn replace_across_a_split_range() {
    let mut ra = new_text();
    let ea = local_edit(&mut ra, 0, 0, "ABCDE", t(1, 1));

    let mut rb = new_text();
    apply_remote(&mut rb, &ea);
    let eb = local_edit(&mut rb, 1, 4, "x", t(2, 2));
    assert_eq!(eb.max_created_at, HashMap::from([(actor(1), t(1, 1))]));
    assert_eq!(rb.marshal(), "AxE");

    apply_remote(&mut ra, &eb);
    assert_eq!(ra.marshal(), "AxE");
    assert_eq!(ra.annotated_string(), rb.annotated_string());

    // The original insert is now three fragments chained in offset order;
    // the middle one is a tombstone.
    let ids: Vec<_> = ra
        .nodes()
        .filter(|n| n.id().created_at() == t(1, 1))
        .map(|n| (n.id().offset(), n.is_deleted(), n.ins_prev_id()))
        .collect();
    let frag = |offset| TextNodeId::new(t(1, 1), offset);
    assert_eq!(
        ids,
        vec![
            (0, false, None),
            (1, true, Some(frag(0))),
            (4, false, Some(frag(1))),
        ]
    );
    ra.dbg_check(true);
    rb.dbg_check(true);
}

#[test]
fn deep_copy_matches_across_replicas() {
    let mut ra = new_text();
    let ea = local_edit(&mut ra, 0, 0, "ABCDE", t(1, 1));
    let mut rb = new_text();
    apply_remote(&mut rb, &ea);

    let eb = local_edit(&mut rb, 1, 4, "x", t(2, 2));
    apply_remote(&mut ra, &eb);
    let ea2 = local_edit(&mut ra, 0, 1, "", t(3, 1));
    apply_remote(&mut rb, &ea2);

    let copy = ra.deep_copy();
    assert_eq!(copy.annotated_string(), ra.annotated_string());
    assert_eq!(copy.annotated_string(), rb.annotated_string());
    assert_eq!(copy.len(), ra.len());
    copy.dbg_check(true);
}

/// Every merge of `a` and `b` that keeps each source's internal order.
fn interleavings(a: &[Edit], b: &[Edit]) -> Vec<Vec<Edit>> {
    if a.is_empty() {
        return vec![b.to_vec()];
    }
    if b.is_empty() {
        return vec![a.to_vec()];
    }
    let mut out = Vec::new();
    for mut rest in interleavings(&a[1..], b) {
        rest.insert(0, a[0].clone());
        out.push(rest);
    }
    for mut rest in interleavings(a, &b[1..]) {
        rest.insert(0, b[0].clone());
        out.push(rest);
    }
    out
}

#[test]
fn all_causal_delivery_orders_converge() {
    // One shared insert, then two actors edit concurrently on their own
    // replicas.
    let mut ra = new_text();
    let base = local_edit(&mut ra, 0, 0, "abcdef", t(1, 1));
    let mut rb = new_text();
    apply_remote(&mut rb, &base);

    let a_edits = vec![
        local_edit(&mut ra, 1, 3, "", t(2, 1)),
        local_edit(&mut ra, 2, 2, "XY", t(3, 1)),
    ];
    let b_edits = vec![
        local_edit(&mut rb, 2, 5, "", t(2, 2)),
        local_edit(&mut rb, 0, 0, "Q", t(3, 2)),
    ];

    // The two live replicas cross-apply each other's edits.
    for e in &b_edits {
        apply_remote(&mut ra, e);
    }
    for e in &a_edits {
        apply_remote(&mut rb, e);
    }
    assert_eq!(ra.marshal(), rb.marshal());
    ra.dbg_check(true);
    rb.dbg_check(true);

    // Fresh replicas replaying every causally-valid interleaving agree.
    for order in interleavings(&a_edits, &b_edits) {
        let mut replica = new_text();
        apply_remote(&mut replica, &base);
        for e in &order {
            apply_remote(&mut replica, e);
        }
        assert_eq!(replica.marshal(), ra.marshal());
        assert_eq!(replica.annotated_string(), ra.annotated_string());
        replica.dbg_check(true);
    }
}

fn random_str(len: usize, rng: &mut SmallRng) -> String {
    let mut str = String::new();
    let alphabet: Vec<char> = "abcdefghijklmnop_".chars().collect();
    for _ in 0..len {
        str.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
    str
}

fn random_local_edit(text: &mut Text, edited_at: Ticket, rng: &mut SmallRng) -> Edit {
    let doc_len = text.len();
    if doc_len == 0 || rng.gen_bool(0.6) {
        let pos = rng.gen_range(0..=doc_len);
        let content = random_str(rng.gen_range(1..4), rng);
        local_edit(text, pos, pos, &content, edited_at)
    } else {
        let pos = rng.gen_range(0..doc_len);
        let span = rng.gen_range(1..=usize::min(8, doc_len - pos));
        local_edit(text, pos, pos + span, "", edited_at)
    }
}

#[test]
fn two_actors_in_lockstep_stay_converged() {
    for seed in 0..10u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut ra = new_text();
        let mut rb = new_text();

        for round in 1..=40u64 {
            // Both actors edit concurrently against the same synced state...
            let ea = random_local_edit(&mut ra, t(round, 1), &mut rng);
            let eb = random_local_edit(&mut rb, t(round, 2), &mut rng);

            // ...then exchange, each applying the other's edit second.
            apply_remote(&mut ra, &eb);
            apply_remote(&mut rb, &ea);

            assert_eq!(ra.marshal(), rb.marshal(), "diverged with seed {seed}");
            ra.dbg_check(false);
            rb.dbg_check(false);
        }

        assert_eq!(ra.annotated_string(), rb.annotated_string());
        ra.dbg_check(true);
        rb.dbg_check(true);
    }
}
