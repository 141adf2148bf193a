use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shroud_core::edit::apply;
use shroud_core::{EditSet, Error, SourceBuffer, SrcRange};

/// Random proposals over a random ASCII buffer.
fn random_edits(rng: &mut StdRng, len: usize, count: usize) -> EditSet {
    let mut edits = EditSet::new();
    for _ in 0..count {
        let start = rng.random_range(0..=len + 2);
        let end = (start + rng.random_range(0..6)).min(len + 3);
        let text: String = (0..rng.random_range(0..4))
            .map(|_| char::from(rng.random_range(b'a'..=b'z')))
            .collect();
        edits.propose(start, end, text, "random");
    }
    edits
}

#[test]
fn finalized_edits_never_overlap() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..300 {
        let len = rng.random_range(0..40);
        let text: String = (0..len).map(|i| char::from(b'A' + (i % 26) as u8)).collect();
        let source = SourceBuffer::new(text);
        let edits = random_edits(&mut rng, len, 12);
        let out = edits.finalize(&source);

        for pair in out.ops.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
        for op in &out.ops {
            assert!(op.end <= len);
        }
        for (op, err) in &out.malformed {
            assert!(op.end > len, "{op:?}");
            assert!(matches!(err, Error::MalformedOffset { .. }));
        }
        for (_, err) in &out.conflicts {
            assert!(matches!(err, Error::OverlapConflict { .. }));
        }
        let kept = out.ops.len() + out.dropped();
        assert!(kept <= edits.len());
    }
}

#[test]
fn applying_back_to_front_matches_a_forward_rebuild() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let source = SourceBuffer::new("function f() { return a + b; }");
        let edits = random_edits(&mut rng, source.len(), 8);
        let ops = edits.finalize(&source).ops;

        let mut expected = String::new();
        let mut cursor = 0;
        for op in &ops {
            expected.push_str(&source.as_str()[cursor..op.start]);
            expected.push_str(&op.replacement);
            cursor = op.end;
        }
        expected.push_str(&source.as_str()[cursor..]);

        assert_eq!(apply(&source, &ops).as_str(), expected);
    }
}

#[test]
fn insertion_and_replacement_at_one_offset_both_apply() {
    let source = SourceBuffer::new("uint x = 5;");
    let mut edits = EditSet::new();
    edits.replace(&SrcRange::new(9, 1), "((5 + 1) - 1)", "integer");
    edits.insert(9, "/*a*/", "note");
    let (out, applied) = edits.commit(&source);
    assert_eq!(applied, 2);
    assert_eq!(out.as_str(), "uint x = /*a*/((5 + 1) - 1);");
}

#[test]
fn enclosing_edit_wins_over_nested_one() {
    let source = SourceBuffer::new("a + (b * c)");
    let mut edits = EditSet::new();
    edits.propose(5, 10, "d", "inner");
    edits.propose(4, 11, "e", "outer");
    let out = edits.finalize(&source);
    assert_eq!(out.ops.len(), 1);
    assert_eq!(out.ops[0].tag, "outer");
    assert_eq!(out.conflicts.len(), 1);
}

#[test]
fn split_codepoints_are_rejected() {
    let source = SourceBuffer::new("string s = \"é\";");
    let inside = source.as_str().find('é').unwrap() + 1;
    let mut edits = EditSet::new();
    edits.propose(inside, inside + 1, "x", "bad");
    let out = edits.finalize(&source);
    assert!(out.ops.is_empty());
    assert_eq!(out.malformed.len(), 1);
}
