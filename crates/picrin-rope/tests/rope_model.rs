//! Property tests comparing rope operations against a `Vec<u8>` reference
//! model: any interleaving of concat, slice, and flatten must observe the
//! same byte sequence as the model.

use picrin_rope::Rope;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    /// Append a fresh chunk of bytes.
    Push(Vec<u8>),
    /// Slice the accumulated rope; operands are reduced modulo the length.
    Slice(usize, usize),
    /// Materialize, then keep going on the same rope.
    Flatten,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..16).prop_map(Op::Push),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Slice(a, b)),
        Just(Op::Flatten),
    ]
}

proptest! {
    #[test]
    fn rope_matches_vec_model(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut rope = Rope::from_literal("");
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Op::Push(chunk) => {
                    rope = rope.concat(&Rope::from_bytes(&chunk));
                    model.extend_from_slice(&chunk);
                }
                Op::Slice(a, b) => {
                    let len = model.len();
                    let (mut i, mut j) = (a % (len + 1), b % (len + 1));
                    if i > j {
                        std::mem::swap(&mut i, &mut j);
                    }
                    rope = rope.slice(i, j);
                    model = model[i..j].to_vec();
                }
                Op::Flatten => {
                    prop_assert_eq!(&*rope.flatten(), model.as_slice());
                }
            }
            prop_assert_eq!(rope.len(), model.len());
        }

        prop_assert_eq!(&*rope.flatten(), model.as_slice());
    }

    #[test]
    fn concat_is_associative_on_bytes(
        a in proptest::collection::vec(any::<u8>(), 0..24),
        b in proptest::collection::vec(any::<u8>(), 0..24),
        c in proptest::collection::vec(any::<u8>(), 0..24),
    ) {
        let (ra, rb, rc) = (Rope::from_bytes(&a), Rope::from_bytes(&b), Rope::from_bytes(&c));
        let left = ra.concat(&rb).concat(&rc);
        let right = ra.concat(&rb.concat(&rc));
        prop_assert_eq!(&*left.flatten(), &*right.flatten());
    }

    #[test]
    fn slice_of_flattened_equals_slice_of_tree(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..8), 1..8),
        a in any::<usize>(),
        b in any::<usize>(),
    ) {
        let mut rope = Rope::from_literal("");
        let mut model = Vec::new();
        for chunk in &chunks {
            rope = rope.concat(&Rope::from_bytes(chunk));
            model.extend_from_slice(chunk);
        }

        let len = model.len();
        let (mut i, mut j) = (a % (len + 1), b % (len + 1));
        if i > j {
            std::mem::swap(&mut i, &mut j);
        }

        let before = rope.slice(i, j);
        let _ = rope.flatten();
        let after = rope.slice(i, j);
        prop_assert_eq!(&*before.flatten(), &model[i..j]);
        prop_assert_eq!(&*after.flatten(), &model[i..j]);
    }
}
