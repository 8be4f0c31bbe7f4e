use proptest::prelude::*;
use statusdb::{diff, differs, DiffEntry, Document, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i64..5).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::String),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::List),
            prop::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|m| Value::Document(m.into_iter().collect())),
        ]
    })
}

fn document() -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-d]", value(), 0..4).prop_map(|m| m.into_iter().collect())
}

proptest! {
    #[test]
    fn diff_with_itself_is_empty(d in document()) {
        prop_assert!(diff(&d, &d).is_empty());
        prop_assert!(!differs(&d, &d));
    }

    #[test]
    fn report_is_empty_iff_equal(a in document(), b in document()) {
        let report = diff(&a, &b);
        prop_assert_eq!(report.is_empty(), a == b);
        prop_assert_eq!(report.differs(), differs(&a, &b));
    }

    #[test]
    fn differs_is_symmetric_and_directions_swap(a in document(), b in document()) {
        prop_assert_eq!(differs(&a, &b), differs(&b, &a));

        let ab = diff(&a, &b);
        let ba = diff(&b, &a);
        prop_assert_eq!(ab.len(), ba.len());
        for (forward, backward) in ab.iter().zip(ba.iter()) {
            match (forward, backward) {
                (DiffEntry::MissingInLeft(p), DiffEntry::MissingInRight(q))
                | (DiffEntry::MissingInRight(p), DiffEntry::MissingInLeft(q)) => prop_assert_eq!(p, q),
                (
                    DiffEntry::ValueMismatch { path: p, left: l1, right: r1 },
                    DiffEntry::ValueMismatch { path: q, left: l2, right: r2 },
                ) => {
                    prop_assert_eq!(p, q);
                    prop_assert_eq!(l1, r2);
                    prop_assert_eq!(r1, l2);
                }
                other => prop_assert!(false, "entries do not mirror: {:?}", other),
            }
        }
    }

    #[test]
    fn adding_one_key_yields_one_missing_entry(a in document(), extra in value()) {
        prop_assume!(!a.contains_key("zz"));
        let mut b = a.clone();
        b.insert("zz", extra);
        let report = diff(&a, &b);
        prop_assert_eq!(report.len(), 1);
        prop_assert!(matches!(&report.entries()[0], DiffEntry::MissingInLeft(p) if p.to_string() == "zz"));
    }
}
