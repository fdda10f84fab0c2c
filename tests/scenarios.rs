//! End-to-end scenarios exercising the node family, the indexing algebra,
//! broadcasting, and persistence together rather than in isolation.

use columnar_core::{
    binary, binary_scalar, deserialize, from_values, select, serialize, BinOp, Buffer,
    CoreError, MemoryStore, Node, PersistConfig, Scalar, Selector, Value,
};
use std::sync::Arc;

#[test]
fn jagged_from_iterable_broadcasts_scalar_addition() {
    let n = from_values(vec![
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        Value::List(vec![]),
        Value::List(vec![Value::Int(4), Value::Int(5)]),
    ])
    .unwrap();
    assert!(matches!(n.as_ref(), Node::Jagged(_)));

    let added = binary_scalar(BinOp::Add, &n, Scalar::Int(100)).unwrap();
    assert_eq!(
        added.to_list().unwrap(),
        vec![
            Value::List(vec![Value::Int(101), Value::Int(102), Value::Int(103)]),
            Value::List(vec![]),
            Value::List(vec![Value::Int(104), Value::Int(105)]),
        ]
    );
}

fn five_rows() -> columnar_core::NodeRef {
    // counts: 3, 0, 2, 1, 3; rows [0..3), [), [3..5), [5..6), [6..9)
    let content = Node::leaf(Buffer::from_f64_vec(vec![
        1.1, 2.2, 3.3, 4.4, 5.5, 6.6, 7.7, 8.8, 9.9,
    ]));
    Arc::new(Node::Jagged(
        columnar_core::node::JaggedNode::from_offsets(vec![0, 3, 3, 5, 6, 9], content).unwrap(),
    ))
}

#[test]
fn slicing_then_inner_field_composes_outer_to_inner() {
    let n = five_rows();
    // N[2:, :-1] : take rows from index 2 onward, then drop the last element
    // of each remaining row.
    let sliced = select(&n, &[Selector::slice(Some(2), None), Selector::slice(None, Some(-1))])
        .unwrap()
        .into_value()
        .unwrap();

    assert_eq!(
        sliced,
        Value::List(vec![
            Value::List(vec![Value::Float(4.4)]),
            Value::List(vec![]),
            Value::List(vec![Value::Float(7.7), Value::Float(8.8)]),
        ])
    );
}

#[test]
fn integer_selector_on_every_row_is_out_of_bounds_when_a_row_is_too_short() {
    let n = five_rows();
    // N[:, 1] : the empty second row has no element at index 1.
    let err = select(&n, &[Selector::slice(None, None), Selector::Int(1)]).unwrap_err();
    assert!(matches!(err, CoreError::OutOfBounds { .. }));
}

#[test]
fn boolean_then_integer_selector_chain_filters_rows_then_picks_a_column() {
    let n = five_rows();
    let counts: Vec<i64> = match n.as_ref() {
        Node::Jagged(j) => j.counts(),
        _ => unreachable!(),
    };
    let mask: Vec<bool> = counts.iter().map(|&c| c > 1).collect();
    assert_eq!(mask, vec![true, false, true, false, true]);

    // N[N.counts > 1, 1] : keep rows with more than one element, then pick
    // index 1 out of each of those rows.
    let column = select(&n, &[Selector::BoolArray(mask), Selector::Int(1)])
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(
        column,
        Value::List(vec![Value::Float(2.2), Value::Float(5.5), Value::Float(8.8)])
    );
}

#[test]
fn table_column_addition_and_field_projection_identity() {
    let table = from_values(vec![
        Value::Record(vec![("x".into(), Value::Int(1)), ("y".into(), Value::Int(10))]),
        Value::Record(vec![("x".into(), Value::Int(2)), ("y".into(), Value::Int(20))]),
        Value::Record(vec![("x".into(), Value::Int(3)), ("y".into(), Value::Int(30))]),
    ])
    .unwrap();

    let (x_col, y_col) = match table.as_ref() {
        Node::Table(t) => (t.field("x").unwrap(), t.field("y").unwrap()),
        _ => panic!("expected Table"),
    };
    let sum = binary(BinOp::Add, &x_col, &y_col).unwrap();
    assert_eq!(
        sum.to_list().unwrap(),
        vec![Value::Int(11), Value::Int(22), Value::Int(33)]
    );

    // N["x"] and N.x both project through the same code path (a single-name
    // field selector), and share the same underlying column rather than
    // each copying it.
    let by_field = select(&table, &[Selector::Field("x".to_string())]).unwrap().into_node().unwrap();
    let by_fields = select(&table, &[Selector::Fields(vec!["x".to_string()])]).unwrap().into_node().unwrap();
    let (col_a, col_b) = match (by_field.as_ref(), by_fields.as_ref()) {
        (Node::Table(a), Node::Table(b)) => (a.field("x").unwrap(), b.field("x").unwrap()),
        _ => panic!("field projection should stay a table"),
    };
    assert!(Arc::ptr_eq(&col_a, &col_b));
    assert!(Arc::ptr_eq(&col_a, &x_col));
}

#[test]
fn heterogeneous_mix_round_trips_through_persistence() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mix = from_values(vec![
        Value::Record(vec![
            ("id".into(), Value::Int(1)),
            ("tags".into(), Value::List(vec![Value::Int(1), Value::Int(2)])),
        ]),
        Value::Record(vec![
            ("id".into(), Value::Int(2)),
            ("tags".into(), Value::List(vec![])),
        ]),
        Value::Record(vec![
            ("id".into(), Value::Int(3)),
            ("tags".into(), Value::List(vec![Value::Int(5)])),
        ]),
    ])
    .unwrap();

    let mut store = MemoryStore::new();
    let config = PersistConfig::default();
    serialize(&mix, &mut store, "root/", &config).unwrap();
    let restored = deserialize(&store, "root/", &config).unwrap();
    assert_eq!(restored.to_list().unwrap(), mix.to_list().unwrap());

    let err = deserialize(&store, "root/", &PersistConfig::empty_whitelist()).unwrap_err();
    assert!(matches!(err, CoreError::ForbiddenConstructor { .. }));
}
