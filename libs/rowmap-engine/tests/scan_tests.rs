use std::collections::VecDeque;

use rowmap_api::error::{DecodeError, ErrorKind};
use rowmap_api::{Decode, Scan, Value};
use rowmap_cursor_memory::{MemoryCursor, ResultSet};
use rowmap_engine::{
    Mapper, MapperConfig, NameCase, NameNormalizer, ScanError, ScanOptions, StructOnlyReason,
};

#[derive(Scan, Default, Debug, Clone, PartialEq)]
struct User {
    id: i64,
    name: String,
}

#[derive(Scan, Default, Debug, PartialEq)]
struct Address {
    city: String,
    #[db(rename = "zip")]
    postal_code: Option<String>,
}

#[derive(Scan, Default, Debug, PartialEq)]
struct Person {
    name: String,
    #[db(flatten)]
    address: Address,
    #[db(skip)]
    visits: u32,
}

/// Money stored as integer cents, read from a decimal text column.
#[derive(Scan, Default, Debug, PartialEq)]
#[db(decode)]
struct Money {
    cents: i64,
}

impl Decode for Money {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
        let text = match value {
            Value::Text(s) => s,
            Value::Null => return Err(DecodeError::null("Money")),
            other => return Err(DecodeError::mismatch(other.type_name(), "Money")),
        };
        let (units, fraction) = text.split_once('.').unwrap_or((text.as_str(), "0"));
        let units: i64 = units.parse().map_err(|_| DecodeError::format(format!("bad amount {text:?}")))?;
        let fraction: i64 = format!("{fraction:0<2}")[..2]
            .parse()
            .map_err(|_| DecodeError::format(format!("bad amount {text:?}")))?;
        self.cents = units * 100 + fraction;
        Ok(())
    }
}

#[derive(Scan, Default, Debug, PartialEq)]
struct Invoice {
    id: i64,
    total: Money,
}

#[derive(Scan, Default)]
struct Opaque {
    #[db(skip)]
    _state: Vec<u8>,
}

fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> MemoryCursor {
    MemoryCursor::new(ResultSet::new(columns.iter().copied(), rows))
}

fn users(columns: &[&str]) -> MemoryCursor {
    let rows = vec![vec![Value::from(1), Value::from("a")], vec![Value::from(2), Value::from("b")]];
    if columns == ["id", "name"] {
        result_set(columns, rows)
    } else {
        let swapped = rows.into_iter().map(|mut r| {
            r.reverse();
            r
        });
        result_set(columns, swapped.collect())
    }
}

fn strict() -> ScanOptions {
    ScanOptions::default()
}

fn lenient() -> ScanOptions {
    ScanOptions::default().with_lenient(true)
}

#[test]
fn test_id_name_into_vec_of_structs() {
    let mapper = Mapper::default();
    let mut cursor = users(&["id", "name"]);
    let mut dest: Vec<User> = Vec::new();

    let rows = mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        dest,
        vec![User { id: 1, name: "a".into() }, User { id: 2, name: "b".into() }]
    );
    assert!(!cursor.is_closed());
}

#[test]
fn test_column_order_does_not_matter() {
    let mapper = Mapper::default();
    let mut in_order: Vec<User> = Vec::new();
    let mut permuted: Vec<User> = Vec::new();

    mapper.scan_all(&mut users(&["id", "name"]), &mut in_order, strict()).unwrap();
    mapper.scan_all(&mut users(&["name", "id"]), &mut permuted, strict()).unwrap();

    assert_eq!(in_order, permuted);
}

#[test]
fn test_empty_result_leaves_destination_empty() {
    let mapper = Mapper::default();
    let mut cursor = result_set(&["id", "name"], vec![]);
    let mut dest: Vec<User> = Vec::new();

    assert_eq!(mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap(), 0);
    assert!(dest.is_empty());
}

#[test]
fn test_scan_one_without_rows() {
    let mapper = Mapper::default();
    let mut cursor = result_set(&["id", "name"], vec![]);
    let mut user = User::default();

    let err = mapper.scan_one(&mut cursor, &mut user, strict()).unwrap_err();
    assert!(matches!(err, ScanError::NoRows));
    assert_eq!(user, User::default());
}

#[test]
fn test_unmatched_column_strict_and_lenient() {
    let mapper = Mapper::default();
    let rows = || {
        result_set(
            &["id", "name", "extra"],
            vec![vec![Value::from(1), Value::from("a"), Value::from(true)]],
        )
    };

    let mut dest: Vec<User> = Vec::new();
    let err = mapper.scan_all(&mut rows(), &mut dest, strict()).unwrap_err();
    match err {
        ScanError::MissingField { column, type_name } => {
            assert_eq!(column, "extra");
            assert!(type_name.ends_with("User"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(dest.is_empty());

    mapper.scan_all(&mut rows(), &mut dest, lenient()).unwrap();
    assert_eq!(dest, vec![User { id: 1, name: "a".into() }]);
}

#[test]
fn test_missing_field_message() {
    let mapper = Mapper::default();
    let mut cursor = result_set(&["nickname"], vec![]);
    let mut user = User::default();
    let err = mapper.scan_one(&mut cursor, &mut user, strict()).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("missing destination name nickname in "));
}

#[test]
fn test_scalar_sequence() {
    let mapper = Mapper::default();
    let mut cursor = result_set(&["n"], vec![vec![Value::from(1)], vec![Value::from(2)], vec![Value::from(3)]]);
    let mut dest: Vec<i64> = Vec::new();

    mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap();
    assert_eq!(dest, vec![1, 2, 3]);
}

#[test]
fn test_nullable_scalar_sequence() {
    let mapper = Mapper::default();
    let mut cursor = result_set(&["n"], vec![vec![Value::from(1)], vec![Value::Null]]);
    let mut dest: VecDeque<Option<i64>> = VecDeque::new();

    mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap();
    assert_eq!(dest, VecDeque::from(vec![Some(1), None]));
}

#[test]
fn test_scalar_with_two_columns_is_shape_mismatch() {
    let mapper = Mapper::default();
    let mut cursor = users(&["id", "name"]);
    let mut dest: Vec<i64> = Vec::new();

    let err = mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap_err();
    assert!(matches!(err, ScanError::ShapeMismatch { columns: 2, .. }));
    assert!(dest.is_empty());
    assert_eq!(cursor.remaining(), 2);
}

#[test]
fn test_flattened_fields_are_reachable() {
    let mapper = Mapper::default();
    let mut cursor = result_set(
        &["zip", "name", "city"],
        vec![vec![Value::Null, Value::from("Ann"), Value::from("Oslo")]],
    );
    let mut dest: Vec<Person> = Vec::new();

    mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap();
    assert_eq!(
        dest,
        vec![Person {
            name: "Ann".into(),
            address: Address { city: "Oslo".into(), postal_code: None },
            visits: 0,
        }]
    );

    let traversals = mapper.traversals_by_names::<Person, _>(&["city", "visits", "zip"]);
    assert_eq!(traversals[0].path(), &[1, 0]);
    assert!(traversals[1].is_missing());
    assert_eq!(traversals[2].path(), &[1, 1]);
}

#[test]
fn test_boxed_elements() {
    let mapper = Mapper::default();
    let mut dest: Vec<Box<User>> = Vec::new();

    mapper.scan_all(&mut users(&["name", "id"]), &mut dest, strict()).unwrap();
    assert_eq!(dest.len(), 2);
    assert_eq!(*dest[1], User { id: 2, name: "b".into() });
}

#[test]
fn test_decode_capability_wins_over_fields() {
    let mapper = Mapper::default();
    assert!(mapper.is_scalar_like::<Money>());

    let mut cursor = result_set(&["amount"], vec![vec![Value::from("12.5")], vec![Value::from("3")]]);
    let mut dest: Vec<Money> = Vec::new();
    mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap();
    assert_eq!(dest, vec![Money { cents: 1250 }, Money { cents: 300 }]);

    let mut cursor = result_set(&["total", "id"], vec![vec![Value::from("0.99"), Value::from(7)]]);
    let mut invoice = Invoice::default();
    mapper.scan_one(&mut cursor, &mut invoice, strict()).unwrap();
    assert_eq!(invoice, Invoice { id: 7, total: Money { cents: 99 } });
}

#[test]
fn test_struct_only_rejects_each_scalar_kind() {
    let mapper = Mapper::default();
    let options = ScanOptions::default().with_struct_only(true);

    let mut names: Vec<String> = Vec::new();
    let err = mapper.scan_all(&mut result_set(&["name"], vec![]), &mut names, options).unwrap_err();
    assert!(matches!(err, ScanError::StructOnlyViolation { reason: StructOnlyReason::Primitive, .. }));
    assert!(err.to_string().contains("primitive"));

    let mut amounts: Vec<Money> = Vec::new();
    let err = mapper.scan_all(&mut result_set(&["total"], vec![]), &mut amounts, options).unwrap_err();
    assert!(matches!(err, ScanError::StructOnlyViolation { reason: StructOnlyReason::Decoder, .. }));
    assert!(err.to_string().contains("implements Decode"));

    let mut opaque = Opaque::default();
    let err = mapper.scan_one(&mut result_set(&["x"], vec![]), &mut opaque, options).unwrap_err();
    assert!(matches!(err, ScanError::StructOnlyViolation { reason: StructOnlyReason::NoFields, .. }));

    let mut dest: Vec<User> = Vec::new();
    mapper.scan_all(&mut users(&["id", "name"]), &mut dest, options).unwrap();
    assert_eq!(dest.len(), 2);
}

#[test]
fn test_decode_failure_keeps_earlier_rows() {
    let mapper = Mapper::default();
    let mut cursor = result_set(
        &["id", "name"],
        vec![
            vec![Value::from(1), Value::from("a")],
            vec![Value::Null, Value::from("b")],
            vec![Value::from(3), Value::from("c")],
        ],
    );
    let mut dest: Vec<User> = Vec::new();

    let err = mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap_err();
    match err {
        ScanError::Decode(e) => {
            assert_eq!(e.kind(), ErrorKind::Null);
            assert!(e.message().starts_with("row 1: column 0 (id)"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dest, vec![User { id: 1, name: "a".into() }]);
    assert_eq!(cursor.remaining(), 1);
}

#[test]
fn test_final_cursor_error_surfaces_after_rows() {
    let mapper = Mapper::default();
    let mut cursor = users(&["id", "name"]).with_final_error("connection reset by peer");
    let mut dest: Vec<User> = Vec::new();

    let err = mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap_err();
    match err {
        ScanError::Cursor(e) => assert_eq!(e.to_string(), "connection reset by peer"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dest.len(), 2);
}

#[test]
fn test_fixture_cursor_through_boxed_trait_object() {
    let mapper = Mapper::default();
    let fixture = r#"{"columns": ["id", "name", "id"], "rows": [[1, "first", 10]]}"#;
    let mut cursor: Box<dyn rowmap_api::Cursor> = Box::new(MemoryCursor::from_json(fixture).unwrap());
    let mut dest: Vec<User> = Vec::new();

    mapper.scan_all(&mut cursor, &mut dest, strict()).unwrap();
    assert_eq!(dest, vec![User { id: 10, name: "first".into() }]);
}

#[test]
fn test_replacing_normalizer_changes_matching() {
    #[derive(Scan, Default, Debug, PartialEq)]
    struct Login {
        user_name: String,
    }

    let mapper = Mapper::new(MapperConfig { name_case: NameCase::Lower, lenient: false });
    let row = |column: &str| result_set(&[column], vec![vec![Value::from("kim")]]);

    let mut login = Login::default();
    mapper.scan_one(&mut row("user_name"), &mut login, strict()).unwrap();
    assert_eq!(login.user_name, "kim");

    mapper.set_normalizer(NameNormalizer::from_case(NameCase::Upper));

    let err = mapper.scan_one(&mut row("user_name"), &mut login, strict()).unwrap_err();
    assert!(matches!(err, ScanError::MissingField { .. }));

    let mut upper = Login::default();
    mapper.scan_one(&mut row("USER_NAME"), &mut upper, strict()).unwrap();
    assert_eq!(upper.user_name, "kim");
}
