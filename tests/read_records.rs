mod common;

use std::{fs, sync::Arc};

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
    UInt64Array,
};
use chrono::NaiveDate;
use tap_parquet::{
    ParquetStream, Phase, PortableType, Record, StreamErrorKind, StreamOptions, Value,
};
use tempfile::TempDir;

use common::{batch, batch_with_index, path_str, write_parquet, write_parquet_grouped};

fn collect(stream: &ParquetStream) -> Vec<Record> {
    stream
        .read_records()
        .expect("read records")
        .collect::<Result<Vec<_>, _>>()
        .expect("records")
}

fn three_columns() -> arrow::record_batch::RecordBatch {
    batch(vec![
        ("c1", Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef),
        ("c2", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
        ("c3", Arc::new(BooleanArray::from(vec![true, false])) as ArrayRef),
    ])
}

#[test]
fn columns_are_transposed_into_rows() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("rows.parquet");
    write_parquet(&path, &three_columns());

    let stream = ParquetStream::open("rows", path_str(&path)).expect("open");
    let records = collect(&stream);

    let expected: Vec<Record> = vec![
        vec![
            ("c1", Value::from("a")),
            ("c2", Value::Integer(1)),
            ("c3", Value::Boolean(true)),
        ]
        .into_iter()
        .collect(),
        vec![
            ("c1", Value::from("b")),
            ("c2", Value::Integer(2)),
            ("c3", Value::Boolean(false)),
        ]
        .into_iter()
        .collect(),
    ];
    assert_eq!(records, expected);
    assert_eq!(
        records[0].keys().collect::<Vec<_>>(),
        vec!["c1", "c2", "c3"]
    );
}

#[test]
fn metadata_only_index_column_is_recovered() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("indexed.parquet");
    let data = batch_with_index(
        vec![("name", Arc::new(StringArray::from(vec!["x", "y"])) as ArrayRef)],
        Some(r#"{"index_columns": ["idx"], "columns": []}"#),
    );
    write_parquet(&path, &data);

    let stream = ParquetStream::open("indexed", path_str(&path)).expect("open");
    assert_eq!(stream.schema().names().collect::<Vec<_>>(), vec!["name", "idx"]);
    assert_eq!(
        stream.schema().field("idx").map(|f| f.portable_type),
        Some(PortableType::Integer)
    );

    let records = collect(&stream);
    assert_eq!(records.len(), 2);
    for (position, record) in records.iter().enumerate() {
        assert_eq!(record.get("idx"), Some(&Value::Integer(position as i64)));
    }
    assert_eq!(records[1].keys().collect::<Vec<_>>(), vec!["name", "idx"]);
}

#[test]
fn range_index_uses_start_and_step() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("ranged.parquet");
    let data = batch_with_index(
        vec![("v", Arc::new(Int64Array::from(vec![7, 8, 9])) as ArrayRef)],
        Some(
            r#"{"index_columns": [{"kind": "range", "name": "row", "start": 100, "stop": 130, "step": 10}]}"#,
        ),
    );
    write_parquet(&path, &data);

    let stream = ParquetStream::open("ranged", path_str(&path)).expect("open");
    let rows = collect(&stream)
        .iter()
        .map(|r| r.get("row").and_then(Value::as_i64))
        .collect::<Vec<_>>();
    assert_eq!(rows, vec![Some(100), Some(110), Some(120)]);
}

#[test]
fn physical_index_column_is_not_duplicated() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("physical.parquet");
    let data = batch_with_index(
        vec![
            ("idx", Arc::new(Int64Array::from(vec![10, 20])) as ArrayRef),
            ("v", Arc::new(StringArray::from(vec!["p", "q"])) as ArrayRef),
        ],
        Some(r#"{"index_columns": ["idx"]}"#),
    );
    write_parquet(&path, &data);

    let stream = ParquetStream::open("physical", path_str(&path)).expect("open");
    assert_eq!(stream.schema().len(), 2);
    let records = collect(&stream);
    assert_eq!(records[1].len(), 2);
    assert_eq!(records[1].get("idx"), Some(&Value::Integer(20)));
}

#[test]
fn repeated_reads_yield_identical_records() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("repeat.parquet");
    write_parquet(&path, &three_columns());

    let stream = ParquetStream::open("repeat", path_str(&path)).expect("open");
    let first = collect(&stream);
    let second = collect(&stream);
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[test]
fn output_does_not_depend_on_batching_or_row_groups() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("groups.parquet");
    let ids = (0..25).collect::<Vec<i64>>();
    let labels = ids.iter().map(|i| format!("label-{i}")).collect::<Vec<_>>();
    let data = batch(vec![
        ("id", Arc::new(Int64Array::from(ids)) as ArrayRef),
        ("label", Arc::new(StringArray::from(labels)) as ArrayRef),
    ]);
    write_parquet_grouped(&path, &[data], 4);

    let whole = ParquetStream::open("groups", path_str(&path)).expect("open");
    let chunked = ParquetStream::with_options(
        "groups",
        path_str(&path),
        StreamOptions::default().batch_size(3),
    )
    .expect("open");

    let whole = collect(&whole);
    assert_eq!(whole.len(), 25);
    assert_eq!(whole, collect(&chunked));
    let ids = whole
        .iter()
        .map(|r| r.get("id").and_then(Value::as_i64).expect("id"))
        .collect::<Vec<_>>();
    assert_eq!(ids, (0..25).collect::<Vec<_>>());
}

#[test]
fn abandoned_iteration_releases_the_dataset() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("abandon.parquet");
    write_parquet(&path, &three_columns());

    for _ in 0..256 {
        let stream = ParquetStream::open("abandon", path_str(&path)).expect("open");
        let mut records = stream.read_records().expect("read");
        assert!(records.next().is_some());
        drop(records);
    }

    // no handle is left behind: the file can be replaced and read again
    fs::remove_file(&path).expect("remove");
    write_parquet(&path, &three_columns());
    let stream = ParquetStream::open("abandon", path_str(&path)).expect("reopen");
    assert_eq!(collect(&stream).len(), 2);
}

#[test]
fn nulls_floats_and_timestamps_become_plain_values() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("mixed.parquet");
    let at = NaiveDate::from_ymd_opt(2023, 11, 5)
        .expect("date")
        .and_hms_opt(12, 30, 0)
        .expect("time");
    let data = batch(vec![
        (
            "amount",
            Arc::new(Float64Array::from(vec![Some(2.5), None])) as ArrayRef,
        ),
        (
            "at",
            Arc::new(TimestampMicrosecondArray::from(vec![
                Some(at.and_utc().timestamp_micros()),
                None,
            ])) as ArrayRef,
        ),
        (
            "note",
            Arc::new(StringArray::from(vec![None, Some("late")])) as ArrayRef,
        ),
    ]);
    write_parquet(&path, &data);

    let stream = ParquetStream::open("mixed", path_str(&path)).expect("open");
    assert_eq!(
        stream
            .schema()
            .fields()
            .iter()
            .map(|f| f.portable_type)
            .collect::<Vec<_>>(),
        vec![
            PortableType::Number,
            PortableType::DateTime,
            PortableType::String
        ]
    );

    let records = collect(&stream);
    assert_eq!(records[0].get("amount"), Some(&Value::Number(2.5)));
    assert_eq!(records[0].get("at"), Some(&Value::DateTime(at)));
    assert_eq!(records[0].get("note"), Some(&Value::Null));
    assert_eq!(records[1].get("amount"), Some(&Value::Null));
    assert_eq!(records[1].get("at"), Some(&Value::Null));
    assert_eq!(
        serde_json::to_string(&records[0]).expect("json"),
        r#"{"amount":2.5,"at":"2023-11-05T12:30:00","note":null}"#
    );
}

#[test]
fn conversion_failure_ends_iteration_after_yielded_records() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("far_future.parquet");
    let data = batch(vec![(
        "at",
        Arc::new(TimestampMicrosecondArray::from(vec![0, i64::MAX, 0])) as ArrayRef,
    )]);
    write_parquet(&path, &data);

    let stream = ParquetStream::open("far_future", path_str(&path)).expect("open");
    let mut records = stream.read_records().expect("read");

    let first = records.next().expect("first").expect("first record");
    assert!(matches!(first.get("at"), Some(Value::DateTime(_))));

    let err = records.next().expect("second").expect_err("out of range");
    assert_eq!(err.phase(), Phase::Read);
    assert!(err.to_string().contains("column 'at' row 1"));

    // a failed pass is never reported as a shorter successful one
    assert!(records.next().is_none());
}

#[test]
fn uint64_beyond_signed_range_is_delivered() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("counters.parquet");
    let data = batch(vec![(
        "counter",
        Arc::new(UInt64Array::from(vec![1, u64::MAX])) as ArrayRef,
    )]);
    write_parquet(&path, &data);

    let stream = ParquetStream::open("counters", path_str(&path)).expect("open");
    assert_eq!(
        stream.schema().field("counter").map(|f| f.portable_type),
        Some(PortableType::Integer)
    );
    let records = collect(&stream);
    assert_eq!(records[0].get("counter"), Some(&Value::Integer(1)));
    assert_eq!(records[1].get("counter"), Some(&Value::UInteger(u64::MAX)));
    assert_eq!(
        serde_json::to_string(&records[1]).expect("json"),
        r#"{"counter":18446744073709551615}"#
    );
}

#[test]
fn overflowing_range_index_fails_the_read() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("huge_index.parquet");
    let data = batch_with_index(
        vec![("v", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef)],
        Some(
            r#"{"index_columns": [{"kind": "range", "name": "row", "start": 9223372036854775806, "stop": 9223372036854775807, "step": 1}]}"#,
        ),
    );
    write_parquet(&path, &data);

    let stream = ParquetStream::open("huge_index", path_str(&path)).expect("open");
    let err = stream.read_records().err().expect("read error");
    assert_eq!(err.phase(), Phase::Read);
    assert!(matches!(err.kind(), StreamErrorKind::Read(_)));
    assert!(err.to_string().contains("index column 'row'"));
}

#[test]
fn index_positions_run_across_files() {
    let dir = TempDir::new().expect("temp dir");
    let declaration = r#"{"index_columns": ["idx"], "columns": []}"#;
    for (name, values) in [
        ("part-0.parquet", vec!["a", "b"]),
        ("part-1.parquet", vec!["c", "d", "e"]),
    ] {
        let data = batch_with_index(
            vec![("name", Arc::new(StringArray::from(values)) as ArrayRef)],
            Some(declaration),
        );
        write_parquet(&dir.path().join(name), &data);
    }

    let stream = ParquetStream::with_options(
        "parts",
        path_str(dir.path()),
        StreamOptions::default().batch_size(2),
    )
    .expect("open");
    assert_eq!(stream.handle().files().len(), 2);
    assert_eq!(stream.schema().names().collect::<Vec<_>>(), vec!["name", "idx"]);

    let rows = collect(&stream)
        .iter()
        .map(|r| {
            (
                r.get("name").and_then(Value::as_str).map(str::to_string),
                r.get("idx").and_then(Value::as_i64),
            )
        })
        .collect::<Vec<_>>();
    let expected = ["a", "b", "c", "d", "e"]
        .iter()
        .enumerate()
        .map(|(i, name)| (Some(name.to_string()), Some(i as i64)))
        .collect::<Vec<_>>();
    assert_eq!(rows, expected);
}

#[test]
fn read_failure_is_reported_and_does_not_poison_retries() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("flaky.parquet");
    write_parquet(&path, &three_columns());
    let stream = ParquetStream::open("flaky", path_str(&path)).expect("open");

    fs::write(&path, b"not parquet anymore").expect("corrupt");
    let err = stream.read_records().err().expect("read error");
    assert_eq!(err.phase(), Phase::Read);
    assert_eq!(err.path(), path_str(&path));
    assert!(matches!(err.kind(), StreamErrorKind::Read(_)));

    write_parquet(&path, &three_columns());
    assert_eq!(collect(&stream).len(), 2);
}
