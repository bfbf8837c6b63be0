use std::fs;

use air_quality_ingestor::{
    errors::IngestError,
    io::historical::{list_history_files, read_history_file},
};
use chrono::NaiveDate;
use tempfile::tempdir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn station_export_with_padded_columns() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("@13986.csv");
    fs::write(
        &path,
        "date, pm25, pm10, no2\n\
         2024/1/3, 30, 12, 4\n\
         2024/1/1, 21, 9, 3\n\
         2024/1/2, , 8, 2\n",
    )
    .unwrap();

    let rows = read_history_file(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, d(2024, 1, 1));
    assert_eq!(rows[0].value, Some(21.0));
    assert_eq!(rows[1].date, d(2024, 1, 3));
    assert!(rows.iter().all(|r| r.entity_id == "@13986"));
}

#[test]
fn area_export_uses_median() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("A60886.csv");
    fs::write(
        &path,
        "date,min,max,median,q1,q3\n2024-02-01,1,20,7,4,9\n",
    )
    .unwrap();

    let rows = read_history_file(&path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, Some(7.0));
}

#[test]
fn missing_file_is_fatal() {
    let dir = tempdir().unwrap();
    let err = read_history_file(dir.path().join("@1.csv")).unwrap_err();
    assert!(matches!(err, IngestError::MissingInput(_)));
}

#[test]
fn bad_value_is_reported_with_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("@7.csv");
    fs::write(&path, "date,pm25\n2024-01-01,abc\n").unwrap();

    let err = read_history_file(&path).unwrap_err();
    match err {
        IngestError::Malformed { message, .. } => assert!(message.contains("row 1")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn out_of_range_pm25_rejects_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("@13986.csv");
    fs::write(&path, "date, pm25\n2024/1/5, 12\n2024/1/6, 999\n").unwrap();

    let err = read_history_file(&path).unwrap_err();
    assert!(matches!(err, IngestError::OutOfRange { value, .. } if value == 999.0));
    assert!(err.to_string().contains("@13986"));
}

#[test]
fn lists_only_csv_files_in_order() {
    let dir = tempdir().unwrap();
    for name in ["@2.csv", "@1.csv", "notes.txt"] {
        fs::write(dir.path().join(name), "date,pm25\n").unwrap();
    }
    let files = list_history_files(dir.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["@1.csv", "@2.csv"]);
}
