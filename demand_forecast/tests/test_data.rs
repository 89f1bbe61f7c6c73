use demand_forecast::data::{parse_timestamp, prepare_data, ColumnMapping, DataLoader};
use demand_forecast::ForecastError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,store,sales").unwrap();
    writeln!(file, "2023-01-01,north,103.0").unwrap();
    writeln!(file, "2023-01-02,north,106.0").unwrap();
    writeln!(file, "2023-01-03,north,108.0").unwrap();

    let df = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(df.get_column_names(), vec!["date", "store", "sales"]);

    let data = prepare_data(&df, &ColumnMapping::default()).unwrap();
    assert_eq!(data.dataframe().get_column_names(), vec!["ds", "y"]);
    assert_eq!(data.values().unwrap(), vec![103.0, 106.0, 108.0]);
}

#[rstest]
#[case("2023-01-05", "2023-01-05T00:00:00")]
#[case("2023-01-05 13:45:00", "2023-01-05T13:45:00")]
#[case("2023-01-05T13:45:00", "2023-01-05T13:45:00")]
#[case("2023/01/05", "2023-01-05T00:00:00")]
#[case("2023-01-05T13:45:00Z", "2023-01-05T13:45:00")]
#[case("2023-01-05T15:45:00+02:00", "2023-01-05T13:45:00")]
fn test_accepted_date_formats(#[case] raw: &str, #[case] expected: &str) {
    let parsed = parse_timestamp(raw).unwrap();
    assert_eq!(parsed.format("%Y-%m-%dT%H:%M:%S").to_string(), expected);
}

#[rstest]
#[case("not-a-date")]
#[case("2023-13-01")]
#[case("")]
fn test_rejected_dates(#[case] raw: &str) {
    assert!(parse_timestamp(raw).is_none());
}

#[test]
fn test_unparseable_date_fails_deterministically() {
    let df = DataLoader::from_bytes(b"date,sales\n2023-01-01,1\nnot-a-date,2\n").unwrap();
    for _ in 0..3 {
        match prepare_data(&df, &ColumnMapping::default()) {
            Err(ForecastError::ParseError(msg)) => {
                assert!(msg.contains("not-a-date"));
                assert!(msg.contains("row 2"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}

#[test]
fn test_preparation_is_idempotent() {
    let df = DataLoader::from_bytes(b"day,units\n2023-01-01,4\n2023-01-02,\n2023-01-03,7.5\n").unwrap();
    let once = prepare_data(&df, &ColumnMapping::new("day", "units").unwrap()).unwrap();
    let twice = prepare_data(once.dataframe(), &ColumnMapping::identity()).unwrap();

    assert_eq!(twice, once);
    assert_eq!(twice.targets().unwrap(), vec![Some(4.0), None, Some(7.5)]);
}

#[rstest]
#[case(&b"date,sales\n2023-01-01\n"[..])]
#[case(&b"date,date\n2023-01-01,2023-01-02\n"[..])]
#[case(&b""[..])]
fn test_malformed_csv(#[case] body: &[u8]) {
    let err = DataLoader::from_bytes(body).unwrap_err();
    assert!(matches!(err, ForecastError::ParseError(_)), "{:?}", err);
}

#[test]
fn test_header_only_has_no_rows() {
    let df = DataLoader::from_bytes(b"date,sales\n").unwrap();
    let data = prepare_data(&df, &ColumnMapping::default()).unwrap();
    assert!(data.is_empty());
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        DataLoader::from_csv("nonexistent_file.csv"),
        Err(ForecastError::IoError(_))
    ));
}
