use p1meter::obis_utils::meter_definitions::create_example_telegrams;
use p1meter::obis_utils::MeterProfile;
use p1meter::reader::ReaderState;
use p1meter::{AggregationEngine, FileSink, PriceTable, ReaderOptions, SourceReader};
use std::io::Write;
use tokio::sync::watch;

fn recorded_file(telegrams: usize) -> tempfile::NamedTempFile {
    let examples = create_example_telegrams();
    let telegram = examples.get(&MeterProfile::Dsmr22).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    /* a capture usually starts in the middle of a telegram */
    write!(file, "1-0:2.7.0(0000.00*kW)\r\n!\r\n").unwrap();
    for _ in 0..telegrams {
        file.write_all(telegram.as_bytes()).unwrap();
    }
    /* and ends in the middle of one */
    write!(file, "/ISk5\\2ME382-1003\r\n0-0:96.14.0(0002)\r\n").unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_replay_into_file_sink() {
    let input = recorded_file(35);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("energyavg.dat");

    let engine = AggregationEngine::new(MeterProfile::Dsmr22.definition(), PriceTable::default());
    let mut reader = SourceReader::new(engine, FileSink::new(&output), ReaderOptions::default());

    let (_tx, rx) = watch::channel(false);
    let stats = reader.run_replay(input.path().to_str().unwrap(), 10, &rx).await.unwrap();

    assert_eq!(stats.telegrams, 35);
    assert_eq!(stats.flushes, 2);
    assert_eq!(reader.state(), ReaderState::Closed);

    /* 0.98 kW at the high tariff, the gas reading never changes */
    let contents = std::fs::read_to_string(&output).unwrap();
    let fields: Vec<f64> = contents.split_whitespace().map(|f| f.parse().unwrap()).collect();
    assert!(contents.ends_with('\n'));
    assert_eq!(fields.len(), 5);
    assert!((fields[0] - 980.0).abs() < 1e-6);
    assert_eq!(fields[1], 0.0);
    assert_eq!(fields[2], 0.0);
    assert!((fields[3] - 0.98 * 0.23678 * 730.0).abs() < 1e-5);
    assert_eq!(fields[4], 0.0);
}

#[tokio::test]
async fn test_replay_without_complete_telegram_writes_nothing() {
    let input = recorded_file(0);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("energyavg.dat");

    let engine = AggregationEngine::new(MeterProfile::Dsmr22.definition(), PriceTable::default());
    let mut reader = SourceReader::new(engine, FileSink::new(&output), ReaderOptions::default());

    let (_tx, rx) = watch::channel(false);
    let stats = reader.run_replay(input.path().to_str().unwrap(), 10, &rx).await.unwrap();

    assert_eq!(stats.telegrams, 0);
    assert_eq!(stats.flushes, 0);
    assert!(!output.exists());
}
