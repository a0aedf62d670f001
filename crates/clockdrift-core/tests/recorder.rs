use clockdrift_core::TrialRecorder;

#[test]
fn writes_header_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bare.csv");

    let mut recorder = TrialRecorder::create(&path).unwrap();
    recorder.record(1.0025, 1).unwrap();
    recorder.record(2.5, 3).unwrap();
    assert_eq!(recorder.rows(), 2);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "actual;measured\n1.0025;1\n2.5;3\n");
}

#[test]
fn reports_unwritable_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = TrialRecorder::create(dir.path()).err().unwrap();
    assert!(err.to_string().contains(&dir.path().display().to_string()));
}
