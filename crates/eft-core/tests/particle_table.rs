use eft_core::{EftError, ParticleTable};
use tempfile::tempdir;

#[test]
fn table_loads_ids_and_names() {
    let csv = "# pdg,name\n21,g\n25, h0\n-11,e+\n";
    let table = ParticleTable::from_reader(csv.as_bytes()).expect("table loads");
    assert_eq!(table.len(), 3);
    assert_eq!(table.name(25), Some("h0"));
    assert_eq!(table.name(-11), Some("e+"));
    assert_eq!(table.display_name(6), "6");
}

#[test]
fn non_integer_ids_are_rejected() {
    let err = ParticleTable::from_reader("gluon,g\n".as_bytes()).unwrap_err();
    assert_eq!(err.info().code, "particle-id");
}

#[test]
fn table_loads_from_disk() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("particles.csv");
    std::fs::write(&path, "6,t\n-6,t~\n").unwrap();
    let table = ParticleTable::load(&path).expect("table loads");
    assert_eq!(table.display_name(-6), "t~");

    match ParticleTable::load(&dir.path().join("missing.csv")).expect_err("no file") {
        EftError::Io(info) => assert_eq!(info.code, "particle-open"),
        other => panic!("unexpected error variant: {:?}", other),
    }
}
