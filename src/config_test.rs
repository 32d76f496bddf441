use std::fs::File;
use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempdir::TempDir;

use crate::config::{ConfigError, MachineConfig};

#[test]
fn defaults() {
    let cfg = MachineConfig::default();
    assert_eq!(false, cfg.deterministic);
    assert_eq!(Duration::from_millis(55), cfg.timer_interval());
    assert_eq!(0xFFFE, cfg.stack_top);
    assert_eq!(0x0100, cfg.code_offset);
}

#[test]
fn parses_partial_toml() {
    let cfg = MachineConfig::from_toml_str(r#"
        deterministic = true
        timer_interval_ms = 10
        stack_segment = 0x2000
    "#).unwrap();

    assert_eq!(true, cfg.deterministic);
    assert_eq!(Duration::from_millis(10), cfg.timer_interval());
    assert_eq!(0x2000, cfg.stack_segment);
    assert_eq!(0xFFFE, cfg.stack_top);
    assert_eq!(false, cfg.trace);
}

#[test]
fn rejects_bad_values() {
    match MachineConfig::from_toml_str("stack_top = 0x1_0000") {
        Err(ConfigError::Parse(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
    match MachineConfig::from_toml_str("trace = \"yes\"") {
        Err(ConfigError::Parse(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn loads_from_file() {
    let tmp_dir = TempDir::new("realmode86").unwrap();
    let path = tmp_dir.path().join("machine.toml");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "trace = true").unwrap();
    writeln!(f, "code_segment = 0x1000").unwrap();
    drop(f);

    let cfg = MachineConfig::from_file(&path).unwrap();
    assert_eq!(true, cfg.trace);
    assert_eq!(0x1000, cfg.code_segment);

    match MachineConfig::from_file(tmp_dir.path().join("missing.toml")) {
        Err(ConfigError::Io(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
}
