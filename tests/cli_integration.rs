use std::process::Command;
use tempfile::tempdir;

use bindelta::decoration::{self, DECO_EXPIRY};

fn bin() -> String {
    env!("CARGO_BIN_EXE_bindelta").to_string()
}

#[test]
fn cli_encode_decode_roundtrip() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("value.delta");
    let output = dir.path().join("output.bin");

    let old_value: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let mut new_value = old_value.clone();
    new_value[500] ^= 0xFF;
    std::fs::write(&old, &old_value).unwrap();
    std::fs::write(&new, &new_value).unwrap();

    let st = Command::new(bin())
        .arg("--force")
        .args(["encode", "--old"])
        .arg(&old)
        .arg(&new)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(std::fs::metadata(&delta).unwrap().len() < 100);

    let st = Command::new(bin())
        .arg("--force")
        .args(["decode", "--old"])
        .arg(&old)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), new_value);
}

#[test]
fn cli_decorated_roundtrip_via_stdout() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("deco.delta");

    let old_value = decoration::decorate_with(Some(&b"value"[..]), DECO_EXPIRY, Some(&b"1000"[..]))
        .unwrap()
        .unwrap();
    let new_value = decoration::decorate_with(Some(&b"value"[..]), DECO_EXPIRY, Some(&b"2000"[..]))
        .unwrap()
        .unwrap();
    std::fs::write(&old, &old_value).unwrap();
    std::fs::write(&new, &new_value).unwrap();

    let st = Command::new(bin())
        .args(["encode", "-d", "-s"])
        .arg(&old)
        .arg(&new)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());

    let out = Command::new(bin())
        .args(["decode", "-d", "-c", "-s"])
        .arg(&old)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, new_value);
}

#[test]
fn cli_identical_values_write_empty_delta() {
    let dir = tempdir().unwrap();
    let value = dir.path().join("value.bin");
    let delta = dir.path().join("none.delta");
    std::fs::write(&value, b"unchanged value").unwrap();

    let st = Command::new(bin())
        .args(["encode", "--old"])
        .arg(&value)
        .arg(&value)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(std::fs::read(&delta).unwrap().is_empty());

    let out = Command::new(bin())
        .args(["decode", "--stdout", "--old"])
        .arg(&value)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"unchanged value");
}

#[test]
fn cli_no_output_flag() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    std::fs::write(&input, b"payload").unwrap();

    let st = Command::new(bin())
        .args(["encode", "--check-only"])
        .arg(&input)
        .status()
        .unwrap();
    assert!(st.success());
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.delta");
    std::fs::write(&input, b"payload").unwrap();
    std::fs::write(&output, b"keep me").unwrap();

    let out = Command::new(bin())
        .arg("encode")
        .arg(&input)
        .arg(&output)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("-f"));
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");
}

#[test]
fn cli_decode_rejects_corrupt_delta() {
    let dir = tempdir().unwrap();
    let delta = dir.path().join("bad.delta");
    std::fs::write(&delta, [0xF4, 0x09, 0x03]).unwrap();

    let out = Command::new(bin())
        .args(["decode", "--check-only"])
        .arg(&delta)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("decode error"));
}

#[test]
fn cli_inspect_reports_structure() {
    let dir = tempdir().unwrap();
    let delta = dir.path().join("ops.delta");
    // bindiff: extract 0..4, append "xy", terminate
    std::fs::write(&delta, [0xF4, 0x01, 0x00, 0x04, 0x02, 0x02, b'x', b'y', 0x03]).unwrap();

    let out = Command::new(bin())
        .args(["--json", "inspect"])
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("EXTRACT"));
    assert!(stdout.contains("APPEND"));

    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(json["format"], "bindiff");
    assert_eq!(json["ops"], 2);
    assert_eq!(json["output_size"], 6);
}

#[cfg(feature = "file-io")]
#[test]
fn cli_json_reports_matching_digests() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let delta = dir.path().join("value.delta");
    let output = dir.path().join("output.bin");
    std::fs::write(&old, b"abc-old").unwrap();
    std::fs::write(&new, b"abc").unwrap();

    let out = Command::new(bin())
        .args(["--json", "encode", "--old"])
        .arg(&old)
        .arg(&new)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    let enc: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(
        enc["new_sha256"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    let out = Command::new(bin())
        .args(["--json", "decode", "--old"])
        .arg(&old)
        .arg(&delta)
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success());
    let dec: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(dec["output_sha256"], enc["new_sha256"]);
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("MIN_BLOCK="));
}
