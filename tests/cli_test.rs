use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

type STDRESULT = Result<(), Box<dyn std::error::Error>>;

fn roundtrip_via_files(data: &[u8]) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let src_path = temp_dir.path().join("src.bin");
    let rz_path = temp_dir.path().join("src.rz");
    let out_path = temp_dir.path().join("out.bin");
    std::fs::write(&src_path, data)?;

    Command::cargo_bin("rolzip")?
        .arg("e")
        .arg(&src_path)
        .arg(&rz_path)
        .assert()
        .success();

    Command::cargo_bin("rolzip")?
        .arg("d")
        .arg(&rz_path)
        .arg(&out_path)
        .assert()
        .success();

    assert_eq!(std::fs::read(&out_path)?, data);
    Ok(())
}

#[test]
fn empty_file_round_trips() -> STDRESULT {
    roundtrip_via_files(b"")
}

#[test]
fn single_byte_round_trips() -> STDRESULT {
    roundtrip_via_files(b"A")
}

#[test]
fn text_round_trips() -> STDRESULT {
    let data = "the quick brown fox jumps over the lazy dog".repeat(500).into_bytes();
    roundtrip_via_files(&data)
}

#[test]
fn incompressible_bytes_round_trip() -> STDRESULT {
    use rand::{RngCore, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut data = vec![0u8; 65536];
    rng.fill_bytes(&mut data);
    roundtrip_via_files(&data)
}

#[test]
fn stdin_stdout_round_trip() -> STDRESULT {
    let data = b"piped through standard input and standard output".repeat(200);

    let mut compress = Command::cargo_bin("rolzip")?
        .arg("e")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .spawn()?;
    compress.stdin.take().unwrap().write_all(&data)?;
    let compressed = compress.wait_with_output()?;
    assert!(compressed.status.success());

    let mut expand = Command::cargo_bin("rolzip")?
        .arg("d")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .spawn()?;
    expand.stdin.take().unwrap().write_all(&compressed.stdout)?;
    let expanded = expand.wait_with_output()?;
    assert!(expanded.status.success());

    assert_eq!(expanded.stdout, data);
    Ok(())
}

#[test]
fn corrupted_frame_is_rejected_not_silently_accepted() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let src_path = temp_dir.path().join("src.bin");
    let rz_path = temp_dir.path().join("src.rz");
    let out_path = temp_dir.path().join("out.bin");
    let data = "corrupt me if you can".repeat(400).into_bytes();
    std::fs::write(&src_path, &data)?;

    Command::cargo_bin("rolzip")?
        .arg("e")
        .arg(&src_path)
        .arg(&rz_path)
        .assert()
        .success();

    let mut compressed = std::fs::read(&rz_path)?;
    // corrupt the declared olen field so the header is inconsistent with
    // the payload that follows.
    compressed[4] ^= 0xff;
    std::fs::write(&rz_path, &compressed)?;

    Command::cargo_bin("rolzip")?
        .arg("d")
        .arg(&rz_path)
        .arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::is_empty().not());
    Ok(())
}

#[test]
fn missing_source_file_fails_cleanly() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let out_path = temp_dir.path().join("out.bin");
    Command::cargo_bin("rolzip")?
        .arg("e")
        .arg(temp_dir.path().join("does_not_exist.bin"))
        .arg(&out_path)
        .assert()
        .failure();
    Ok(())
}
