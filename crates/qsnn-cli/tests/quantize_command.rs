use assert_cmd::Command;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use tempfile::tempdir;

#[test]
fn quantize_writes_one_value_per_line() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let input = tmp.path().join("weights.txt");
    let output = tmp.path().join("weights_q7.txt");
    fs::write(&input, "0.5, 1.5\n-2.0 0.25\n-0.0078125\n")?;

    Command::cargo_bin("qsnn")?
        .arg("quantize")
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("2 clamped"));

    assert_eq!(fs::read_to_string(&output)?, "64\n127\n-128\n32\n-1\n");
    Ok(())
}

#[test]
fn quantize_rejects_garbage() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let input = tmp.path().join("weights.txt");
    fs::write(&input, "0.5 half\n")?;

    Command::cargo_bin("qsnn")?
        .arg("quantize")
        .arg(&input)
        .arg(tmp.path().join("out.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a number"));
    Ok(())
}
