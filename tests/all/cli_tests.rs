use anyhow::{Result, bail};
use std::process::{Command, Output};

fn run_i31ref_for_output(args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_i31ref"))
        .args(args)
        .env("I31REF_LOG", "debug")
        .output()?;
    Ok(output)
}

fn run_i31ref(args: &[&str]) -> Result<String> {
    let output = run_i31ref_for_output(args)?;
    if !output.status.success() {
        bail!(
            "Failed to execute i31ref with: {:?}\n{}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8(output.stdout)?)
}

fn run_i31ref_json(args: &[&str]) -> Result<serde_json::Value> {
    // `--json` belongs to the subcommand.
    let mut all = args.to_vec();
    all.insert(1, "--json");
    let stdout = run_i31ref(&all)?;
    Ok(serde_json::from_str(&stdout)?)
}

#[test]
fn inspect_text() -> Result<()> {
    let stdout = run_i31ref(&["inspect", "0", "-1", "0x40000000"])?;
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(
        lines,
        [
            "0x00000000: payload=0x00000000 get_u=0 get_s=0 raw=0x00000001",
            "0xffffffff: payload=0x7fffffff get_u=2147483647 get_s=-1 raw=0xffffffff",
            "0x40000000: payload=0x40000000 get_u=1073741824 get_s=-1073741824 raw=0x80000001",
        ]
    );
    Ok(())
}

#[test]
fn inspect_json() -> Result<()> {
    let json = run_i31ref_json(&["inspect", "--no-const-fold", "4294967295", "5"])?;
    assert_eq!(json[0]["payload"], 0x7fff_ffff);
    assert_eq!(json[0]["get_s"], -1);
    assert_eq!(json[1]["get_u"], 5);
    assert_eq!(json[1]["raw"], 11);
    Ok(())
}

#[test]
fn inspect_rejects_out_of_range() -> Result<()> {
    let output = run_i31ref_for_output(&["inspect", "4294967296"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("32 bits"), "{stderr}");
    Ok(())
}

#[test]
fn test_host_values() -> Result<()> {
    let json = run_i31ref_json(&[
        "test",
        "1",
        "-0",
        "-1073741824",
        "1073741824",
        "NaN",
        "-Infinity",
        "null",
        "new Number(1)",
        "'1'",
    ])?;
    let passed: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|r| (r["anyref"].as_bool().unwrap(), r["externref"].as_bool().unwrap()))
        .collect();
    assert_eq!(
        passed,
        [
            (true, true),
            (true, true),
            (true, true),
            (false, false),
            (false, false),
            (false, false),
            (false, false),
            (false, false),
            (false, false),
        ]
    );
    assert_eq!(json[1]["value"], "-0");
    assert_eq!(json[6]["normalized"], "null");
    Ok(())
}

#[test]
fn eq_compares_payloads() -> Result<()> {
    let stdout = run_i31ref(&["eq", "-1", "0x7fffffff"])?;
    assert_eq!(stdout.trim(), "ref.i31 0xffffffff == ref.i31 0x7fffffff");

    let json = run_i31ref_json(&["eq", "1", "2"])?;
    assert_eq!(json[0]["equal"], false);
    Ok(())
}

#[test]
fn common_flags() -> Result<()> {
    let output = run_i31ref_for_output(&["eq", "--no-gc", "1", "1"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to validate module"), "{stderr}");

    let output = run_i31ref_for_output(&["eq", "--max-call-depth", "0", "1", "1"])?;
    assert!(!output.status.success());

    let stdout = run_i31ref(&["eq", "--disable-logging", "--max-call-depth", "1", "3", "3"])?;
    assert!(stdout.contains("=="), "{stdout}");
    Ok(())
}

#[test]
fn logging_goes_to_stderr() -> Result<()> {
    let output = run_i31ref_for_output(&["inspect", "7"])?;
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ref.i31"), "{stderr}");

    let output = run_i31ref_for_output(&["inspect", "--disable-logging", "7"])?;
    assert!(output.stderr.is_empty());
    Ok(())
}
