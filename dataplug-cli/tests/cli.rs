use assert_cmd::Command;
use dataplug_test_utils::{schemas, CatalogFixture};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::error::Error;
use std::fs;
use std::io::{Read, Write};
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};

fn dataplug(fixture: &CatalogFixture) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("dataplug")?;
    cmd.arg("--collections").arg(fixture.path());
    cmd.env_remove("DATAPLUG_COLLECTIONS");
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

fn things(schema: Value) -> Result<CatalogFixture, Box<dyn Error>> {
    let fixture = CatalogFixture::new()?.collection("things", Some(&schema), "")?;
    fixture.write()?;
    Ok(fixture)
}

fn stdout_json(output: &std::process::Output) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn filter_passes_valid_records() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    dataplug(&fixture)?
        .args(["filter", "things"])
        .write_stdin(r#"[{"a":1},{"a":"x"}]"#)
        .assert()
        .success()
        .stdout("[{\"a\":1}]\n");
    Ok(())
}

#[test]
fn filter_fail_exits_with_data_error() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    dataplug(&fixture)?
        .args(["filter", "things", "--fail"])
        .write_stdin(r#"[{"a":1},{"a":"x"}]"#)
        .assert()
        .code(65)
        .stdout("[{\"a\":1}]\n");
    Ok(())
}

#[test]
fn inverted_filter_passes_invalid_records() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    dataplug(&fixture)?
        .args(["filter", "things", "-r"])
        .write_stdin(r#"[{"a":1},{"a":"x"}]"#)
        .assert()
        .success()
        .stdout("[{\"a\":\"x\"}]\n");
    Ok(())
}

#[test]
fn filter_indents_output() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    dataplug(&fixture)?
        .args(["filter", "things", "--indent", "2"])
        .write_stdin(r#"[{"a":1}]"#)
        .assert()
        .success()
        .stdout("[\n{\n  \"a\": 1\n}\n]\n");
    Ok(())
}

#[test]
fn malformed_input_exits_with_data_error() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    dataplug(&fixture)?
        .args(["filter", "things"])
        .write_stdin(r#"{"a":1}"#)
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Malformed JSON"));
    Ok(())
}

#[test]
fn scan_prints_results() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    let output = dataplug(&fixture)?
        .args(["scan", "things", "--results"])
        .write_stdin(r#"[{"a":1},{"a":"x"},{"a":2}]"#)
        .output()?;
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output)?,
        json!({"scanned": 3, "valid": 2, "invalid": 1})
    );
    Ok(())
}

#[test]
fn scan_without_results_prints_nothing() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    dataplug(&fixture)?
        .args(["scan", "things"])
        .write_stdin(r#"[{"a":"x"}]"#)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    Ok(())
}

#[test]
fn flatten_of_empty_array() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::nested_a_b())?;
    dataplug(&fixture)?
        .args(["flatten", "things"])
        .write_stdin("[]")
        .assert()
        .success()
        .stdout("[]\n");
    Ok(())
}

#[test]
fn flatten_with_and_without_metadata() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::nested_a_b())?;
    dataplug(&fixture)?
        .args(["flatten", "things"])
        .write_stdin(r#"[{"a":{"b":1}}]"#)
        .assert()
        .success()
        .stdout("[{\"collection\":\"things\",\"index\":[],\"record\":{\"a.b\":1}}]\n");

    dataplug(&fixture)?
        .args(["flatten", "things", "--metadata", "false"])
        .write_stdin(r#"[{"a":{"b":1}}]"#)
        .assert()
        .success()
        .stdout("[{\"a.b\":1}]\n");
    Ok(())
}

#[test]
fn flat_metadata_describes_columns() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::nested_a_b())?;
    let output = dataplug(&fixture)?
        .args(["flat-metadata", "things", "-n", "t"])
        .output()?;
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output)?,
        json!({"t": {"parent": null, "fields": {"a.b": {"type": "integer", "required": false}}}})
    );

    dataplug(&fixture)?
        .args(["metadata", "things"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"things\""));
    Ok(())
}

#[test]
fn schema_prints_document_or_flat_schema() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    let output = dataplug(&fixture)?.args(["schema", "things"]).output()?;
    assert_eq!(stdout_json(&output)?, schemas::integer_a());

    let output = dataplug(&fixture)?
        .args(["schema", "things", "--flat"])
        .output()?;
    assert!(output.status.success());
    let flat = stdout_json(&output)?;
    assert_eq!(
        flat["properties"]["things"]["items"]["properties"]["a"]["type"],
        json!(["integer", "null"])
    );
    Ok(())
}

#[test]
fn source_reads_inline_records() -> Result<(), Box<dyn Error>> {
    let fixture = CatalogFixture::new()?.collection(
        "users",
        None,
        "[collection.source]\nkind = \"inline\"\nrecords = [{ id = 1 }, { id = 2 }, { id = 3 }]\n",
    )?;
    fixture.write()?;
    dataplug(&fixture)?
        .args(["source", "users", "--set", "offset=1", "-s", "limit=1"])
        .assert()
        .success()
        .stdout("[{\"id\":2}]\n");
    Ok(())
}

#[test]
fn target_writes_records_to_file() -> Result<(), Box<dyn Error>> {
    let fixture = CatalogFixture::new()?.collection(
        "sink",
        None,
        "target = { kind = \"file\", overwrite = true }\n",
    )?;
    fixture.write()?;
    let path = fixture.dir().join("out.json");

    dataplug(&fixture)?
        .args(["target", "sink", "--set"])
        .arg(format!("path={}", path.display()))
        .write_stdin(r#"[{"a":1},{"a":2}]"#)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(written, json!([{"a": 1}, {"a": 2}]));
    Ok(())
}

#[test]
fn usage_errors_exit_64() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    dataplug(&fixture)?
        .args(["filter", "missing"])
        .write_stdin("[]")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Unknown collection 'missing'"));

    dataplug(&fixture)?
        .args(["source", "things"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("has no source"));

    dataplug(&fixture)?
        .args(["frobnicate"])
        .assert()
        .code(64);
    Ok(())
}

#[test]
fn bad_source_option_exits_64() -> Result<(), Box<dyn Error>> {
    let fixture = CatalogFixture::new()?.collection(
        "users",
        None,
        "source = { kind = \"inline\", records = [] }\n",
    )?;
    fixture.write()?;
    dataplug(&fixture)?
        .args(["source", "users", "-s", "limit=abc"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Invalid \"limit\" value"));
    Ok(())
}

#[test]
fn missing_catalog_exits_64() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    Command::cargo_bin("dataplug")?
        .arg("--collections")
        .arg(dir.path().join("absent.toml"))
        .arg("collections")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Cannot read catalog"));
    Ok(())
}

#[test]
fn collections_lists_capabilities() -> Result<(), Box<dyn Error>> {
    let fixture = CatalogFixture::new()?
        .collection("orders", Some(&schemas::orders()), "source = { kind = \"file\" }\n")?
        .collection("void", None, "target = { kind = \"discard\" }\n")?;
    fixture.write()?;
    dataplug(&fixture)?
        .arg("collections")
        .assert()
        .success()
        .stdout("orders\tschema, source (file)\nvoid\ttarget (discard)\n");
    Ok(())
}

#[test]
fn help_exits_zero() -> Result<(), Box<dyn Error>> {
    Command::cargo_bin("dataplug")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("flatten"));
    Ok(())
}

#[test]
fn malformed_catalog_presets_exit_64() -> Result<(), Box<dyn Error>> {
    let fixture = CatalogFixture::new()?.collection(
        "users",
        None,
        "source = { kind = \"inline\", records = [{ id = 1 }], limit = \"abc\" }\n",
    )?;
    fixture.write()?;
    dataplug(&fixture)?
        .args(["source", "users"])
        .assert()
        .code(64)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "Invalid \"limit\" value: failed to parse \"abc\" as integer",
        ));
    Ok(())
}

#[test]
fn negative_counts_exit_64() -> Result<(), Box<dyn Error>> {
    let fixture = CatalogFixture::new()?
        .collection(
            "preset",
            None,
            "source = { kind = \"inline\", records = [{ id = 1 }], limit = -1 }\n",
        )?
        .collection(
            "users",
            None,
            "source = { kind = \"inline\", records = [{ id = 1 }] }\n",
        )?;
    fixture.write()?;
    dataplug(&fixture)?
        .args(["collections"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("integer >= 0"));

    let fixture = CatalogFixture::new()?.collection(
        "users",
        None,
        "source = { kind = \"inline\", records = [{ id = 1 }] }\n",
    )?;
    fixture.write()?;
    dataplug(&fixture)?
        .args(["source", "users", "-s", "limit=-2"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("integer >= 0"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn interrupt_with_open_stdin_closes_output_and_exits() -> Result<(), Box<dyn Error>> {
    let fixture = things(schemas::integer_a())?;
    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("dataplug"))
        .arg("--collections")
        .arg(fixture.path())
        .args(["filter", "things"])
        .env_remove("DATAPLUG_COLLECTIONS")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    // Keep stdin open so the next read stays pending.
    let mut stdin = child.stdin.take().ok_or("stdin not captured")?;
    stdin.write_all(br#"[{"a":1},"#)?;
    stdin.flush()?;
    thread::sleep(Duration::from_millis(500));

    let sent = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()?;
    assert!(sent.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() > deadline {
            child.kill()?;
            panic!("dataplug still running after SIGINT");
        }
        thread::sleep(Duration::from_millis(20));
    };
    drop(stdin);

    assert_eq!(status.code(), Some(0));
    let mut stdout = String::new();
    child
        .stdout
        .take()
        .ok_or("stdout not captured")?
        .read_to_string(&mut stdout)?;
    assert_eq!(stdout, "[{\"a\":1}]\n");
    Ok(())
}
