use std::{path::Path, process::Command};

fn chatbert(index_root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chatbert"));
    cmd.env_remove("CHATBERT_LOG")
        .env_remove("CHATBERT_MODEL")
        .env("CHATBERT_INDEX_ROOT", index_root);
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn status_on_empty_root() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;

    let output = chatbert(tmp.path()).arg("status").output()?;
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("No indexes found."));

    let output = chatbert(tmp.path()).args(["status", "--json"]).output()?;
    assert!(output.status.success());
    let manifests: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(manifests, serde_json::json!([]));
    Ok(())
}

#[test]
fn mine_without_index_exits_cleanly() -> Result<(), Box<dyn std::error::Error>>
{
    let tmp = tempfile::tempdir()?;

    let output = chatbert(tmp.path()).arg("mine").output()?;
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Index 'Me' not found at:"), "{stdout}");

    let output = chatbert(tmp.path())
        .args(["mine", "--battery", "frustrations"])
        .output()?;
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("Index 'PersonalConversation001' not found"));
    Ok(())
}

#[test]
fn search_without_index_fails() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let output = chatbert(tmp.path())
        .args(["search", "anything", "--index", "Missing"])
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Missing"));
    Ok(())
}

#[test]
fn index_with_no_input_files_fails() -> Result<(), Box<dyn std::error::Error>>
{
    let tmp = tempfile::tempdir()?;
    let data = tmp.path().join("data");
    std::fs::create_dir(&data)?;

    let output = chatbert(tmp.path())
        .args(["index", "--data-dir"])
        .arg(&data)
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no files matching"));
    Ok(())
}

#[test]
fn existing_index_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    std::fs::create_dir(tmp.path().join("Me"))?;

    let output = chatbert(tmp.path()).arg("index").output()?;
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("already exists"));
    Ok(())
}

#[test]
fn split_local_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let file = tmp.path().join("doc.txt");
    std::fs::write(&file, "studio ghibli was founded in 1985 ".repeat(20))?;

    let output = chatbert(tmp.path())
        .args(["split", "--max-tokens", "20", "--file"])
        .arg(&file)
        .output()?;
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Document length: 680 characters"));
    assert!(stdout.contains("--- Passage 1 ---"));
    assert!(stdout.contains("--- Passage 2 ---"));
    Ok(())
}
