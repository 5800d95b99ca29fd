use std::process::Command;
use tempfile::TempDir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_collection-watch"))
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = bin()
        .current_dir(temp_dir.path())
        .arg("init")
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());

    let config_path = temp_dir.path().join("collection-watch.toml");
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[watch]"));
    assert!(content.contains("debounce_ms = 50"));

    // Second init without --force refuses
    let again = bin()
        .current_dir(temp_dir.path())
        .arg("init")
        .output()
        .unwrap();
    assert!(!again.status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("custom.toml"),
        "[watch]\ndebounce_ms = 120\n",
    )
    .unwrap();

    let output = bin()
        .current_dir(temp_dir.path())
        .args(["--config", "custom.toml", "config"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("debounce_ms = 120"));
    assert!(stdout.contains("api:content-structure:*"));
}

#[cfg(unix)]
#[test]
fn test_compile_command_runs_configured_compiler() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("config/collections")).unwrap();
    std::fs::write(
        temp_dir.path().join("collection-watch.toml"),
        r#"
[commands]
compile = ["sh", "-c", "mkdir -p \"$1\" && touch \"$1/compiled\"", "compile", "{output}"]
"#,
    )
    .unwrap();

    let output = bin()
        .current_dir(temp_dir.path())
        .arg("compile")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        temp_dir
            .path()
            .join("compiledCollections/compiled")
            .exists()
    );
}

#[cfg(unix)]
#[test]
fn test_compile_command_failure_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("collection-watch.toml"),
        "[commands]\ncompile = [\"sh\", \"-c\", \"echo bad schema >&2; exit 1\"]\n",
    )
    .unwrap();

    let output = bin()
        .current_dir(temp_dir.path())
        .arg("compile")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad schema"));
}
