use std::io::Write;

use optbind_env::{EnvError, EnvLoader, EnvSource};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_env(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Precedence
// ---------------------------------------------------------------------------

#[test]
fn process_env_overrides_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_env(&dir, "app.env", "PATH=from-file\nOPTBIND_IT_ONLY_FILE=file\n");

    let mut loader = EnvLoader::new();
    loader.use_file(&path).unwrap();
    loader.load_all().unwrap();

    assert_ne!(loader.lookup("PATH"), Some("from-file"));
    assert_eq!(loader.lookup("OPTBIND_IT_ONLY_FILE"), Some("file"));
}

#[test]
fn files_apply_in_registration_order() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_env(&dir, "base.env", "LEVEL=base\nNAME=app\n");
    let local = write_env(&dir, "local.env", "LEVEL=local\n");

    let mut loader = EnvLoader::new();
    loader.use_env(false);
    loader.use_files([&base, &local]);
    loader.load_all().unwrap();
    assert_eq!(loader.lookup("LEVEL"), Some("local"));
    assert_eq!(loader.lookup("NAME"), Some("app"));

    let mut reversed = EnvLoader::new();
    reversed.use_env(false);
    reversed.use_files([&local, &base]);
    reversed.load_all().unwrap();
    assert_eq!(reversed.lookup("LEVEL"), Some("base"));
}

#[test]
fn quoted_values_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_env(
        &dir,
        "quoted.env",
        "# comment line\nGREETING=\"hello world\"\nEMPTY=\n",
    );

    let mut loader = EnvLoader::new();
    loader.use_env(false);
    loader.use_file(&path).unwrap();
    loader.load_all().unwrap();

    assert_eq!(loader.lookup("GREETING"), Some("hello world"));
    assert_eq!(loader.lookup("EMPTY"), Some(""));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn required_file_removed_before_load_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_env(&dir, "gone.env", "A=1\n");

    let mut loader = EnvLoader::new();
    loader.use_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let err = loader.load_all().unwrap_err();
    assert!(matches!(err, EnvError::FileNotFound(p) if p == path));
}

#[test]
fn malformed_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_env(&dir, "bad.env", "THIS IS NOT VALID\n");

    let mut loader = EnvLoader::new();
    loader.use_env(false);
    loader.use_file(&path).unwrap();

    let err = loader.load_all().unwrap_err();
    assert!(matches!(err, EnvError::Parse { .. }));
    assert!(err.to_string().contains("bad.env"));
}
