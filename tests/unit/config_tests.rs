use std::collections::HashMap;
use std::time::Duration;

use agent_hitl::config::{CompletionMode, GlobalConfig};
use agent_hitl::AppError;

fn sample_toml(workspace: &str) -> String {
    format!(
        r#"
workspace_root = '{workspace}'
output_dir = "artifacts"
host_cli = "agent"
host_cli_args = ["--print", "--output-format", "stream-json"]
permission_mode = "bypassPermissions"
max_concurrent_sessions = 2

[conversation]
completion_mode = "continuous"
max_turns = 12
max_retries = 3
idle_timeout_seconds = 120
upload_files = false
file_exclusions = [".log"]
"#
    )
}

fn minimal_toml(workspace: &str) -> String {
    format!("workspace_root = '{workspace}'\n")
}

fn strip_unc(p: &std::path::Path) -> std::path::PathBuf {
    p.to_str()
        .and_then(|s| s.strip_prefix(r"\\?\"))
        .map_or_else(|| p.to_path_buf(), std::path::PathBuf::from)
}

#[test]
fn parses_valid_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = sample_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.host_cli, "agent");
    assert_eq!(config.max_concurrent_sessions, 2);
    assert_eq!(config.conversation.completion_mode, CompletionMode::Continuous);
    assert_eq!(config.conversation.max_turns, 12);
    assert_eq!(config.conversation.max_retries, 3);
    assert_eq!(config.conversation.idle_timeout(), Duration::from_secs(120));
    assert!(!config.conversation.upload_files);
    assert_eq!(config.conversation.file_exclusions, vec![".log"]);

    let expected_root = strip_unc(&temp.path().canonicalize().expect("canonicalize temp path"));
    assert_eq!(strip_unc(&config.workspace_root), expected_root);
}

#[test]
fn minimal_config_uses_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = minimal_toml(temp.path().to_str().expect("utf8 path"));

    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.host_cli, "claude");
    assert_eq!(config.permission_mode, "acceptEdits");
    assert_eq!(config.max_concurrent_sessions, 4);
    assert_eq!(config.conversation.completion_mode, CompletionMode::AutoComplete);
    assert_eq!(config.conversation.max_turns, 50);
    assert_eq!(config.conversation.max_retries, 1);
    assert_eq!(config.conversation.idle_timeout_seconds, 660);
    assert!(config.conversation.upload_files);
    assert!(config
        .conversation
        .file_exclusions
        .contains(&".py".to_owned()));
    assert!(config
        .conversation
        .file_exclusions
        .contains(&"__pycache__".to_owned()));
}

#[test]
fn rejects_missing_workspace_root_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("does-not-exist");
    let toml = minimal_toml(missing.to_str().expect("utf8 path"));

    let err = GlobalConfig::from_toml_str(&toml).unwrap_err();

    assert!(
        err.to_string().starts_with("config: workspace_root invalid"),
        "got {err}"
    );
}

#[test]
fn rejects_invalid_field_type() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "workspace_root = '{}'\nmax_concurrent_sessions = \"many\"\n",
        temp.path().to_str().expect("utf8")
    );

    let err = GlobalConfig::from_toml_str(&toml).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn rejects_unknown_completion_mode_in_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "workspace_root = '{}'\n[conversation]\ncompletion_mode = \"forever\"\n",
        temp.path().to_str().expect("utf8")
    );

    assert!(GlobalConfig::from_toml_str(&toml).is_err());
}

#[test]
fn rejects_zero_limits() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_str().expect("utf8");

    for (body, field) in [
        ("max_concurrent_sessions = 0\n", "max_concurrent_sessions"),
        ("[conversation]\nmax_turns = 0\n", "max_turns"),
        ("[conversation]\nidle_timeout_seconds = 0\n", "idle_timeout_seconds"),
    ] {
        let toml = format!("workspace_root = '{root}'\n{body}");
        let err = GlobalConfig::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains(field), "{field}: got {err}");
    }
}

#[test]
fn rejects_blank_host_cli() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        "workspace_root = '{}'\nhost_cli = \"  \"\n",
        temp.path().to_str().expect("utf8")
    );

    let err = GlobalConfig::from_toml_str(&toml).unwrap_err();
    assert!(err.to_string().contains("host_cli"));
}

#[test]
fn load_from_missing_path_is_a_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");

    let err = GlobalConfig::load_from_path(temp.path().join("absent.toml")).unwrap_err();

    assert!(err.to_string().starts_with("config: failed to read config"));
}

#[test]
fn load_from_path_reads_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, sample_toml(temp.path().to_str().expect("utf8"))).expect("write");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.conversation.max_turns, 12);
}

// ── Overrides ────────────────────────────────────────────────

fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn overrides_replace_conversation_policy() {
    let mut config = GlobalConfig::default();

    config.apply_overrides(overrides(&[
        ("COMPLETION_MODE", "Continuous"),
        ("UPLOAD_FILES", "FALSE"),
        ("MAX_TURNS", "7"),
    ]));

    assert_eq!(config.conversation.completion_mode, CompletionMode::Continuous);
    assert!(!config.conversation.upload_files);
    assert_eq!(config.conversation.max_turns, 7);
}

#[test]
fn invalid_overrides_keep_current_values() {
    let mut config = GlobalConfig::default();

    config.apply_overrides(overrides(&[
        ("COMPLETION_MODE", "sometimes"),
        ("UPLOAD_FILES", "maybe"),
        ("MAX_TURNS", "0"),
    ]));

    assert_eq!(config.conversation.completion_mode, CompletionMode::AutoComplete);
    assert!(config.conversation.upload_files);
    assert_eq!(config.conversation.max_turns, 50);

    config.apply_overrides(overrides(&[("MAX_TURNS", "lots")]));
    assert_eq!(config.conversation.max_turns, 50);
}

#[test]
fn absent_overrides_change_nothing() {
    let mut config = GlobalConfig::default();
    config.apply_overrides(|_| None);
    assert_eq!(config, GlobalConfig::default());
}

#[test]
#[serial_test::serial]
fn env_overrides_read_process_environment() {
    std::env::set_var("COMPLETION_MODE", "continuous");
    std::env::set_var("MAX_TURNS", "9");
    std::env::remove_var("UPLOAD_FILES");

    let mut config = GlobalConfig::default();
    config.apply_env_overrides();

    std::env::remove_var("COMPLETION_MODE");
    std::env::remove_var("MAX_TURNS");

    assert_eq!(config.conversation.completion_mode, CompletionMode::Continuous);
    assert_eq!(config.conversation.max_turns, 9);
    assert!(config.conversation.upload_files);
}

// ── Derived settings ─────────────────────────────────────────

#[test]
fn completion_mode_parses_case_insensitively() {
    assert_eq!(
        " AUTO-COMPLETE ".parse::<CompletionMode>().expect("parses"),
        CompletionMode::AutoComplete
    );
    assert_eq!(CompletionMode::Continuous.to_string(), "continuous");
    assert!(matches!(
        "never".parse::<CompletionMode>(),
        Err(AppError::Config(_))
    ));
}

#[test]
fn spawn_config_appends_permission_mode() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = sample_toml(temp.path().to_str().expect("utf8 path"));
    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    let spawn = config.spawn_config();

    assert_eq!(spawn.program, "agent");
    assert_eq!(
        spawn.args,
        vec![
            "--print",
            "--output-format",
            "stream-json",
            "--permission-mode",
            "bypassPermissions",
        ]
    );
    assert_eq!(spawn.workspace_root, config.workspace_root);
}

#[test]
fn spawn_config_omits_empty_permission_mode() {
    let config = GlobalConfig {
        permission_mode: String::new(),
        ..GlobalConfig::default()
    };

    let spawn = config.spawn_config();

    assert!(!spawn.args.iter().any(|a| a == "--permission-mode"));
    assert!(spawn.args.contains(&"--input-format".to_owned()));
}

#[test]
fn relative_output_dir_resolves_against_workspace() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = sample_toml(temp.path().to_str().expect("utf8 path"));
    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    assert_eq!(config.output_dir(), config.workspace_root.join("artifacts"));

    let absolute = temp.path().join("elsewhere");
    let config = GlobalConfig {
        output_dir: absolute.clone(),
        ..config
    };
    assert_eq!(config.output_dir(), absolute);
}

#[test]
fn registry_config_follows_limits() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = sample_toml(temp.path().to_str().expect("utf8 path"));
    let config = GlobalConfig::from_toml_str(&toml).expect("config parses");

    let registry = config.registry_config();

    assert_eq!(registry.max_concurrent_sessions, 2);
    assert_eq!(registry.idle_timeout, Duration::from_secs(120));
}
