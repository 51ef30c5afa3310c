mod support;

use predicates::str::contains;
use support::TestBoard;
use taskboard::config::Config;
use taskboard::model::Table;
use taskboard::Error;

#[test]
fn load_from_dir_without_a_file_uses_defaults() {
    let board = TestBoard::new();
    let config = Config::load_from_dir(board.path());
    assert_eq!(config.view.sort_key, "promise_date");
    assert_eq!(config.tasks.promise_days, 2);
    assert!(config.store.is_none());
}

#[test]
fn explicit_load_reports_invalid_files() {
    let board = TestBoard::new();
    let path = board.write_config("[tasks]\npromise_days = 400\n");
    let err = Config::load(&path).expect_err("invalid config");
    assert!(matches!(err, Error::InvalidConfig(_)));

    let path = board.write_config("[view\n");
    let err = Config::load(&path).expect_err("malformed toml");
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn task_defaults_come_from_config() {
    let board = TestBoard::new();
    board.init();
    board.write_config(
        "[tasks]\ndefault_priority = \"Urgent\"\ndefault_status = \"In Progress\"\npromise_days = 0\n",
    );

    board.json_data(&["task", "add", "Hotfix", "--owner", "Ravi"]);
    let rows = board.rows(Table::Tasks);
    assert_eq!(rows[0]["priority"], "Urgent");
    assert_eq!(rows[0]["status"], "In Progress");
    assert_eq!(rows[0]["promise_date"], rows[0]["assigned_date"]);
}

#[test]
fn configured_sort_applies_until_overridden() {
    let board = TestBoard::new();
    board.init();
    board.write_config("[view]\nsort_key = \"owner\"\nsort_order = \"desc\"\n");
    for owner in ["Asha", "Ravi", "Meera"] {
        board.json_data(&["task", "add", "Review", "--owner", owner]);
    }

    let owners = |args: &[&str]| -> Vec<String> {
        board.json_data(args)["tasks"]
            .as_array()
            .expect("tasks")
            .iter()
            .filter_map(|task| task["owner"].as_str().map(str::to_string))
            .collect()
    };
    assert_eq!(owners(&["task", "list"]), vec!["Ravi", "Meera", "Asha"]);
    assert_eq!(
        owners(&["task", "list", "--sort", "owner"]),
        vec!["Asha", "Meera", "Ravi"]
    );
}

#[test]
fn invalid_implicit_config_falls_back_to_defaults() {
    let board = TestBoard::new();
    board.init();
    board.write_config("[view]\nlayout = \"spiral\"\n");
    board
        .cmd()
        .args(["task", "list"])
        .assert()
        .success()
        .stderr(contains("ignoring invalid config"));
}
