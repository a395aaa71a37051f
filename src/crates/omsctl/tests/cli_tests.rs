//! Argument handling and dispatch

mod common;

use common::TestProject;
use omsctl::cli::{parse_args, run, Command};
use omsctl::init::CONFIG_FILE;
use omsctl::testing::StaticEnv;
use omsctl::{ConfigLoader, OmsConfig};

#[tokio::test]
async fn test_help_paths_succeed_without_running_anything() {
    let project = TestProject::new();

    for args in [
        vec!["omsctl"],
        vec!["omsctl", "help"],
        vec!["omsctl", "--help"],
        vec!["omsctl", "launch-rockets"],
        vec!["omsctl", "start", "--bogus"],
    ] {
        let cli = parse_args(args.clone());
        assert_eq!(cli.selected(), Command::Help, "{:?}", args);
        run(&cli, project.builder()).await.unwrap();
    }

    assert!(project.runner.is_empty());
}

#[tokio::test]
async fn test_help_does_not_load_configuration() {
    let project = TestProject::new();
    std::fs::write(project.dir.path().join(CONFIG_FILE), "not = [valid").unwrap();

    let cli = parse_args(["omsctl"]);
    let builder = omsctl::ContextBuilder::new().with_root(project.dir.path());

    run(&cli, builder).await.unwrap();
}

#[tokio::test]
async fn test_init_writes_loadable_config() {
    let project = TestProject::new();

    let cli = parse_args(["omsctl", "init"]);
    run(&cli, project.builder()).await.unwrap();

    let written = project.dir.path().join(CONFIG_FILE);
    assert!(written.exists());
    let config = ConfigLoader::new(project.dir.path())
        .with_user_config_path(None)
        .load(&StaticEnv::new())
        .await
        .unwrap();
    assert_eq!(config.aws.table_name, OmsConfig::default().aws.table_name);

    let again = run(&cli, project.builder()).await;
    assert!(again.is_err());
    let forced = parse_args(["omsctl", "init", "--force"]);
    run(&forced, project.builder()).await.unwrap();
}

#[tokio::test]
async fn test_stop_dispatches_through_run() {
    let project = TestProject::new();

    let cli = parse_args(["omsctl", "stop"]);
    run(&cli, project.builder()).await.unwrap();

    assert!(project.runner.is_empty());
}

#[tokio::test]
async fn test_status_reads_without_side_effects() {
    let project = TestProject::new();

    let cli = parse_args(["omsctl", "status", "--json"]);
    run(&cli, project.builder()).await.unwrap();

    assert!(project.runner.is_empty());
    assert!(!project.dir.path().join(".oms-pids").exists());
}
