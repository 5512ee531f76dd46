// Matrix run integration tests
// End-to-end: parse a description, expand, execute, observe events

use lattice_core::{
    progress_channel, ConfigParser, DryRunUploader, ExecutionEvent, JobStatus, RunContext,
    RunExecutor, RunTrigger, Stage, StageStatus,
};

use std::collections::HashMap;
use std::sync::Arc;

fn branch_ctx(dir: &std::path::Path) -> RunContext {
    RunContext::new(RunTrigger::Branch, dir)
}

#[tokio::test]
async fn full_run_emits_ordered_events_per_job() {
    let config = ConfigParser::parse_and_validate(
        r#"
project: myproj
matrix:
  - os: linux
    channel: stable
  - os: linux
    channel: nightly
install:
  - echo installing
script:
  - echo testing
"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = progress_channel();

    let executor = RunExecutor::new(config).with_progress(tx);
    let result = executor.execute(branch_ctx(dir.path())).await.unwrap();

    assert!(result.success);
    assert_eq!(result.jobs.len(), 2);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(
        events.first(),
        Some(ExecutionEvent::RunStarted { total_jobs: 2, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(ExecutionEvent::RunCompleted { success: true, .. })
    ));

    // Within each job the install stage starts before the script stage.
    for job_name in ["linux/stable", "linux/nightly"] {
        let stage_starts: Vec<Stage> = events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::StageStarted { job_name: j, stage } if j == job_name => {
                    Some(*stage)
                }
                _ => None,
            })
            .collect();
        assert_eq!(stage_starts, vec![Stage::Install, Stage::Script]);
    }
}

#[tokio::test]
async fn stage_commands_run_in_working_dir_with_job_env() {
    let config = ConfigParser::parse(
        r#"
project: myproj
env:
  HOST: x86_64-unknown-linux-gnu
matrix:
  - os: linux
    channel: stable
    target: x86_64-unknown-linux-musl
script:
  - echo "$CI_OS_NAME $CI_RUST_VERSION $TARGET" > probe.txt
"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let result = RunExecutor::new(config)
        .execute(branch_ctx(dir.path()))
        .await
        .unwrap();

    assert!(result.success);
    let probe = std::fs::read_to_string(dir.path().join("probe.txt")).unwrap();
    assert!(probe.contains("linux"));
    assert!(probe.contains("stable"));
    assert!(probe.contains("x86_64-unknown-linux-musl"));
}

#[tokio::test]
async fn failed_mandatory_stage_fails_run_but_not_siblings() {
    let config = ConfigParser::parse(
        r#"
project: myproj
matrix:
  - os: linux
    channel: stable
    script:
      - exit 5
  - os: linux
    channel: nightly
script:
  - echo ok
"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let result = RunExecutor::new(config)
        .execute(branch_ctx(dir.path()))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code(), 1);

    let failed = &result.jobs[0];
    assert_eq!(failed.status, JobStatus::Failed);
    let stage = failed.failed_stage().unwrap();
    assert_eq!(stage.stage, Stage::Script);
    assert_eq!(stage.exit_code, Some(5));

    assert_eq!(result.jobs[1].status, JobStatus::Succeeded);
}

#[tokio::test]
async fn tag_run_deploys_only_gated_jobs() {
    let config = ConfigParser::parse_and_validate(
        r#"
project: myproj
matrix:
  - os: linux
    channel: stable
    target: x86_64-unknown-linux-musl
  - os: linux
    channel: nightly
    target: x86_64-unknown-linux-gnu
  - os: linux
    channel: stable
script:
  - echo build
deploy:
  provider: github
  api_key_env: LATTICE_IT_DEPLOY_KEY
  on:
    channel: stable
    tags: true
"#,
    )
    .unwrap();

    std::env::set_var("LATTICE_IT_DEPLOY_KEY", "token");

    let dir = tempfile::tempdir().unwrap();
    let uploader = Arc::new(DryRunUploader::new());
    let ctx = RunContext::new(RunTrigger::Tag("v0.3.0".to_string()), dir.path());

    let result = RunExecutor::new(config)
        .with_uploader(uploader.clone())
        .execute(ctx)
        .await
        .unwrap();

    assert!(result.success);

    // Only the stable job with a target deploys.
    let requests = uploader.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].file_glob,
        "myproj-v0.3.0-x86_64-unknown-linux-musl.*"
    );

    let nightly_deploy = result.jobs[1]
        .stages
        .iter()
        .find(|s| s.stage == Stage::Deploy)
        .unwrap();
    assert_eq!(nightly_deploy.status, StageStatus::Skipped);

    let no_target_deploy = result.jobs[2]
        .stages
        .iter()
        .find(|s| s.stage == Stage::Deploy)
        .unwrap();
    assert_eq!(no_target_deploy.status, StageStatus::Skipped);
}

#[tokio::test]
async fn cli_style_variable_overlay_reaches_conditions() {
    let config = ConfigParser::parse(
        r#"
project: myproj
matrix:
  - os: linux
    channel: stable
script:
  - run: echo gated > gated.txt
    when: "$FEATURE = on"
  - echo always
"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut extra = HashMap::new();
    extra.insert("FEATURE".to_string(), "on".to_string());

    let result = RunExecutor::new(config)
        .with_extra_env(extra)
        .execute(branch_ctx(dir.path()))
        .await
        .unwrap();

    assert!(result.success);
    assert!(dir.path().join("gated.txt").exists());
}
