//! Hot reload: new services and plugins join a running pool.

mod support;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use procvisor::{Pool, fill_defaults, load_config};
use support::{Kind, Recorder, shell_service};

fn write_config(path: &Path, reload: bool, services: &[&str]) {
    let mut yaml = format!("assist:\n  configReload: {reload}\nservices:\n");
    for name in services {
        yaml.push_str(&format!(
            "- label: {name}\n  command: sh\n  args: [\"-c\", \"sleep 3600\"]\n  stop_timeout: 1s\n"
        ));
    }
    std::fs::write(path, yaml).unwrap();
}

#[tokio::test]
async fn config_change_hot_adds_only_new_services() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("procvisor.yml");
    write_config(&path, true, &["alpha"]);

    let config = load_config(&[path.clone()]).unwrap();
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;

    let root = CancellationToken::new();
    let run = tokio::spawn({
        let pool = pool.clone();
        let root = root.clone();
        let path = path.clone();
        async move { config.run(&pool, &root, Some(path)).await }
    });

    assert!(
        recorder
            .wait_until(Duration::from_secs(10), |records| {
                records
                    .iter()
                    .any(|r| r.kind == Kind::Started && r.service == "alpha")
            })
            .await
    );

    write_config(&path, true, &["alpha", "beta"]);
    assert!(
        recorder
            .wait_until(Duration::from_secs(10), |records| {
                records
                    .iter()
                    .any(|r| r.kind == Kind::Started && r.service == "beta")
            })
            .await,
        "hot-added service never started"
    );

    // The existing service was not restarted.
    assert_eq!(recorder.count(Kind::Spawned, "alpha"), 1);
    assert_eq!(recorder.count(Kind::Spawned, "beta"), 1);

    root.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn switching_reload_off_stops_accepting_additions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("procvisor.yml");
    write_config(&path, true, &["alpha"]);

    let config = load_config(&[path.clone()]).unwrap();
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;

    let root = CancellationToken::new();
    let run = tokio::spawn({
        let pool = pool.clone();
        let root = root.clone();
        let path = path.clone();
        async move { config.run(&pool, &root, Some(path)).await }
    });

    assert!(
        recorder
            .wait_until(Duration::from_secs(10), |records| {
                records
                    .iter()
                    .any(|r| r.kind == Kind::Started && r.service == "alpha")
            })
            .await
    );

    write_config(&path, false, &["alpha"]);
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Additions after the switch-off are ignored.
    write_config(&path, true, &["alpha", "gamma"]);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.count(Kind::Spawned, "gamma"), 0);

    root.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn submitted_supervisor_joins_the_running_pool() {
    let recorder = Recorder::new();
    let pool = Pool::new();
    pool.watch(recorder.clone()).await;
    pool.enable_hot_reload();

    let mut alpha = shell_service("alpha", "sleep 3600");
    alpha.restart = -1;
    pool.add(Arc::new(alpha)).await;

    let root = CancellationToken::new();
    let run = tokio::spawn({
        let pool = pool.clone();
        let root = root.clone();
        async move { pool.start_all(&root).await }
    });

    assert!(
        recorder
            .wait_until(Duration::from_secs(5), |records| {
                records.iter().any(|r| r.kind == Kind::Started)
            })
            .await
    );

    let mut beta = shell_service("beta", "sleep 3600");
    fill_defaults(&mut beta);
    let beta = Arc::new(beta);
    pool.add(Arc::clone(&beta)).await;
    pool.reload_handle().submit(beta).await.unwrap();

    assert!(
        recorder
            .wait_until(Duration::from_secs(5), |records| {
                records
                    .iter()
                    .any(|r| r.kind == Kind::Started && r.service == "beta")
            })
            .await
    );
    assert_eq!(pool.instances().await.len(), 2);

    root.cancel();
    run.await.unwrap();
    pool.terminate().await;
}
