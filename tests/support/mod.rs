//! Shared helpers for the runtime scenario tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use procvisor::{Handler, RunError, Runnable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Spawned,
    Started,
    Stopped,
    Finished,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub kind: Kind,
    pub service: String,
    pub error: Option<String>,
}

/// Handler that records every lifecycle transition it observes.
#[derive(Default)]
pub struct Recorder {
    records: Mutex<Vec<Record>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, kind: Kind, instance: &Arc<Runnable>, error: Option<String>) {
        self.records.lock().unwrap().push(Record {
            kind,
            service: instance.spec().name.clone(),
            error,
        });
    }

    pub fn snapshot(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, service: &str) -> Vec<Kind> {
        self.snapshot()
            .into_iter()
            .filter(|record| record.service == service)
            .map(|record| record.kind)
            .collect()
    }

    pub fn count(&self, kind: Kind, service: &str) -> usize {
        self.kinds_for(service)
            .into_iter()
            .filter(|k| *k == kind)
            .count()
    }

    /// Polls until `predicate` holds or `timeout` elapses.
    pub async fn wait_until<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&[Record]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if predicate(&self.snapshot()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Handler for Recorder {
    async fn on_spawned(&self, instance: &Arc<Runnable>) {
        self.push(Kind::Spawned, instance, None);
    }

    async fn on_started(&self, instance: &Arc<Runnable>) {
        self.push(Kind::Started, instance, None);
    }

    async fn on_stopped(&self, instance: &Arc<Runnable>, error: Option<&RunError>) {
        self.push(Kind::Stopped, instance, error.map(|err| err.to_string()));
    }

    async fn on_finished(&self, instance: &Arc<Runnable>) {
        self.push(Kind::Finished, instance, None);
    }
}

/// Service definition running an inline shell script.
pub fn shell_service(name: &str, script: &str) -> procvisor::Executable {
    let mut service = procvisor::Executable::new("sh")
        .arg("-c")
        .arg(script)
        .with_name(name);
    service.restart_timeout = Duration::from_millis(10);
    service.stop_timeout = Duration::from_secs(1);
    service
}
