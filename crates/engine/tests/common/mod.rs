#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tether_engine::{BackendRegistry, BindingContext, InMemoryBackend, QueryBackend};
use tether_types::{QueryDescriptor, QueryResponse, QuerySubject, Record};
use tokio::sync::oneshot;

pub const PEOPLE: &str = include_str!("../data/people.yaml");

/// Backend wrapper that counts calls, keeps the queries it saw, and can hold
/// each call until the test releases it.
pub struct StubBackend {
    inner: InMemoryBackend,
    calls: AtomicUsize,
    queries: Mutex<Vec<QueryDescriptor>>,
    gates: Mutex<Vec<(Option<String>, oneshot::Receiver<()>)>>,
    failure: Mutex<Option<String>>,
}

impl StubBackend {
    pub fn people() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryBackend::from_fixture_str(PEOPLE).expect("people fixture"),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            gates: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<QueryDescriptor> {
        self.queries.lock().expect("queries lock").clone()
    }

    /// Holds the next call until the returned sender fires (or is dropped).
    pub fn gate(&self) -> oneshot::Sender<()> {
        self.push_gate(None)
    }

    /// Holds the next call whose subject is entity `id`.
    pub fn gate_for(&self, id: &str) -> oneshot::Sender<()> {
        self.push_gate(Some(id.to_string()))
    }

    fn push_gate(&self, subject: Option<String>) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates.lock().expect("gates lock").push((subject, gate));
        release
    }

    fn take_gate(&self, query: &QueryDescriptor) -> Option<oneshot::Receiver<()>> {
        let subject = match query.subject() {
            Some(QuerySubject::Entity(entity)) => Some(entity.id().to_string()),
            _ => None,
        };
        let mut gates = self.gates.lock().expect("gates lock");
        let position = gates.iter().position(|(id, _)| id.is_none() || *id == subject)?;
        Some(gates.remove(position).1)
    }

    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().expect("failure lock") = Some(message.to_string());
    }

    pub fn context(self: &Arc<Self>) -> BindingContext {
        BindingContext::new(self.inner.catalog().clone(), BackendRegistry::with_default(self.clone()))
    }
}

#[async_trait]
impl QueryBackend for StubBackend {
    async fn select_query(&self, query: QueryDescriptor) -> Result<QueryResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().expect("queries lock").push(query.clone());
        if let Some(gate) = self.take_gate(&query) {
            let _ = gate.await;
        }
        if let Some(message) = self.failure.lock().expect("failure lock").take() {
            bail!(BackendDown(message));
        }
        self.inner.select_query(query).await
    }
}

/// Error type the stub fails with, so tests can downcast it.
#[derive(Debug, thiserror::Error)]
#[error("backend down: {0}")]
pub struct BackendDown(pub String);

pub fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().expect("object literal")
}
