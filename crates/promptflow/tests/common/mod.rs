//! Shared test utilities for promptflow integration tests.
//!
//! This module provides:
//! - `MockInvoker`, a scripted capability that records every call
//! - Helpers for building configs and running them against the mock

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use promptflow::{
    execute_pipeline, CapabilityInvoker, ExecutionOptions, InvokeResult, Item,
    PipelineConfig, PipelineExecutionError, PipelineResult,
};

type Responder = dyn Fn(&str) -> InvokeResult + Send + Sync;
type Delay = dyn Fn(&str) -> Duration + Send + Sync;

/// A capability whose answers come from a closure over the rendered prompt.
pub struct MockInvoker {
    responder: Box<Responder>,
    delay: Option<Box<Delay>>,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockInvoker {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> InvokeResult + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answers with `response`.
    pub fn constant(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_| InvokeResult::ok(response.clone()))
    }

    /// Holds every call open for `delay` so calls overlap.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_by(move |_| delay)
    }

    /// Holds each call open for a prompt-dependent time.
    pub fn with_delay_by<F>(mut self, delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityInvoker for MockInvoker {
    async fn invoke(&self, prompt: &str) -> InvokeResult {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }
        let result = (self.responder)(prompt);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Parses a pipeline without validating it, so tests can hand malformed
/// configs to the executor.
pub fn config_from_yaml(yaml: &str) -> PipelineConfig {
    serde_yaml::from_str(yaml).expect("test config should parse")
}

pub async fn run(
    yaml: &str,
    invoker: Arc<MockInvoker>,
) -> Result<PipelineResult, PipelineExecutionError> {
    run_in(yaml, invoker, Path::new(".")).await
}

pub async fn run_in(
    yaml: &str,
    invoker: Arc<MockInvoker>,
    directory: &Path,
) -> Result<PipelineResult, PipelineExecutionError> {
    let config = config_from_yaml(yaml);
    execute_pipeline(&config, ExecutionOptions::new(invoker, directory)).await
}

/// Answers an AI filter prompt rendered from `{{id}}`: odd ids are included.
pub fn odd_id_verdict(prompt: &str) -> InvokeResult {
    match prompt.trim().parse::<i64>() {
        Ok(id) => InvokeResult::ok(format!(r#"{{"include": {}}}"#, id % 2 == 1)),
        Err(_) => InvokeResult::failed(format!("unexpected prompt: {}", prompt)),
    }
}

/// Ids of `items` as integers, in order.
pub fn ids(items: &[Item]) -> Vec<i64> {
    items
        .iter()
        .filter_map(|item| item.id().and_then(|id| id.as_number()))
        .map(|n| n as i64)
        .collect()
}
