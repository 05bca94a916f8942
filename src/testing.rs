//! Test doubles shared by the unit tests.

use crate::api::{RemoteResponse, RemoteService};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted remote service: calls pop queued outcomes in order and are
/// recorded by method name. An empty queue behaves like a transport failure,
/// which matches a worker dying with its slot unpopulated.
#[derive(Default)]
pub struct MockService {
    queue: Mutex<VecDeque<Result<RemoteResponse>>>,
    describe_batch: Mutex<Vec<RemoteResponse>>,
    common_names: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: RemoteResponse) {
        self.queue.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_transport_error(&self, message: &str) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!("{}", message.to_string())));
    }

    pub fn set_describe_batch(&self, describes: Vec<RemoteResponse>) {
        *self.describe_batch.lock().unwrap() = describes;
    }

    pub fn set_common_names(&self, names: Vec<String>) {
        *self.common_names.lock().unwrap() = names;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn take(&self, call: String) -> Result<RemoteResponse> {
        self.calls.lock().unwrap().push(call.clone());
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response for {}", call)))
    }
}

#[async_trait]
impl RemoteService for MockService {
    async fn query(&self, soql: &str) -> Result<RemoteResponse> {
        self.take(format!("query:{}", soql))
    }

    async fn query_all(&self, soql: &str, tooling: bool) -> Result<RemoteResponse> {
        self.take(format!("query_all:{}:{}", tooling, soql))
    }

    async fn describe_global(&self) -> Result<RemoteResponse> {
        self.take("describe_global".to_string())
    }

    async fn common_sobject_names(&self) -> Result<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .push("common_sobject_names".to_string());
        Ok(self.common_names.lock().unwrap().clone())
    }

    async fn describe_sobject(&self, sobject: &str) -> Result<RemoteResponse> {
        self.take(format!("describe_sobject:{}", sobject))
    }

    async fn describe_layout(&self, sobject: &str, recordtype_id: &str) -> Result<RemoteResponse> {
        self.take(format!("describe_layout:{}:{}", sobject, recordtype_id))
    }

    async fn describe_common_sobjects(&self) -> Result<Vec<RemoteResponse>> {
        self.calls
            .lock()
            .unwrap()
            .push("describe_common_sobjects".to_string());
        Ok(self.describe_batch.lock().unwrap().clone())
    }

    async fn execute_anonymous(&self, apex: &str) -> Result<RemoteResponse> {
        self.take(format!("execute_anonymous:{}", apex))
    }

    async fn run_test(&self, class_id: &str) -> Result<RemoteResponse> {
        self.take(format!("run_test:{}", class_id))
    }

    async fn retrieve_all(&self) -> Result<RemoteResponse> {
        self.take("retrieve_all".to_string())
    }

    async fn refresh_components(&self, component_types: &[String]) -> Result<RemoteResponse> {
        self.take(format!("refresh_components:{}", component_types.join(",")))
    }

    async fn get(&self, path: &str) -> Result<RemoteResponse> {
        self.take(format!("get:{}", path))
    }

    async fn post(&self, path: &str, body: Value) -> Result<RemoteResponse> {
        self.take(format!("post:{}:{}", path, body))
    }

    async fn patch(&self, path: &str, body: Value) -> Result<RemoteResponse> {
        self.take(format!("patch:{}:{}", path, body))
    }

    async fn delete(&self, path: &str) -> Result<RemoteResponse> {
        self.take(format!("delete:{}", path))
    }
}
