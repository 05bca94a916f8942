//! Remote-service collaborator contract.
//!
//! Every org operation goes through [`RemoteService`]; the bridge and the
//! completion actions only ever see a [`RemoteResponse`]. Transport failures
//! are `Err` from the trait method; application failures travel inside the
//! response as a status code of 400 or higher.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Structured outcome of one remote call: the transport status plus whatever
/// JSON body the org returned. This is the payload a worker writes into its
/// result slot.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status_code: u16,
    pub body: Value,
}

impl RemoteResponse {
    pub fn new(status_code: u16, body: Value) -> Self {
        Self { status_code, body }
    }

    /// Application-level failure carried inside a populated slot.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }

    /// Best-effort error text for user-facing dialogs. Salesforce errors come
    /// either as an object or as a one-element array of objects.
    pub fn error_detail(&self) -> String {
        let obj = match &self.body {
            Value::Array(items) => items.first(),
            other => Some(other),
        };
        let (code, message) = match obj {
            Some(Value::Object(map)) => (
                map.get("errorCode").and_then(Value::as_str),
                map.get("message").and_then(Value::as_str),
            ),
            _ => (None, None),
        };
        match (code, message) {
            (Some(c), Some(m)) => format!("{}\n{}", c, m),
            (None, Some(m)) => m.to_string(),
            _ => format!("Request failed with status {}", self.status_code),
        }
    }

    /// `records` array of a query response, empty when absent.
    pub fn records(&self) -> Vec<Value> {
        self.body
            .get("records")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// `sobjects` array of a global describe, empty when absent.
    pub fn sobjects(&self) -> Vec<Value> {
        self.body
            .get("sobjects")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_size(&self) -> Option<u64> {
        self.body.get("totalSize").and_then(Value::as_u64)
    }

    /// Base64-encoded zip payload of a metadata retrieve.
    pub fn zip_file(&self) -> Option<&str> {
        self.body.get("zipFile").and_then(Value::as_str)
    }
}

/// The remote org, treated as an opaque collaborator. One method per worker
/// operation; each performs a single blocking (from the worker's point of
/// view) round trip.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Run one SOQL query.
    async fn query(&self, soql: &str) -> Result<RemoteResponse>;

    /// Run a SOQL query and follow pagination until all records are in.
    /// `tooling` selects the Tooling API query endpoint.
    async fn query_all(&self, soql: &str, tooling: bool) -> Result<RemoteResponse>;

    /// Global describe: every sobject in the org.
    async fn describe_global(&self) -> Result<RemoteResponse>;

    /// Names of the commonly used (createable, non-deprecated) sobjects.
    async fn common_sobject_names(&self) -> Result<Vec<String>>;

    /// Full field describe of one sobject.
    async fn describe_sobject(&self, sobject: &str) -> Result<RemoteResponse>;

    /// Page layout describe for one sobject/record type pair.
    async fn describe_layout(&self, sobject: &str, recordtype_id: &str) -> Result<RemoteResponse>;

    /// Field describes for every common sobject, for the completion map.
    async fn describe_common_sobjects(&self) -> Result<Vec<RemoteResponse>>;

    /// Execute an anonymous Apex block.
    async fn execute_anonymous(&self, apex: &str) -> Result<RemoteResponse>;

    /// Run the tests of one Apex class.
    async fn run_test(&self, class_id: &str) -> Result<RemoteResponse>;

    /// Retrieve the org's objects and workflows as a base64 zip bundle.
    async fn retrieve_all(&self) -> Result<RemoteResponse>;

    /// Fetch metadata (id, URL, body) for every component of the given types.
    /// The body maps component key to its metadata object.
    async fn refresh_components(&self, component_types: &[String]) -> Result<RemoteResponse>;

    /// Raw GET of an org-relative path.
    async fn get(&self, path: &str) -> Result<RemoteResponse>;

    /// Raw POST of a JSON body to an org-relative path.
    async fn post(&self, path: &str, body: Value) -> Result<RemoteResponse>;

    /// Raw PATCH of a JSON body to an org-relative path.
    async fn patch(&self, path: &str, body: Value) -> Result<RemoteResponse>;

    /// Raw DELETE of an org-relative path.
    async fn delete(&self, path: &str) -> Result<RemoteResponse>;
}
