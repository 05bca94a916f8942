//! Memoized org lookups, keyed by username.
//!
//! Each entry is populated at most once per username for the process
//! lifetime and never refreshed; these lookups back interactive pickers
//! where staleness is an accepted tradeoff. The cache is an owned object
//! passed by its composer, never process-global state.

use crate::api::{RemoteResponse, RemoteService};
use crate::bridge::{dispatch, PendingOperation};
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct OrgCache {
    classes: HashMap<String, HashMap<String, String>>,
    sobjects: HashMap<String, Vec<String>>,
    record_types: HashMap<String, HashMap<String, String>>,
    interval: Option<Duration>,
}

impl OrgCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Default::default()
        }
    }

    fn join(&self, mut op: PendingOperation<RemoteResponse>) -> Result<RemoteResponse> {
        if let Some(interval) = self.interval {
            op = op.with_interval(interval);
        }
        let response = op.join()?;
        if response.is_error() {
            anyhow::bail!("cache lookup failed: {}", response.error_detail());
        }
        Ok(response)
    }

    /// Apex class name to id for classes without a namespace prefix.
    pub fn classes(
        &mut self,
        api: Arc<dyn RemoteService>,
        username: &str,
    ) -> Result<&HashMap<String, String>> {
        if !self.classes.contains_key(username) {
            tracing::info!("Populating Apex class cache for {}", username);
            let op = dispatch(move || async move {
                api.query_all(
                    "SELECT Id, Name FROM ApexClass WHERE NamespacePrefix = null",
                    false,
                )
                .await
            });
            let response = self.join(op)?;
            let mut classes = HashMap::new();
            for record in response.records() {
                if let (Some(name), Some(id)) = (
                    record.get("Name").and_then(Value::as_str),
                    record.get("Id").and_then(Value::as_str),
                ) {
                    classes.insert(name.to_string(), id.to_string());
                }
            }
            self.classes.insert(username.to_string(), classes);
        }
        Ok(&self.classes[username])
    }

    /// All sobject names in the org.
    pub fn sobjects(
        &mut self,
        api: Arc<dyn RemoteService>,
        username: &str,
    ) -> Result<&Vec<String>> {
        if !self.sobjects.contains_key(username) {
            tracing::info!("Populating sobject cache for {}", username);
            let op = dispatch(move || async move { api.describe_global().await });
            let response = self.join(op)?;
            let names = response
                .sobjects()
                .iter()
                .filter_map(|s| s.get("name").and_then(Value::as_str).map(str::to_string))
                .collect();
            self.sobjects.insert(username.to_string(), names);
        }
        Ok(&self.sobjects[username])
    }

    /// `"SObject, RecordTypeName"` to record-type id across the org.
    pub fn record_types(
        &mut self,
        api: Arc<dyn RemoteService>,
        username: &str,
    ) -> Result<&HashMap<String, String>> {
        if !self.record_types.contains_key(username) {
            tracing::info!("Populating record type cache for {}", username);
            let op = dispatch(move || async move {
                api.query_all("SELECT Id, Name, SobjectType FROM RecordType", false)
                    .await
            });
            let response = self.join(op)?;
            let mut record_types = HashMap::new();
            for record in response.records() {
                if let (Some(sobject), Some(name), Some(id)) = (
                    record.get("SobjectType").and_then(Value::as_str),
                    record.get("Name").and_then(Value::as_str),
                    record.get("Id").and_then(Value::as_str),
                ) {
                    record_types.insert(format!("{}, {}", sobject, name), id.to_string());
                }
            }
            self.record_types.insert(username.to_string(), record_types);
        }
        Ok(&self.record_types[username])
    }
}
