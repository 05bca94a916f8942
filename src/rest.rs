//! REST implementation of the remote-service collaborator.
//!
//! Thin by design: every method is one round trip (plus pagination) that
//! lands in a [`RemoteResponse`]. The bridge and the completion actions never
//! see reqwest types.

use crate::api::{RemoteResponse, RemoteService};
use crate::session::SessionConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Reqwest-backed client for one org session.
pub struct RestClient {
    http: reqwest::Client,
    instance_url: String,
    access_token: String,
    data_path: String,
}

impl RestClient {
    pub fn new(session: &SessionConfig) -> Result<Self> {
        session.validate_for_remote()?;
        Ok(Self {
            http: reqwest::Client::new(),
            instance_url: session.instance_url.trim_end_matches('/').to_string(),
            access_token: session.access_token.clone(),
            data_path: session.data_path(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.instance_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RemoteResponse> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("org request failed")?;
        let status_code = response.status().as_u16();
        // DELETE and some PATCH calls return 204 with an empty body.
        let text = response.text().await.unwrap_or_default();
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(RemoteResponse::new(status_code, body))
    }

    async fn get_path(&self, path: &str) -> Result<RemoteResponse> {
        self.send(self.http.get(self.url(path))).await
    }
}

/// Query endpoint path for the data or tooling API.
pub(crate) fn query_path(data_path: &str, tooling: bool) -> String {
    if tooling {
        format!("{}/tooling/query/", data_path)
    } else {
        format!("{}/query/", data_path)
    }
}

/// The field a component type keeps its source in.
pub fn component_body_field(component_type: &str) -> &'static str {
    match component_type {
        "ApexPage" | "ApexComponent" => "Markup",
        _ => "Body",
    }
}

#[async_trait]
impl RemoteService for RestClient {
    async fn query(&self, soql: &str) -> Result<RemoteResponse> {
        let path = query_path(&self.data_path, false);
        self.send(self.http.get(self.url(&path)).query(&[("q", soql)]))
            .await
    }

    async fn query_all(&self, soql: &str, tooling: bool) -> Result<RemoteResponse> {
        let path = query_path(&self.data_path, tooling);
        let mut response = self
            .send(self.http.get(self.url(&path)).query(&[("q", soql)]))
            .await?;
        if response.is_error() {
            return Ok(response);
        }

        // Follow nextRecordsUrl until the org reports done.
        let mut records = response.records();
        loop {
            let next = response
                .body
                .get("nextRecordsUrl")
                .and_then(Value::as_str)
                .map(str::to_string);
            match next {
                Some(next_path) => {
                    response = self.get_path(&next_path).await?;
                    if response.is_error() {
                        return Ok(response);
                    }
                    records.extend(response.records());
                }
                None => break,
            }
        }

        let total = records.len();
        Ok(RemoteResponse::new(
            response.status_code,
            json!({"totalSize": total, "done": true, "records": records}),
        ))
    }

    async fn describe_global(&self) -> Result<RemoteResponse> {
        self.get_path(&format!("{}/sobjects", self.data_path)).await
    }

    async fn common_sobject_names(&self) -> Result<Vec<String>> {
        let response = self.describe_global().await?;
        if response.is_error() {
            anyhow::bail!("global describe failed: {}", response.error_detail());
        }
        let names = response
            .sobjects()
            .iter()
            .filter(|s| {
                s.get("createable").and_then(Value::as_bool).unwrap_or(false)
                    && s.get("queryable").and_then(Value::as_bool).unwrap_or(false)
            })
            .filter_map(|s| s.get("name").and_then(Value::as_str).map(str::to_string))
            .collect();
        Ok(names)
    }

    async fn describe_sobject(&self, sobject: &str) -> Result<RemoteResponse> {
        self.get_path(&format!("{}/sobjects/{}/describe", self.data_path, sobject))
            .await
    }

    async fn describe_layout(&self, sobject: &str, recordtype_id: &str) -> Result<RemoteResponse> {
        self.get_path(&format!(
            "{}/sobjects/{}/describe/layouts/{}",
            self.data_path, sobject, recordtype_id
        ))
        .await
    }

    async fn describe_common_sobjects(&self) -> Result<Vec<RemoteResponse>> {
        let names = self.common_sobject_names().await?;
        let mut describes = Vec::with_capacity(names.len());
        for name in names {
            describes.push(self.describe_sobject(&name).await?);
        }
        Ok(describes)
    }

    async fn execute_anonymous(&self, apex: &str) -> Result<RemoteResponse> {
        let path = format!("{}/tooling/executeAnonymous/", self.data_path);
        self.send(
            self.http
                .get(self.url(&path))
                .query(&[("anonymousBody", apex)]),
        )
        .await
    }

    async fn run_test(&self, class_id: &str) -> Result<RemoteResponse> {
        let path = format!("{}/tooling/runTestsSynchronous/", self.data_path);
        self.send(
            self.http
                .post(self.url(&path))
                .json(&json!({"tests": [{"classId": class_id}]})),
        )
        .await
    }

    async fn retrieve_all(&self) -> Result<RemoteResponse> {
        // Retrieve of the objects-and-workflows bundle, exposed by the org
        // middleware as a single call returning a base64 zipFile.
        let path = format!("{}/metadata/retrieve", self.data_path);
        self.send(self.http.post(self.url(&path)).json(&json!({
            "unpackaged": {"types": [
                {"members": ["*"], "name": "CustomObject"},
                {"members": ["*"], "name": "Workflow"},
            ]}
        })))
        .await
    }

    async fn refresh_components(&self, component_types: &[String]) -> Result<RemoteResponse> {
        let mut components = Map::new();
        for component_type in component_types {
            let soql = format!(
                "SELECT Id, Name FROM {} WHERE NamespacePrefix = null",
                component_type
            );
            let response = self.query_all(&soql, true).await?;
            if response.is_error() {
                return Ok(response);
            }
            for record in response.records() {
                let (Some(id), Some(name)) = (
                    record.get("Id").and_then(Value::as_str),
                    record.get("Name").and_then(Value::as_str),
                ) else {
                    continue;
                };
                let key = format!("{}{}", component_type, name);
                components.insert(
                    key,
                    json!({
                        "component_id": id,
                        "component_url": format!(
                            "{}/tooling/sobjects/{}/{}",
                            self.data_path, component_type, id
                        ),
                        "component_type": component_type,
                        "body_field": component_body_field(component_type),
                    }),
                );
            }
        }
        Ok(RemoteResponse::new(200, Value::Object(components)))
    }

    async fn get(&self, path: &str) -> Result<RemoteResponse> {
        self.get_path(path).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<RemoteResponse> {
        self.send(self.http.post(self.url(path)).json(&body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<RemoteResponse> {
        self.send(self.http.patch(self.url(path)).json(&body)).await
    }

    async fn delete(&self, path: &str) -> Result<RemoteResponse> {
        self.send(self.http.delete(self.url(path))).await
    }
}
