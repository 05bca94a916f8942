//! Org operation handlers.
//!
//! Every handler follows the same shape: announce the wait, dispatch one
//! worker for the blocking org call, and wire a completion action onto the
//! returned poller. The host drives the poller ticks; the handler returns
//! immediately. Application errors (status 400+) surface through the shell,
//! transport failures through the per-handler failure message.

use crate::api::{RemoteResponse, RemoteService};
use crate::bridge::{dispatch, PendingOperation, Poller};
use crate::{bundle, format, messages, operation_log, report};
use crate::session::SessionConfig;
use crate::shell::EditorShell;
use crate::stores::{ComponentRecord, ComponentStore, CompletionStore, FieldMap};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Everything a handler needs: the collaborators plus the session.
#[derive(Clone)]
pub struct OpContext {
    pub api: Arc<dyn RemoteService>,
    pub shell: Arc<dyn EditorShell>,
    pub session: SessionConfig,
    pub components: Arc<Mutex<ComponentStore>>,
    pub completions: Arc<Mutex<CompletionStore>>,
}

impl OpContext {
    /// Apply the session's poll interval and wait budget to a fresh dispatch.
    fn configure<T>(&self, op: PendingOperation<T>) -> PendingOperation<T> {
        let mut op = op.with_interval(self.session.poll_interval());
        if let Some(deadline) = self.session.deadline() {
            op = op.with_deadline(deadline);
        }
        op
    }

    fn log(&self, operation: &str, details: &str) {
        let _ = operation_log::append_log(operation, &self.session.username, details);
    }
}

/// Pollers spawned by a completion action that fans out further dispatches.
pub type FanOutJobs = Arc<Mutex<Vec<Poller<PathBuf>>>>;

fn connect_failed(shell: Arc<dyn EditorShell>) -> impl FnOnce(anyhow::Error) + Send {
    move |e| {
        tracing::warn!("org operation failed: {}", e);
        shell.status_message(messages::CONNECTING_FAILED);
    }
}

fn auth_failed(shell: Arc<dyn EditorShell>) -> impl FnOnce(anyhow::Error) + Send {
    move |e| {
        tracing::warn!("org operation failed: {}", e);
        shell.error_message(messages::AUTHORIZATION_FAILED);
    }
}

/// Global describe exported as `describe/global/sobjects.csv`.
pub fn describe_global(ctx: &OpContext) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("describe global", "");
    let api = ctx.api.clone();
    let op = ctx.configure(dispatch(move || async move { api.describe_global().await }));

    let shell = ctx.shell.clone();
    let out = ctx.session.workspace.join("describe/global/sobjects.csv");
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            match report::write_records_csv(&out, &response.sobjects()) {
                Ok(path) => shell.status_message(&format!(
                    "Global describe exported to {}",
                    path.display()
                )),
                Err(e) => shell.error_message(&format!("Failed to write describe CSV: {}", e)),
            }
        },
        connect_failed(ctx.shell.clone()),
    )
}

/// Custom fields of one sobject exported as `describe/customfield/<name>.csv`.
pub fn describe_custom_fields(ctx: &OpContext, sobject: &str) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("describe customfield", sobject);
    let api = ctx.api.clone();
    let soql = format!(
        "SELECT Id, TableEnumOrId, DeveloperName, NamespacePrefix, FullName \
         FROM CustomField WHERE TableEnumOrId = '{}'",
        sobject
    );
    let op = ctx.configure(dispatch(move || async move {
        api.query_all(&soql, true).await
    }));

    let shell = ctx.shell.clone();
    let out = ctx
        .session
        .workspace
        .join("describe/customfield")
        .join(format!("{}.csv", sobject));
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            match report::write_records_csv(&out, &response.records()) {
                Ok(path) => shell.status_message(&format!(
                    "Custom field describe exported to {}",
                    path.display()
                )),
                Err(e) => shell.error_message(&format!("Failed to write describe CSV: {}", e)),
            }
        },
        connect_failed(ctx.shell.clone()),
    )
}

/// Page layout exported as `describe/layout/<sobject>-<recordtype>.csv`.
pub fn describe_layout(
    ctx: &OpContext,
    sobject: &str,
    recordtype_name: &str,
    recordtype_id: &str,
) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log(
        "describe layout",
        &format!("{} ({})", sobject, recordtype_name),
    );
    let api = ctx.api.clone();
    let sobject_owned = sobject.to_string();
    let recordtype_owned = recordtype_id.to_string();
    let op = ctx.configure(dispatch(move || async move {
        api.describe_layout(&sobject_owned, &recordtype_owned).await
    }));

    let shell = ctx.shell.clone();
    let out = ctx
        .session
        .workspace
        .join("describe/layout")
        .join(format!("{}-{}.csv", sobject, recordtype_name));
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            // A layout query can come back well-formed but empty.
            if response.total_size() == Some(0) {
                shell.error_message("No layout found for this record type.");
                return;
            }
            match report::write_layout_csv(&out, &response.body) {
                Ok(path) => {
                    shell.status_message(&format!("Layout describe exported to {}", path.display()))
                }
                Err(e) => shell.error_message(&format!("Failed to write layout CSV: {}", e)),
            }
        },
        connect_failed(ctx.shell.clone()),
    )
}

/// SOQL query shown in a scratch view.
pub fn execute_query(ctx: &OpContext, soql: &str) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("execute query", soql);
    let api = ctx.api.clone();
    let soql_owned = soql.to_string();
    let op = ctx.configure(dispatch(move || async move {
        api.query(&soql_owned).await
    }));

    let shell = ctx.shell.clone();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            shell.show_view("Query Result", &format::format_query_result(&response.body));
        },
        connect_failed(ctx.shell.clone()),
    )
}

/// Anonymous Apex result shown in a scratch view.
pub fn execute_anonymous(ctx: &OpContext, apex: &str) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("execute anonymous", apex);
    let api = ctx.api.clone();
    let apex_owned = apex.to_string();
    let op = ctx.configure(dispatch(move || async move {
        api.execute_anonymous(&apex_owned).await
    }));

    let shell = ctx.shell.clone();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            shell.show_view(
                "Execute Anonymous Result",
                &format::format_execute_anonymous(&response.body),
            );
        },
        connect_failed(ctx.shell.clone()),
    )
}

/// Apex test run shown in a scratch view.
pub fn run_test(ctx: &OpContext, class_id: &str) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("run test", class_id);
    let api = ctx.api.clone();
    let class_owned = class_id.to_string();
    let op = ctx.configure(dispatch(move || async move {
        api.run_test(&class_owned).await
    }));

    let shell = ctx.shell.clone();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            shell.show_view("Test Result", &format::format_test_result(&response.body));
        },
        connect_failed(ctx.shell.clone()),
    )
}

/// Field table of one sobject shown in a scratch view.
pub fn retrieve_fields(ctx: &OpContext, sobject: &str) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("retrieve fields", sobject);
    let api = ctx.api.clone();
    let sobject_owned = sobject.to_string();
    let op = ctx.configure(dispatch(move || async move {
        api.describe_sobject(&sobject_owned).await
    }));

    let shell = ctx.shell.clone();
    let title = format!("{} Fields", sobject);
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            shell.show_view(&title, &format::format_sobject_fields(&response.body));
        },
        connect_failed(ctx.shell.clone()),
    )
}

/// Metadata bundle retrieve, extracted under `<workspace>/metadata`.
pub fn retrieve_all(ctx: &OpContext) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("retrieve all", "");
    let api = ctx.api.clone();
    let op = ctx.configure(dispatch(move || async move { api.retrieve_all().await }));

    let shell = ctx.shell.clone();
    let workspace = ctx.session.workspace.clone();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            let Some(zip_base64) = response.zip_file() else {
                shell.error_message("Retrieve result carried no zip payload.");
                return;
            };
            match bundle::extract_retrieve_bundle(&workspace, zip_base64) {
                Ok(output) => shell.status_message(&format!(
                    "Your objects and workflows are exported to {}",
                    output.display()
                )),
                Err(e) => shell.error_message(&format!("Failed to extract bundle: {}", e)),
            }
        },
        auth_failed(ctx.shell.clone()),
    )
}

/// Refresh metadata for every configured component type into the component
/// store.
pub fn refresh_components(ctx: &OpContext) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("refresh components", &ctx.session.component_types.join(", "));
    let api = ctx.api.clone();
    let component_types = ctx.session.component_types.clone();
    let op = ctx.configure(dispatch(move || async move {
        api.refresh_components(&component_types).await
    }));

    let shell = ctx.shell.clone();
    let store = ctx.components.clone();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            let Value::Object(entries) = &response.body else {
                shell.error_message("Component refresh returned an unexpected payload.");
                return;
            };
            let mut store = store.lock().unwrap();
            for (key, value) in entries {
                match serde_json::from_value::<ComponentRecord>(value.clone()) {
                    Ok(record) => store.set(key, record),
                    Err(e) => tracing::warn!("Skipping malformed component {}: {}", key, e),
                }
            }
            if let Err(e) = store.save() {
                shell.error_message(&format!("Failed to save component metadata: {}", e));
                return;
            }
            shell.message_dialog(messages::DOWNLOAD_ALL_SUCCEEDED);
        },
        auth_failed(ctx.shell.clone()),
    )
}

/// Create one component in the org and register its id and URL locally.
pub fn create_component(
    ctx: &OpContext,
    data: Value,
    component_name: &str,
    component_type: &str,
) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log(
        "create component",
        &format!("{} {}", component_type, component_name),
    );
    let api = ctx.api.clone();
    let post_url = format!("{}/sobjects/{}", ctx.session.data_path(), component_type);
    let post_url_for_worker = post_url.clone();
    let op = ctx.configure(dispatch(move || async move {
        api.post(&post_url_for_worker, data).await
    }));

    let shell = ctx.shell.clone();
    let store = ctx.components.clone();
    let key = format!("{}{}", component_type, component_name);
    let component_type = component_type.to_string();
    let body_field = crate::rest::component_body_field(&component_type).to_string();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            let Some(component_id) = response.body.get("id").and_then(Value::as_str) else {
                shell.error_message("Create result carried no component id.");
                return;
            };
            let mut store = store.lock().unwrap();
            store.set(
                &key,
                ComponentRecord {
                    component_id: component_id.to_string(),
                    component_url: format!("{}/{}", post_url, component_id),
                    component_type,
                    body_field,
                },
            );
            if let Err(e) = store.save() {
                shell.error_message(&format!("Failed to save component metadata: {}", e));
                return;
            }
            shell.message_dialog(messages::CREATE_SUCCEEDED);
        },
        auth_failed(ctx.shell.clone()),
    )
}

/// Push a component body to the org. Fire-and-forget: the caller may drop
/// the returned operation or join it, there is no completion action.
pub fn save_component(
    ctx: &OpContext,
    component_url: &str,
    body_field: &str,
    body: &str,
) -> PendingOperation<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("save component", component_url);
    let api = ctx.api.clone();
    let url = component_url.to_string();
    let mut payload = serde_json::Map::new();
    payload.insert(body_field.to_string(), Value::String(body.to_string()));
    let payload = Value::Object(payload);
    ctx.configure(dispatch(move || async move {
        api.patch(&url, payload).await
    }))
}

/// Pull the current component body from the org into its local file.
pub fn refresh_component(
    ctx: &OpContext,
    component_url: &str,
    file_name: PathBuf,
    body_field: &str,
) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("refresh component", component_url);
    let api = ctx.api.clone();
    let url = component_url.to_string();
    let op = ctx.configure(dispatch(move || async move { api.get(&url).await }));

    let shell = ctx.shell.clone();
    let body_field = body_field.to_string();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            let Some(body) = response.body.get(&body_field).and_then(Value::as_str) else {
                shell.error_message(&format!("Component has no {} field.", body_field));
                return;
            };
            if let Err(e) = fs::write(&file_name, body.as_bytes()) {
                shell.error_message(&format!(
                    "Failed to write {}: {}",
                    file_name.display(),
                    e
                ));
                return;
            }
            shell.message_dialog(messages::GET_SUCCEEDED);
        },
        auth_failed(ctx.shell.clone()),
    )
}

/// Delete a component in the org, then its local file and view.
pub fn delete_component(
    ctx: &OpContext,
    component_url: &str,
    file_name: PathBuf,
) -> Poller<RemoteResponse> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("delete component", component_url);
    let api = ctx.api.clone();
    let url = component_url.to_string();
    let op = ctx.configure(dispatch(move || async move { api.delete(&url).await }));

    let shell = ctx.shell.clone();
    Poller::new(
        op,
        move |response: RemoteResponse| {
            if response.is_error() {
                shell.error_message(&response.error_detail());
                return;
            }
            if let Err(e) = fs::remove_file(&file_name) {
                shell.error_message(&format!(
                    "Failed to remove {}: {}",
                    file_name.display(),
                    e
                ));
                return;
            }
            shell.close_active_view();
            shell.message_dialog(messages::DELETE_SUCCEEDED);
        },
        auth_failed(ctx.shell.clone()),
    )
}

/// One independent workbook dispatch per sobject. Each worker describes its
/// sobject and writes the CSV itself; the result slots resolve in any order.
pub fn generate_workbooks(ctx: &OpContext, sobjects: &[String]) -> Vec<Poller<PathBuf>> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("generate workbooks", &sobjects.join(", "));
    sobjects
        .iter()
        .map(|sobject| {
            let api = ctx.api.clone();
            let name = sobject.clone();
            let out = ctx
                .session
                .workspace
                .join("describe/workbooks")
                .join(format!("{}.csv", sobject));
            let op = ctx.configure(dispatch(move || async move {
                let response = api.describe_sobject(&name).await?;
                if response.is_error() {
                    anyhow::bail!("describe {} failed: {}", name, response.error_detail());
                }
                report::write_field_workbook(&out, &response.body)
            }));

            let shell = ctx.shell.clone();
            Poller::new(
                op,
                move |path: PathBuf| {
                    shell.status_message(&format!("Workbook written to {}", path.display()));
                },
                connect_failed(ctx.shell.clone()),
            )
        })
        .collect()
}

/// Workbooks for every common sobject: one dispatch for the name list whose
/// completion action fans out the per-sobject workbook dispatches. The
/// fan-out pollers appear in the returned slot once the name list resolves;
/// the host keeps ticking both.
pub fn generate_all_workbooks(ctx: &OpContext) -> (Poller<Vec<String>>, FanOutJobs) {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("generate all workbooks", "");
    let api = ctx.api.clone();
    let op = ctx.configure(dispatch(
        move || async move { api.common_sobject_names().await },
    ));

    let jobs: FanOutJobs = Arc::new(Mutex::new(Vec::new()));
    let jobs_slot = jobs.clone();
    let fan_out_ctx = ctx.clone();
    let poller = Poller::new(
        op,
        move |sobjects: Vec<String>| {
            let spawned = generate_workbooks(&fan_out_ctx, &sobjects);
            jobs_slot.lock().unwrap().extend(spawned);
        },
        connect_failed(ctx.shell.clone()),
    );
    (poller, jobs)
}

/// Build the per-org completion map from the common sobject describes and
/// persist it keyed by username.
pub fn initiate_completions(ctx: &OpContext) -> Poller<Vec<RemoteResponse>> {
    ctx.shell.status_message(messages::WAIT_FOR_A_MOMENT);
    ctx.log("initiate completions", "");
    let api = ctx.api.clone();
    let op = ctx.configure(dispatch(move || async move {
        api.describe_common_sobjects().await
    }));

    let shell = ctx.shell.clone();
    let store = ctx.completions.clone();
    let username = ctx.session.username.clone();
    Poller::new(
        op,
        move |describes: Vec<RemoteResponse>| {
            let mut sobjects: HashMap<String, FieldMap> = HashMap::new();
            for describe in &describes {
                let Some(name) = describe.body.get("name").and_then(Value::as_str) else {
                    tracing::warn!("Skipping describe without a name");
                    continue;
                };
                let Some(fields) = describe.body.get("fields").and_then(Value::as_array) else {
                    tracing::warn!("Skipping {}: describe has no fields", name);
                    continue;
                };
                let mut field_map = FieldMap::new();
                for field in fields {
                    if let (Some(field_name), Some(field_type)) = (
                        field.get("name").and_then(Value::as_str),
                        field.get("type").and_then(Value::as_str),
                    ) {
                        field_map.insert(
                            format!("{} ({})", field_name, field_type),
                            field_name.to_string(),
                        );
                    }
                }
                sobjects.insert(name.to_string(), field_map);
            }
            let mut store = store.lock().unwrap();
            store.set_org(&username, sobjects);
            if let Err(e) = store.save() {
                shell.error_message(&format!("Failed to save completion metadata: {}", e));
                return;
            }
            shell.status_message("Completion metadata initialized.");
        },
        auth_failed(ctx.shell.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{RecordingShell, ShellEvent};
    use crate::testing::MockService;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        ctx: OpContext,
        api: Arc<MockService>,
        shell: Arc<RecordingShell>,
        _workspace: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let workspace = tempfile::tempdir().unwrap();
        let api = Arc::new(MockService::new());
        let shell = Arc::new(RecordingShell::new());
        let session = SessionConfig {
            username: "dev@example.com".to_string(),
            workspace: workspace.path().to_path_buf(),
            poll_interval_ms: 5,
            ..Default::default()
        };
        let ctx = OpContext {
            api: api.clone(),
            shell: shell.clone(),
            session,
            components: Arc::new(Mutex::new(ComponentStore::load_from(
                workspace.path().join("components.json"),
            ))),
            completions: Arc::new(Mutex::new(CompletionStore::load_from(
                workspace.path().join("completions.json"),
            ))),
        };
        Fixture {
            ctx,
            api,
            shell,
            _workspace: workspace,
        }
    }

    fn drive<T>(mut poller: Poller<T>) {
        for _ in 0..400 {
            if poller.tick().is_done() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("poller never reached a terminal state");
    }

    // ==================== describe tests ====================

    #[test]
    fn test_describe_global_writes_csv() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            200,
            json!({"sobjects": [
                {"name": "Account", "custom": false},
                {"name": "Case", "custom": false},
                {"name": "Invoice__c", "custom": true},
            ]}),
        ));

        drive(describe_global(&f.ctx));

        let out = f.ctx.session.workspace.join("describe/global/sobjects.csv");
        let mut reader = csv::Reader::from_path(&out).unwrap();
        assert_eq!(reader.records().count(), 3);
        assert!(f.shell.errors().is_empty());
    }

    #[test]
    fn test_describe_global_error_status_writes_nothing() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            401,
            json!([{"errorCode": "INVALID_SESSION_ID", "message": "Session expired"}]),
        ));

        drive(describe_global(&f.ctx));

        assert!(!f.ctx.session.workspace.join("describe").exists());
        assert_eq!(f.shell.errors().len(), 1);
        assert!(f.shell.errors()[0].contains("INVALID_SESSION_ID"));
    }

    #[test]
    fn test_describe_global_transport_failure_reports_connecting() {
        let f = fixture();
        f.api.push_transport_error("connection refused");

        drive(describe_global(&f.ctx));

        let events = f.shell.events();
        assert!(events.contains(&ShellEvent::Status(messages::CONNECTING_FAILED.to_string())));
        assert!(f.shell.errors().is_empty());
    }

    #[test]
    fn test_describe_custom_fields_uses_tooling_query() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            200,
            json!({"records": [
                {"Id": "00N1", "DeveloperName": "Rating", "TableEnumOrId": "Account"},
            ]}),
        ));

        drive(describe_custom_fields(&f.ctx, "Account"));

        assert!(f.api.calls()[0].starts_with("query_all:true:"));
        let out = f
            .ctx
            .session
            .workspace
            .join("describe/customfield/Account.csv");
        assert!(out.exists());
    }

    #[test]
    fn test_describe_layout_empty_total_size_is_an_error() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            200,
            json!({"totalSize": 0, "records": []}),
        ));

        drive(describe_layout(&f.ctx, "Account", "Master", "012000000000000"));

        assert_eq!(f.shell.errors().len(), 1);
        assert!(!f
            .ctx
            .session
            .workspace
            .join("describe/layout/Account-Master.csv")
            .exists());
    }

    #[test]
    fn test_describe_layout_writes_named_csv() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            200,
            json!({"editLayoutSections": [
                {"heading": "Info", "layoutRows": [{"layoutItems": [
                    {"label": "Name", "required": true,
                     "layoutComponents": [{"type": "Field", "value": "Name"}]}
                ]}]}
            ]}),
        ));

        drive(describe_layout(&f.ctx, "Account", "Business", "012000000000001"));

        assert!(f
            .ctx
            .session
            .workspace
            .join("describe/layout/Account-Business.csv")
            .exists());
    }

    // ==================== view tests ====================

    #[test]
    fn test_execute_query_opens_view() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            200,
            json!({"totalSize": 1, "records": [{"Id": "001", "Name": "Acme"}]}),
        ));

        drive(execute_query(&f.ctx, "SELECT Id, Name FROM Account"));

        let view = f
            .shell
            .events()
            .into_iter()
            .find_map(|e| match e {
                ShellEvent::View { title, content } => Some((title, content)),
                _ => None,
            })
            .expect("no view opened");
        assert_eq!(view.0, "Query Result");
        assert!(view.1.contains("Name: Acme"));
    }

    #[test]
    fn test_execute_anonymous_error_shows_code_and_message() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            400,
            json!({"errorCode": "INVALID_APEX", "message": "Unexpected token"}),
        ));

        drive(execute_anonymous(&f.ctx, "System.debug(;"));

        assert_eq!(f.shell.errors(), vec!["INVALID_APEX\nUnexpected token"]);
    }

    #[test]
    fn test_run_test_shows_test_view() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            200,
            json!({"numTestsRun": 1, "numFailures": 0,
                   "successes": [{"name": "AccountTest", "methodName": "testOk"}],
                   "failures": []}),
        ));

        drive(run_test(&f.ctx, "01p000000000001"));

        let events = f.shell.events();
        assert!(events.iter().any(|e| matches!(
            e,
            ShellEvent::View { title, .. } if title == "Test Result"
        )));
    }

    // ==================== retrieve tests ====================

    #[test]
    fn test_retrieve_all_extracts_bundle() {
        use base64::Engine;
        use std::io::Write;

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("objects/Account.object", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<CustomObject/>").unwrap();
            writer.finish().unwrap();
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(cursor.into_inner());

        let f = fixture();
        f.api
            .push_response(RemoteResponse::new(200, json!({"zipFile": encoded})));

        drive(retrieve_all(&f.ctx));

        let extracted = f
            .ctx
            .session
            .workspace
            .join("metadata/objects/Account.object");
        assert!(extracted.exists());
        assert!(!f
            .ctx
            .session
            .workspace
            .join("metadata/sobjects.zip")
            .exists());
    }

    #[test]
    fn test_retrieve_all_transport_failure_reports_authorization() {
        let f = fixture();
        f.api.push_transport_error("tls handshake failed");

        drive(retrieve_all(&f.ctx));

        assert_eq!(
            f.shell.errors(),
            vec![messages::AUTHORIZATION_FAILED.to_string()]
        );
    }

    // ==================== component tests ====================

    #[test]
    fn test_refresh_components_persists_store_and_confirms() {
        let f = fixture();
        f.api.push_response(RemoteResponse::new(
            200,
            json!({
                "ApexClassMyController": {
                    "component_id": "01p000000000001",
                    "component_url": "/services/data/v59.0/tooling/sobjects/ApexClass/01p000000000001",
                    "component_type": "ApexClass",
                    "body_field": "Body"
                }
            }),
        ));

        drive(refresh_components(&f.ctx));

        let store = f.ctx.components.lock().unwrap();
        assert_eq!(
            store.get("ApexClassMyController").unwrap().component_id,
            "01p000000000001"
        );
        drop(store);
        let events = f.shell.events();
        assert_eq!(
            events[0],
            ShellEvent::Status(messages::WAIT_FOR_A_MOMENT.to_string())
        );
        assert!(events.contains(&ShellEvent::Dialog(messages::DOWNLOAD_ALL_SUCCEEDED.to_string())));
    }

    #[test]
    fn test_create_component_registers_id_and_url() {
        let f = fixture();
        f.api
            .push_response(RemoteResponse::new(201, json!({"id": "01p000000000009"})));

        drive(create_component(
            &f.ctx,
            json!({"Name": "NewController", "Body": "public class NewController {}"}),
            "NewController",
            "ApexClass",
        ));

        let store = f.ctx.components.lock().unwrap();
        let record = store.get("ApexClassNewController").unwrap();
        assert_eq!(record.component_id, "01p000000000009");
        assert_eq!(
            record.component_url,
            "/services/data/v59.0/sobjects/ApexClass/01p000000000009"
        );
    }

    #[test]
    fn test_refresh_component_writes_body_to_file() {
        let f = fixture();
        let file = f.ctx.session.workspace.join("MyController.cls");
        f.api.push_response(RemoteResponse::new(
            200,
            json!({"Body": "public class MyController {}"}),
        ));

        drive(refresh_component(
            &f.ctx,
            "/services/data/v59.0/tooling/sobjects/ApexClass/01p000000000001",
            file.clone(),
            "Body",
        ));

        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "public class MyController {}"
        );
    }

    #[test]
    fn test_delete_component_removes_file_and_closes_view() {
        let f = fixture();
        let file = f.ctx.session.workspace.join("Old.cls");
        fs::write(&file, "public class Old {}").unwrap();
        f.api
            .push_response(RemoteResponse::new(204, Value::Null));

        drive(delete_component(
            &f.ctx,
            "/services/data/v59.0/tooling/sobjects/ApexClass/01p000000000002",
            file.clone(),
        ));

        assert!(!file.exists());
        let events = f.shell.events();
        assert!(events.contains(&ShellEvent::ViewClosed));
        assert!(events.contains(&ShellEvent::Dialog(messages::DELETE_SUCCEEDED.to_string())));
    }

    #[test]
    fn test_delete_component_error_status_keeps_file() {
        let f = fixture();
        let file = f.ctx.session.workspace.join("Keep.cls");
        fs::write(&file, "public class Keep {}").unwrap();
        f.api.push_response(RemoteResponse::new(
            403,
            json!([{"errorCode": "INSUFFICIENT_ACCESS", "message": "no delete"}]),
        ));

        drive(delete_component(&f.ctx, "/url", file.clone()));

        assert!(file.exists());
        assert_eq!(f.shell.errors().len(), 1);
    }

    // ==================== workbook tests ====================

    #[test]
    fn test_generate_workbooks_resolves_independent_slots() {
        let f = fixture();
        let sobjects = vec![
            "Account".to_string(),
            "Case".to_string(),
            "Lead".to_string(),
        ];
        // Responses pop in call order, which matches dispatch order here, but
        // each slot resolves on its own worker.
        for name in &sobjects {
            f.api.push_response(RemoteResponse::new(
                200,
                json!({"name": name, "fields": [
                    {"name": "Id", "label": "ID", "type": "id", "length": 18,
                     "custom": false, "nillable": false, "updateable": false},
                ]}),
            ));
        }

        let mut pollers = generate_workbooks(&f.ctx, &sobjects);
        let mut remaining = 400;
        while pollers.iter().any(|p| !p.is_done()) && remaining > 0 {
            for poller in pollers.iter_mut() {
                poller.tick();
            }
            std::thread::sleep(Duration::from_millis(5));
            remaining -= 1;
        }

        for name in &sobjects {
            assert!(f
                .ctx
                .session
                .workspace
                .join(format!("describe/workbooks/{}.csv", name))
                .exists());
        }
    }

    #[test]
    fn test_generate_all_workbooks_fans_out_after_name_list() {
        let f = fixture();
        f.api
            .set_common_names(vec!["Account".to_string(), "Case".to_string()]);
        for name in ["Account", "Case"] {
            f.api.push_response(RemoteResponse::new(
                200,
                json!({"name": name, "fields": [
                    {"name": "Id", "label": "ID", "type": "id", "length": 18,
                     "custom": false, "nillable": false, "updateable": false},
                ]}),
            ));
        }

        let (mut poller, jobs) = generate_all_workbooks(&f.ctx);
        drive_ref(&mut poller);
        let mut remaining = 400;
        loop {
            let mut jobs = jobs.lock().unwrap();
            if !jobs.is_empty() && jobs.iter().all(|p| p.is_done()) {
                break;
            }
            for job in jobs.iter_mut() {
                job.tick();
            }
            drop(jobs);
            std::thread::sleep(Duration::from_millis(5));
            remaining -= 1;
            assert!(remaining > 0, "fan-out jobs never finished");
        }

        assert!(f
            .ctx
            .session
            .workspace
            .join("describe/workbooks/Account.csv")
            .exists());
        assert!(f
            .ctx
            .session
            .workspace
            .join("describe/workbooks/Case.csv")
            .exists());
    }

    #[test]
    fn test_generate_all_workbooks_with_no_common_sobjects_finishes() {
        let f = fixture();
        f.api.set_common_names(Vec::new());

        let (mut poller, jobs) = generate_all_workbooks(&f.ctx);
        drive_ref(&mut poller);

        // Ready with an empty fan-out is a terminal condition for a driving
        // host: no jobs were spawned and none ever will be.
        assert_eq!(poller.state(), crate::bridge::PollState::Ready);
        assert!(jobs.lock().unwrap().is_empty());
        assert!(f.shell.errors().is_empty());
    }

    fn drive_ref<T>(poller: &mut Poller<T>) {
        for _ in 0..400 {
            if poller.tick().is_done() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("poller never reached a terminal state");
    }

    // ==================== completion init tests ====================

    #[test]
    fn test_initiate_completions_builds_field_map() {
        let f = fixture();
        f.api.set_describe_batch(vec![RemoteResponse::new(
            200,
            json!({"name": "Account", "fields": [
                {"name": "Name", "type": "string"},
                {"name": "Industry", "type": "picklist"},
            ]}),
        )]);

        drive(initiate_completions(&f.ctx));

        let store = f.ctx.completions.lock().unwrap();
        let org = store.org("dev@example.com").unwrap();
        let account = org.get("Account").unwrap();
        assert_eq!(account.get("Name (string)"), Some(&"Name".to_string()));
        assert_eq!(
            account.get("Industry (picklist)"),
            Some(&"Industry".to_string())
        );
    }

    #[test]
    fn test_save_component_is_fire_and_forget() {
        let f = fixture();
        f.api
            .push_response(RemoteResponse::new(204, Value::Null));

        let op = save_component(&f.ctx, "/url", "Body", "public class X {}");
        let response = op.join().unwrap();
        assert_eq!(response.status_code, 204);
        assert!(f.api.calls()[0].starts_with("patch:/url"));
    }
}
