use anyhow::Result;
use clap::{Parser, Subcommand};
use forcebridge::bridge::Poller;
use forcebridge::cache::OrgCache;
use forcebridge::operations::{self, OpContext};
use forcebridge::rest::RestClient;
use forcebridge::session::SessionConfig;
use forcebridge::shell::ConsoleShell;
use forcebridge::stores::{ComponentRecord, ComponentStore, CompletionStore};
use forcebridge::{operation_log, rest};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(
    name = "forcebridge",
    about = "Asynchronous Salesforce org operations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the global describe to describe/global/sobjects.csv
    DescribeGlobal,
    /// Show the field table of one sobject
    Fields { sobject: String },
    /// Export the custom fields of one sobject to CSV
    CustomFields { sobject: String },
    /// Export a page layout to CSV; the record type is given by name
    Layout { sobject: String, recordtype: String },
    /// Run a SOQL query
    Query { soql: String },
    /// Execute an anonymous Apex block read from a file
    Anon { file: PathBuf },
    /// Run the tests of one Apex class, given by name
    RunTest { class_name: String },
    /// Retrieve the org's objects and workflows into metadata/
    Retrieve,
    /// Write a field workbook CSV for the given sobjects
    Workbook { sobjects: Vec<String> },
    /// Write field workbook CSVs for every common sobject
    WorkbookAll,
    /// Refresh component metadata (ids, URLs) for the configured types
    RefreshComponents,
    /// Build the per-org completion map
    InitCompletions,
    /// Create or update a component from a local file
    Push {
        component_type: String,
        name: String,
        file: PathBuf,
    },
    /// Overwrite a local file with the org's copy of a component
    Pull {
        component_type: String,
        name: String,
        file: PathBuf,
    },
    /// Delete a component in the org along with its local file
    Delete {
        component_type: String,
        name: String,
        file: PathBuf,
    },
    /// Print the operation log
    Log,
}

fn drive<T>(mut poller: Poller<T>, interval: std::time::Duration) {
    while !poller.tick().is_done() {
        std::thread::sleep(interval);
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        // The log is local; reading it must not require org credentials.
        Command::Log => {
            print!("{}", operation_log::read_log()?);
            tracing::info!("Log file: {}", operation_log::log_file_path());
            Ok(())
        }
        command => run_org(command),
    }
}

/// Build the org session context and run one subcommand, driving its
/// poller(s) to a terminal state.
fn run_org(command: Command) -> Result<()> {
    let session = SessionConfig::load();
    let api = Arc::new(RestClient::new(&session)?);
    let ctx = OpContext {
        api: api.clone(),
        shell: Arc::new(ConsoleShell),
        session: session.clone(),
        components: Arc::new(Mutex::new(ComponentStore::load())),
        completions: Arc::new(Mutex::new(CompletionStore::load())),
    };
    let interval = session.poll_interval();

    match command {
        Command::DescribeGlobal => drive(operations::describe_global(&ctx), interval),
        Command::Fields { sobject } => drive(operations::retrieve_fields(&ctx, &sobject), interval),
        Command::CustomFields { sobject } => {
            drive(operations::describe_custom_fields(&ctx, &sobject), interval)
        }
        Command::Layout { sobject, recordtype } => {
            let mut cache = OrgCache::with_interval(interval);
            let key = format!("{}, {}", sobject, recordtype);
            let record_types = cache.record_types(api.clone(), &session.username)?;
            let Some(recordtype_id) = record_types.get(&key) else {
                anyhow::bail!("Unknown record type: {}", key);
            };
            drive(
                operations::describe_layout(&ctx, &sobject, &recordtype, recordtype_id),
                interval,
            );
        }
        Command::Query { soql } => drive(operations::execute_query(&ctx, &soql), interval),
        Command::Anon { file } => {
            let apex = std::fs::read_to_string(&file)?;
            drive(operations::execute_anonymous(&ctx, &apex), interval);
        }
        Command::RunTest { class_name } => {
            let mut cache = OrgCache::with_interval(interval);
            let classes = cache.classes(api.clone(), &session.username)?;
            let Some(class_id) = classes.get(&class_name) else {
                anyhow::bail!("Unknown Apex class: {}", class_name);
            };
            drive(operations::run_test(&ctx, class_id), interval);
        }
        Command::Retrieve => drive(operations::retrieve_all(&ctx), interval),
        Command::Workbook { sobjects } => {
            let mut pollers = operations::generate_workbooks(&ctx, &sobjects);
            while pollers.iter().any(|p| !p.is_done()) {
                for poller in pollers.iter_mut() {
                    poller.tick();
                }
                std::thread::sleep(interval);
            }
        }
        Command::WorkbookAll => {
            let (mut names, jobs) = operations::generate_all_workbooks(&ctx);
            loop {
                // The fan-out action runs inside this tick, so by the time
                // the name list is done the job vec is already populated
                // (possibly with zero jobs for an org with no common
                // sobjects).
                names.tick();
                let mut jobs = jobs.lock().unwrap();
                for job in jobs.iter_mut() {
                    job.tick();
                }
                let fan_out_done = jobs.iter().all(|p| p.is_done());
                drop(jobs);
                if names.is_done() && fan_out_done {
                    break;
                }
                std::thread::sleep(interval);
            }
        }
        Command::RefreshComponents => drive(operations::refresh_components(&ctx), interval),
        Command::InitCompletions => drive(operations::initiate_completions(&ctx), interval),
        Command::Push {
            component_type,
            name,
            file,
        } => {
            let body = std::fs::read_to_string(&file)?;
            let key = format!("{}{}", component_type, name);
            let existing = ctx.components.lock().unwrap().get(&key).cloned();
            match existing {
                Some(record) => {
                    let response = operations::save_component(
                        &ctx,
                        &record.component_url,
                        &record.body_field,
                        &body,
                    )
                    .join()?;
                    if response.is_error() {
                        anyhow::bail!("Save failed: {}", response.error_detail());
                    }
                    tracing::info!("Saved {} {}", component_type, name);
                }
                None => {
                    let body_field = rest::component_body_field(&component_type);
                    let mut data = serde_json::Map::new();
                    data.insert("Name".to_string(), json!(name));
                    data.insert(body_field.to_string(), json!(body));
                    let data = serde_json::Value::Object(data);
                    drive(
                        operations::create_component(&ctx, data, &name, &component_type),
                        interval,
                    );
                }
            }
        }
        Command::Pull {
            component_type,
            name,
            file,
        } => {
            let record = lookup_component(&ctx, &component_type, &name)?;
            drive(
                operations::refresh_component(
                    &ctx,
                    &record.component_url,
                    file,
                    &record.body_field,
                ),
                interval,
            );
        }
        Command::Delete {
            component_type,
            name,
            file,
        } => {
            let record = lookup_component(&ctx, &component_type, &name)?;
            drive(
                operations::delete_component(&ctx, &record.component_url, file),
                interval,
            );
        }
        Command::Log => unreachable!(),
    }

    Ok(())
}

fn lookup_component(ctx: &OpContext, component_type: &str, name: &str) -> Result<ComponentRecord> {
    let key = format!("{}{}", component_type, name);
    ctx.components
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown component {} {}; run refresh-components first",
                component_type,
                name
            )
        })
}
