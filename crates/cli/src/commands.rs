use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::info;

use transflow_cache::ResultCache;
use transflow_core::{record_from_value, Batch, Config};
use transflow_pipeline::{PipelineEngine, PipelineError, RuleAdmin};
use transflow_rules::{RuleConfig, RuleConfigStore, RulePatch, RuleRegistry, VersionManager};

use crate::cli::{Command, RulesCommand, RunArgs, VersionsCommand};

/// Everything a command needs, built once from config.
pub struct App {
    config: Config,
    admin: RuleAdmin,
}

impl App {
    pub async fn build(config: Config) -> Result<Self> {
        let store = Arc::new(RuleConfigStore::new(config.storage.rules_dir.clone()));
        let versions = Arc::new(VersionManager::new(config.storage.versions_dir.clone()));
        let cache = Arc::new(ResultCache::in_memory(&config.cache));
        let engine = Arc::new(
            PipelineEngine::new(store, Arc::new(RuleRegistry::with_builtins()))
                .with_cache(cache)
                .with_concurrency(config.pipeline.concurrency),
        );
        engine
            .reload()
            .await
            .context("failed to load rule configs")?;
        Ok(Self {
            admin: RuleAdmin::new(engine, versions),
            config,
        })
    }

    pub async fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Rules(cmd) => self.rules(cmd).await,
            Command::Versions(cmd) => self.versions(cmd).await,
            Command::Run(args) => self.run(args).await,
        }
    }

    async fn rules(&self, command: RulesCommand) -> Result<()> {
        let admin = &self.admin;
        match command {
            RulesCommand::List => print_json(&admin.list_rules()?),
            RulesCommand::Get { name } => print_json(&admin.get_rule(&name)?),
            RulesCommand::Create { file } => {
                let config: RuleConfig = read_document(&file)?;
                print_json(&admin.create_rule(config).await?)
            }
            RulesCommand::Update { name, file } => {
                let patch: RulePatch = read_document(&file)?;
                print_json(&admin.update_rule(&name, &patch).await?)
            }
            RulesCommand::Delete { name } => {
                admin.delete_rule(&name).await?;
                print_json(&json!({ "deleted": name }))
            }
            RulesCommand::Toggle { name } => print_json(&admin.toggle_rule(&name).await?),
            RulesCommand::BatchUpdate { file } => {
                let patches: BTreeMap<String, RulePatch> = read_document(&file)?;
                let report: BTreeMap<String, String> = admin
                    .batch_update(patches)
                    .await?
                    .into_iter()
                    .map(|(name, outcome)| match outcome {
                        Ok(_) => (name, "success".to_string()),
                        Err(e) => (name, e.to_string()),
                    })
                    .collect();
                print_json(&report)
            }
        }
    }

    async fn versions(&self, command: VersionsCommand) -> Result<()> {
        let admin = &self.admin;
        match command {
            VersionsCommand::List { name } => print_json(&admin.list_versions(&name)?),
            VersionsCommand::Get { name, version } => {
                print_json(&admin.get_version(&name, version)?)
            }
            VersionsCommand::Save { name, comment } => {
                print_json(&admin.save_version(&name, &comment)?)
            }
            VersionsCommand::Rollback { name, version } => {
                print_json(&admin.rollback(&name, version).await?)
            }
            VersionsCommand::Cleanup { name, keep } => {
                let keep = keep.unwrap_or(self.config.pipeline.keep_versions);
                let removed = admin.cleanup_versions(&name, keep)?;
                print_json(&json!({ "rule": name, "kept": keep, "removed": removed }))
            }
        }
    }

    async fn run(&self, args: RunArgs) -> Result<()> {
        let records = read_ndjson(&args.input)?;
        let batch_size = args.batch_size.unwrap_or(self.config.pipeline.batch_size);
        info!(records = records.len(), batch_size, "processing records");

        let engine = self.admin.engine();
        let result = match engine.process_batches(records, batch_size).await {
            Ok(result) => result,
            Err(PipelineError::BatchFailed { failed, first }) => {
                bail!("all {} records failed; first error: {}", failed, first)
            }
            Err(e) => return Err(e.into()),
        };

        let stdout = io::stdout();
        let mut out = stdout.lock();
        for record in result.succeeded() {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        let summary = json!({
            "summary": result.summary(),
            "errors": result.errors(),
            "rules": engine.rule_stats(),
        });
        eprintln!("{}", serde_json::to_string(&summary)?);
        Ok(())
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read a YAML document (JSON is valid YAML).
fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("invalid document {}", path.display()))
}

fn read_ndjson(path: &Path) -> Result<Batch> {
    let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file =
            fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut records = Batch::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("line {}: invalid JSON", index + 1))?;
        match record_from_value(value) {
            Some(record) => records.push(record),
            None => bail!("line {}: expected a JSON object", index + 1),
        }
    }
    Ok(records)
}
