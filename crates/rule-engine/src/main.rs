//! 规则评估命令行
//!
//! 加载一组规则定义与一个请求上下文文档，评估全部规则并输出触发报告。

use anyhow::{Context, Result};
use clap::Parser;
use rule_engine::{
    FireReport, Persona, Registry, Request, RequestContext, Response, Rule, RuleEvaluator,
    RuleFailure, RuleStore, StaticPersonaDirectory, Visitor,
};
use rules_shared::config::AppConfig;
use rules_shared::observability;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rule-engine", about = "Evaluate rule definitions against a request context")]
struct Cli {
    /// Rule definitions (JSON array)
    #[arg(long, env = "RULES_FILE")]
    rules: PathBuf,

    /// Request context document (JSON)
    #[arg(long, env = "RULES_CONTEXT_FILE")]
    context: PathBuf,

    /// Record an evaluation trace for every rule
    #[arg(long)]
    trace: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

/// 上下文文档
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextDocument {
    request: Request,
    visitor: Option<Visitor>,
    /// SetPersona 可用的画像目录
    personas: Vec<Persona>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output<'a> {
    #[serde(flatten)]
    report: &'a FireReport,
    response: &'a Response,
    attributes: &'a HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor: Option<&'a Visitor>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load("rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    let _guard = observability::init(&config.service_name, &config.observability)?;

    let rules_json = tokio::fs::read_to_string(&cli.rules)
        .await
        .with_context(|| format!("读取规则文件失败: {}", cli.rules.display()))?;
    let rules: Vec<Rule> = serde_json::from_str(&rules_json)
        .with_context(|| format!("解析规则文件失败: {}", cli.rules.display()))?;

    let context_json = tokio::fs::read_to_string(&cli.context)
        .await
        .with_context(|| format!("读取上下文文件失败: {}", cli.context.display()))?;
    let document: ContextDocument = serde_json::from_str(&context_json)
        .with_context(|| format!("解析上下文文件失败: {}", cli.context.display()))?;

    let directory = StaticPersonaDirectory::new(document.personas);
    let registry = Arc::new(Registry::with_defaults(Arc::new(directory)));

    let mut evaluator = RuleEvaluator::new(registry).with_config(&config.engine);
    if cli.trace {
        evaluator = evaluator.with_trace();
    }
    let evaluator = Arc::new(evaluator);

    let store = RuleStore::from_config(Arc::clone(&evaluator), &config.engine);
    let mut rejected = Vec::new();
    for rule in rules {
        let (rule_id, rule_name) = (rule.id.clone(), rule.name.clone());
        if let Err(e) = store.load(rule) {
            warn!(rule_id = %rule_id, error = %e, "规则加载被拒绝");
            rejected.push(RuleFailure {
                rule_id,
                rule_name,
                code: e.code().to_string(),
                error: e.to_string(),
            });
        }
    }
    info!("已加载 {} 条规则", store.len());

    let mut ctx = RequestContext::new(document.request);
    ctx.set_visitor(document.visitor);

    let mut report = evaluator.fire_rules(&store.list_by_priority(), &mut ctx);
    report.failures.extend(rejected);

    if cli.json {
        let output = Output {
            report: &report,
            response: ctx.response(),
            attributes: ctx.scratch_attributes(),
            visitor: ctx.visitor(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_report(&report, &ctx);
    }

    Ok(())
}

fn print_report(report: &FireReport, ctx: &RequestContext) {
    for outcome in &report.outcomes {
        let status = if outcome.fired { "FIRED" } else { "-" };
        println!(
            "{:<6} {} ({}) {}us",
            status, outcome.rule_name, outcome.rule_id, outcome.elapsed_micros
        );

        for action in &outcome.actions {
            let result = if action.success { "ok" } else { "failed" };
            match &action.error {
                Some(error) => println!("       {} [{}] {}: {}", action.actionlet, action.action_id, result, error),
                None => println!("       {} [{}] {}", action.actionlet, action.action_id, result),
            }
        }

        for line in &outcome.trace {
            println!("       | {}", line);
        }
    }

    for failure in &report.failures {
        println!(
            "ERROR  {} ({}) {}: {}",
            failure.rule_name, failure.rule_id, failure.code, failure.error
        );
    }

    let headers = ctx.response().headers();
    if !headers.is_empty() {
        println!();
        println!("response headers:");
        for (name, value) in headers {
            println!("  {}: {}", name, value);
        }
    }

    println!();
    println!(
        "{} fired, {} evaluated, {} rejected",
        report.fired_count(),
        report.outcomes.len(),
        report.failures.len()
    );
}
