use std::fs;
use std::path::PathBuf;

use aquabot_agent::knowledge::parse_entries;
use aquabot_channels::ChannelSender;
use aquabot_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use super::{serialize_payload, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CHECKS_AFTER_CONFIG: [&str; 5] =
    ["catalog_source", "outbound_channels", "llm_helpers", "crm", "knowledge_base"];

pub fn run(json_output: bool) -> CommandResult {
    run_with(None, json_output)
}

/// Preflight report; exits 1 when any check fails. Skipped checks do not fail the run.
pub fn run_with(config_path: Option<PathBuf>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };
    let output = if json_output { serialize_payload(&report) } else { render_human(&report) };
    CommandResult { exit_code, output }
}

fn build_report(config_path: Option<PathBuf>) -> DoctorReport {
    let loaded = AppConfig::load(LoadOptions {
        require_file: config_path.is_some(),
        config_path,
        ..LoadOptions::default()
    });

    let mut checks = Vec::new();
    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_catalog(&config));
            checks.push(check_channels(&config));
            checks.push(check_llm(&config));
            checks.push(check_crm(&config));
            checks.push(check_knowledge(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Fail,
                error.to_string(),
            ));
            checks.extend(CHECKS_AFTER_CONFIG.iter().map(|name| {
                DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                )
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    match config.catalog.base_url.as_deref().filter(|_| config.catalog.is_configured()) {
        Some(base_url) => DoctorCheck::new(
            "catalog_source",
            CheckStatus::Pass,
            format!("woocommerce at {base_url}, cache ttl {}s", config.catalog.cache_ttl_secs),
        ),
        None => DoctorCheck::new(
            "catalog_source",
            CheckStatus::Fail,
            "catalog.base_url is not set; product questions would only get an apology",
        ),
    }
}

fn check_channels(config: &AppConfig) -> DoctorCheck {
    let sender = match ChannelSender::from_config(config) {
        Ok(sender) => sender,
        Err(error) => {
            return DoctorCheck::new("outbound_channels", CheckStatus::Fail, error.to_string())
        }
    };

    let mut configured = Vec::new();
    if sender.has_meta() {
        configured.push("whatsapp");
    }
    if sender.has_twilio() {
        configured.push("twilio");
    }

    if !configured.is_empty() {
        return DoctorCheck::new("outbound_channels", CheckStatus::Pass, configured.join(", "));
    }
    if config.idle.enabled {
        return DoctorCheck::new(
            "outbound_channels",
            CheckStatus::Fail,
            "idle follow-ups are enabled but no outbound sender is configured",
        );
    }
    DoctorCheck::new(
        "outbound_channels",
        CheckStatus::Skipped,
        "no outbound sender; only Twilio TwiML replies will reach callers",
    )
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    let toggles = [
        ("intent", llm.intent),
        ("planner", llm.planner),
        ("rerank", llm.rerank),
        ("consultant", llm.consultant),
    ];
    let requested: Vec<&str> =
        toggles.into_iter().filter(|(_, toggle)| *toggle).map(|(name, _)| name).collect();

    if requested.is_empty() {
        return DoctorCheck::new("llm_helpers", CheckStatus::Skipped, "no llm helper enabled");
    }
    if !llm.has_api_key() {
        return DoctorCheck::new(
            "llm_helpers",
            CheckStatus::Skipped,
            format!(
                "{} enabled but llm.api_key is missing; rule-based routing only",
                requested.join(", ")
            ),
        );
    }
    DoctorCheck::new(
        "llm_helpers",
        CheckStatus::Pass,
        format!("{} via {}", requested.join(", "), llm.model),
    )
}

fn check_crm(config: &AppConfig) -> DoctorCheck {
    if config.crm.enabled {
        DoctorCheck::new("crm", CheckStatus::Pass, format!("clientify at {}", config.crm.base_url))
    } else {
        DoctorCheck::new("crm", CheckStatus::Skipped, "crm sync disabled")
    }
}

fn check_knowledge(config: &AppConfig) -> DoctorCheck {
    let Some(path) = config.knowledge.path.as_ref() else {
        return DoctorCheck::new("knowledge_base", CheckStatus::Skipped, "knowledge.path not set");
    };

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            return DoctorCheck::new(
                "knowledge_base",
                CheckStatus::Fail,
                format!("cannot read `{}`: {error}", path.display()),
            )
        }
    };
    match parse_entries(&raw) {
        Ok(entries) => {
            let verified = entries.iter().filter(|entry| entry.verified).count();
            DoctorCheck::new(
                "knowledge_base",
                CheckStatus::Pass,
                format!("{} entries ({verified} verified)", entries.len()),
            )
        }
        Err(error) => DoctorCheck::new(
            "knowledge_base",
            CheckStatus::Fail,
            format!("`{}` is not a JSON array of entries: {error}", path.display()),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
