use std::path::Path;

use anyhow::bail;
use racf_pool::config::PoolConfigFile;
use racf_pool::{Credential, PoolConfiguration};
use serde::Serialize;

/// What `check` prints. Never carries passwords.
#[derive(Debug, Serialize)]
pub struct PoolSummary {
    pub host: String,
    pub port: u16,
    pub connection_class: String,
    pub users: Vec<String>,
    pub connect_script: Option<String>,
    pub disconnect_script: Option<String>,
    pub idle_reap_threshold_ms: u128,
    pub command_timeout_ms: u128,
}

impl From<&PoolConfiguration> for PoolSummary {
    fn from(config: &PoolConfiguration) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connection_class: config.connection_class.clone(),
            users: config.credentials.iter().map(|c| c.user_name.clone()).collect(),
            connect_script: config.connect_script.clone(),
            disconnect_script: config.disconnect_script.clone(),
            idle_reap_threshold_ms: config.idle_reap_threshold.as_millis(),
            command_timeout_ms: config.command_timeout.as_millis(),
        }
    }
}

pub fn format_summary(summary: &PoolSummary) -> String {
    let mut out = format!(
        "{}:{} ({})\n  slots: {}\n",
        summary.host,
        summary.port,
        summary.connection_class,
        summary.users.len()
    );
    for (index, user) in summary.users.iter().enumerate() {
        out.push_str(&format!("    [{index}] {user}\n"));
    }
    if let Some(script) = &summary.connect_script {
        out.push_str(&format!("  connect script: {script}\n"));
    }
    if let Some(script) = &summary.disconnect_script {
        out.push_str(&format!("  disconnect script: {script}\n"));
    }
    out.push_str(&format!(
        "  idle reap threshold: {}ms\n  command timeout: {}ms\n",
        summary.idle_reap_threshold_ms, summary.command_timeout_ms
    ));
    out
}

pub fn check(path: &str, format: &str) -> anyhow::Result<()> {
    let config = PoolConfiguration::from_file(Path::new(path))?;
    tracing::info!(host = %config.host, slots = config.slot_count(), "configuration is valid");

    let summary = PoolSummary::from(&config);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print!("{}", format_summary(&summary)),
    }
    Ok(())
}

pub fn scaffold(host: &str) -> PoolConfigFile {
    PoolConfigFile {
        host: host.to_string(),
        port: Some(racf_pool::config::DEFAULT_PORT),
        connection_class: Some(racf_pool::config::DEFAULT_CONNECTION_CLASS.to_string()),
        connect_script: None,
        disconnect_script: None,
        idle_reap_threshold: Some("5m".to_string()),
        command_timeout: Some("10s".to_string()),
        credentials: vec![Credential::new("IBMUSER", "CHANGEME")],
    }
}

pub fn init(path: &str, host: &str) -> anyhow::Result<()> {
    let output = Path::new(path);
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    std::fs::write(output, toml::to_string_pretty(&scaffold(host))?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
