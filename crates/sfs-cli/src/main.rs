#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sfs_config::DEFAULT_STATFS_CACHE_SECS;
use sfs_error::SfsError;
use sfs_policy::{POLICIES, dispatch};
use sfs_probe::{FsProbes, Probes};
use sfs_types::{Branches, Category, parse_size};
use std::time::Duration;

// ── CLI definition ──────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sfsctl", about = "SeamFS — union filesystem policy toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the known branch-selection policies.
    Policies {
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// Show mode, reserve and live space data for a branch list.
    Branches {
        /// Colon-separated branch list (PATH[=MODE[,MINFREESPACE]]).
        branches: String,
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// Resolve a path through a policy and print the selected branches.
    Which {
        /// Colon-separated branch list (PATH[=MODE[,MINFREESPACE]]).
        branches: String,
        /// Path inside the union.
        path: String,
        /// Policy to evaluate.
        #[arg(long, default_value = "epmfs")]
        policy: String,
        /// Operation category: create, action or search.
        #[arg(long, default_value = "action")]
        category: String,
        /// Override the create reserve (accepts K/M/G/T suffixes).
        #[arg(long)]
        minfreespace: Option<String>,
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
}

// ── Serializable outputs ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct BranchOutput {
    path: String,
    mode: &'static str,
    minfreespace: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    spaceavail: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spaceused: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    readonly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct WhichOutput {
    policy: String,
    category: String,
    path: String,
    selected: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Policies { json } => policies(json),
        Command::Branches { branches, json } => branches_cmd(&branches, json),
        Command::Which {
            branches,
            path,
            policy,
            category,
            minfreespace,
            json,
        } => which(
            &branches,
            &path,
            &policy,
            &category,
            minfreespace.as_deref(),
            json,
        ),
    }
}

fn policies(json: bool) -> Result<()> {
    let names: Vec<&str> = POLICIES.iter().map(|p| p.name()).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&names).context("serialize output")?);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

fn branches_cmd(list: &str, json: bool) -> Result<()> {
    let branches = Branches::parse_list(list, 0).context("parse branch list")?;
    if branches.is_empty() {
        bail!("no branches in {list:?}");
    }

    let probes = FsProbes::new(Duration::from_secs(DEFAULT_STATFS_CACHE_SECS));
    let output: Vec<BranchOutput> = branches
        .snapshot()
        .into_iter()
        .map(|branch| {
            let (spaceavail, spaceused, readonly, error) = match probes.info(&branch.path) {
                Ok(info) => (
                    Some(info.spaceavail),
                    Some(info.spaceused),
                    Some(info.readonly),
                    None,
                ),
                Err(errno) => (None, None, None, Some(errno.to_string())),
            };
            BranchOutput {
                path: branch.path.display().to_string(),
                mode: branch.mode.as_str(),
                minfreespace: branch.minfreespace,
                spaceavail,
                spaceused,
                readonly,
                error,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&output).context("serialize output")?);
    } else {
        for branch in output {
            match branch.error {
                Some(error) => {
                    println!("{} mode={} probe failed: {error}", branch.path, branch.mode);
                }
                None => println!(
                    "{} mode={} minfreespace={} spaceavail={} spaceused={} readonly={}",
                    branch.path,
                    branch.mode,
                    branch.minfreespace,
                    branch.spaceavail.unwrap_or(0),
                    branch.spaceused.unwrap_or(0),
                    branch.readonly.unwrap_or(false),
                ),
            }
        }
    }
    Ok(())
}

fn which(
    list: &str,
    path: &str,
    policy: &str,
    category: &str,
    minfreespace: Option<&str>,
    json: bool,
) -> Result<()> {
    let branches = Branches::parse_list(list, 0).context("parse branch list")?;
    if sfs_policy::lookup(policy).is_none() {
        return Err(SfsError::UnknownPolicy(policy.to_owned()).into());
    }
    let category: Category = category
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown category {category:?} (create, action, search)"))?;
    let reserve = minfreespace
        .map(parse_size)
        .transpose()
        .context("parse --minfreespace")?;

    let fusepath = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };

    let probes = FsProbes::new(Duration::from_secs(DEFAULT_STATFS_CACHE_SECS));
    let result = dispatch(policy, category, &branches, &probes, &fusepath, reserve);

    let output = match &result {
        Ok(selected) => WhichOutput {
            policy: policy.to_owned(),
            category: category.to_string(),
            path: fusepath.clone(),
            selected: selected.iter().map(|p| p.display().to_string()).collect(),
            error: None,
        },
        Err(errno) => WhichOutput {
            policy: policy.to_owned(),
            category: category.to_string(),
            path: fusepath.clone(),
            selected: Vec::new(),
            error: Some(errno.to_string()),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output).context("serialize output")?);
        return Ok(());
    }

    match result {
        Ok(selected) => {
            for path in selected {
                println!("{}", path.display());
            }
            Ok(())
        }
        Err(errno) => Err(SfsError::NoBranch(errno).into()),
    }
}
