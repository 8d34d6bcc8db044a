use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use crmsync_core::{render, ChangeReport, Orchestrator};

use super::Context;
use crate::cli::SyncArgs;
use crate::output::{print_success, print_warning};

/// Plan, confirm, apply, report.
pub fn sync(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let mut orchestrator =
        Orchestrator::new(ctx.config.clone(), &ctx.source, &ctx.target, ctx.archive.store());
    let plan = orchestrator.plan();
    let preview = plan.to_report();
    println!("{}", render(&preview));

    if plan.is_empty() {
        archive(ctx, &preview)?;
        if !preview.has_failures() {
            print_success(&format!(
                "{} already matches {}",
                ctx.config.target, ctx.config.source
            ));
            return Ok(());
        }
        return finish(&preview);
    }

    let prompt = format!("Apply these changes to {}?", ctx.config.target);
    if !args.yes && !confirm(&prompt, io::stdin().lock())? {
        print_warning("Aborted; the target was not changed");
        return Ok(());
    }

    let report = orchestrator.apply(plan);
    println!("{}", render(&report));
    archive(ctx, &report)?;
    finish(&report)
}

/// Dry run: show the plan and archive it.
pub fn plan(ctx: &Context) -> Result<()> {
    let mut orchestrator =
        Orchestrator::new(ctx.config.clone(), &ctx.source, &ctx.target, ctx.archive.store());
    let report = orchestrator.dry_run();
    println!("{}", render(&report));
    archive(ctx, &report)?;
    finish(&report)
}

fn archive(ctx: &Context, report: &ChangeReport) -> Result<()> {
    if let Some(path) = ctx.archive.save_report(report)? {
        print_success(&format!("Report written to {}", path.display()));
    }
    Ok(())
}

fn finish(report: &ChangeReport) -> Result<()> {
    let totals = report.totals();
    if report.has_failures() {
        bail!(
            "{} categories and {} items failed",
            totals.failed_categories,
            totals.failed
        );
    }
    if report.dry_run {
        print_success(&format!("{} changes planned", totals.pending));
    } else {
        print_success(&format!(
            "{} created, {} deleted, {} skipped",
            totals.created, totals.deleted, totals.skipped
        ));
    }
    Ok(())
}

/// Ask a yes/no question; anything but `y` or `yes` is a no.
fn confirm(prompt: &str, mut input: impl BufRead) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use chrono::Utc;
    use clap::Parser;
    use crmsync_core::report::{CategoryReport, Stage};
    use crmsync_core::Category;
    use mock_server::{Db, Store};
    use serde_json::{json, Value};
    use tokio::sync::RwLock;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn report(categories: Vec<CategoryReport>, dry_run: bool) -> ChangeReport {
        ChangeReport {
            source: "prod".to_string(),
            target: "dev".to_string(),
            dry_run,
            generated_at: Utc::now(),
            categories,
        }
    }

    #[test]
    fn confirm_accepts_only_yes() {
        assert!(confirm("?", "y\n".as_bytes()).unwrap());
        assert!(confirm("?", " YES \n".as_bytes()).unwrap());
        assert!(!confirm("?", "\n".as_bytes()).unwrap());
        assert!(!confirm("?", "nope\n".as_bytes()).unwrap());
        assert!(!confirm("?", "".as_bytes()).unwrap());
    }

    #[test]
    fn failed_category_fails_the_command() {
        let failed = CategoryReport::failed(
            Category::LeadStatus,
            Stage::Fetching,
            "dev: HTTP 503".to_string(),
        );
        let err = finish(&report(vec![failed], false)).unwrap_err();
        assert_eq!(err.to_string(), "1 categories and 0 items failed");
    }

    #[test]
    fn clean_report_succeeds() {
        assert!(finish(&report(Vec::new(), true)).is_ok());
    }

    fn seeded(seed: impl FnOnce(&mut Store)) -> Db {
        let mut store = Store::default();
        seed(&mut store);
        Arc::new(RwLock::new(store))
    }

    /// Start a mock server backed by `db` and return its API base URL.
    fn spawn_env(db: Db) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                mock_server::run_with(listener, db).await
            })
            .unwrap();
        });
        format!("http://{addr}{}", mock_server::API_PREFIX)
    }

    /// Parse a `sync --yes` command line pointed at the two environments.
    fn sync_cli(source_url: &str, target_url: &str, data_dir: &Path) -> Cli {
        let data_dir = data_dir.to_str().unwrap();
        Cli::try_parse_from([
            "crmsync",
            "sync",
            "--yes",
            "--only",
            "lead-status",
            "--source-key",
            "prod_key",
            "--target-key",
            "dev_key",
            "--source-url",
            source_url,
            "--target-url",
            target_url,
            "--data-dir",
            data_dir,
            "--write-delay-ms",
            "0",
        ])
        .unwrap()
    }

    fn run_sync(cli: &Cli) -> Result<()> {
        let Commands::Sync(args) = &cli.command else {
            panic!("expected the sync command");
        };
        sync(&Context::from_cli(cli)?, args)
    }

    /// The single run directory created under `data_dir`.
    fn run_dir(data_dir: &Path) -> std::path::PathBuf {
        let runs: Vec<_> = std::fs::read_dir(data_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(runs.len(), 1, "{runs:?}");
        runs.into_iter().next().unwrap()
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn sync_with_yes_applies_and_archives_the_run() {
        let prod = seeded(|store| {
            store.seed(
                "status/lead",
                vec![json!({"label":"Potential"}), json!({"label":"Qualified"})],
            );
        });
        let dev = seeded(|store| {
            store.seed(
                "status/lead",
                vec![json!({"label":"Potential"}), json!({"label":"Stale"})],
            );
        });
        let data_dir = tempfile::tempdir().unwrap();
        let cli = sync_cli(&spawn_env(prod), &spawn_env(dev.clone()), data_dir.path());

        run_sync(&cli).unwrap();

        assert_eq!(
            dev.blocking_read().names("status/lead", "label"),
            vec!["Potential".to_string(), "Qualified".to_string()]
        );

        let run = run_dir(data_dir.path());
        let report = read_json(&run.join("report.json"));
        assert_eq!(report["dry_run"], json!(false));
        assert_eq!(report["categories"][0]["category"], json!("lead-status"));
        assert_eq!(report["categories"][0]["unchanged"], json!(["Potential"]));
        let statuses: Vec<_> = report["categories"][0]["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| (item["identity"].clone(), item["status"].clone()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (json!("Qualified"), json!("created")),
                (json!("Stale"), json!("deleted")),
            ]
        );

        // Snapshots are taken before any write.
        let before = read_json(&run.join("dev").join("lead-status.json"));
        assert_eq!(before.as_array().unwrap().len(), 2);
        assert_eq!(before[1]["label"], json!("Stale"));
        assert!(run.join("prod").join("lead-status.json").exists());
    }

    #[test]
    fn sync_with_failed_item_errors_after_archiving() {
        let prod = seeded(|store| {
            store.seed("status/lead", vec![json!({"label":"Won"}), json!({"label":"Flaky"})]);
        });
        let dev = seeded(|store| store.reject_creates_named("Flaky"));
        let data_dir = tempfile::tempdir().unwrap();
        let cli = sync_cli(&spawn_env(prod), &spawn_env(dev.clone()), data_dir.path());

        let err = run_sync(&cli).unwrap_err();
        assert_eq!(err.to_string(), "0 categories and 1 items failed");
        assert_eq!(dev.blocking_read().names("status/lead", "label"), vec!["Won".to_string()]);

        let report = read_json(&run_dir(data_dir.path()).join("report.json"));
        assert_eq!(report["categories"][0]["items"][1]["status"], json!("failed"));
    }
}
