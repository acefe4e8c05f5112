//! table_sync CLI - match client and server tables and synchronize their rows

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use table_sync::config::{self, Config};
use table_sync::matching::TablePairResult;
use table_sync::sync::{CascadeSyncResult, SyncMode, SyncResult};
use table_sync::utils::logging::init_logging;
use table_sync::{find_table, OverrideMap, TableSyncClient};

#[derive(Parser)]
#[command(name = "table_sync")]
#[command(about = "Match client and server game-data tables and synchronize their rows")]
#[command(version)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "table_sync.toml")]
    config: String,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Database(DatabaseCommand),

    /// Manage manual client -> server mappings
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
}

/// Commands that need a database connection
#[derive(Subcommand)]
enum DatabaseCommand {
    /// Scan the schema and list tables with their hierarchy level
    Scan,

    /// Pair every client table with a server table
    Match,

    /// Sync one table pair
    Sync {
        #[arg(long)]
        source: String,

        #[arg(long)]
        target: String,

        /// incremental, update_only, insert_only or full_sync
        #[arg(long)]
        mode: Option<SyncMode>,

        /// Also sync every child table pair of a root pair
        #[arg(long)]
        cascade: bool,

        /// Compute the plan without writing
        #[arg(long)]
        dry_run: bool,

        /// Back up the target before writing
        #[arg(long)]
        backup: bool,

        /// Allow key columns and constraints to be created on the target
        #[arg(long)]
        create_missing_keys: bool,

        /// Required for full_sync, which deletes target rows
        #[arg(long)]
        confirm_delete: bool,
    },

    /// Replace every target row with the source rows
    LegacySync {
        #[arg(long)]
        source: String,

        #[arg(long)]
        target: String,

        #[arg(long)]
        backup: bool,
    },

    /// Restore a table from a backup table
    Restore {
        #[arg(long)]
        table: String,

        #[arg(long)]
        backup: String,
    },
}

#[derive(Subcommand)]
enum OverrideAction {
    Add { client: String, server: String },
    Remove { client: String },
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = config::load_from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Override { action } => manage_overrides(&config, action, cli.json),
        Commands::Database(command) => {
            let client = TableSyncClient::new(config).await?;
            run(&client, command, cli.json).await
        }
    }
}

async fn run(client: &TableSyncClient, command: DatabaseCommand, json: bool) -> anyhow::Result<ExitCode> {
    match command {
        DatabaseCommand::Scan => {
            let tables = client.scan_tables().await?;
            if json {
                print_json(&tables)?;
            } else {
                for table in &tables {
                    println!(
                        "{:<40} {:<8} {:?} columns={} rows~{}",
                        table.name,
                        if table.is_client_side { "client" } else { "server" },
                        table.level(),
                        table.columns.len(),
                        table.row_count
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        DatabaseCommand::Match => {
            let pairs = client.build_pairs().await?;
            if json {
                print_json(&pairs)?;
            } else {
                pairs.iter().for_each(print_pair);
            }
            Ok(ExitCode::SUCCESS)
        }

        DatabaseCommand::Sync {
            source,
            target,
            mode,
            cascade,
            dry_run,
            backup,
            create_missing_keys,
            confirm_delete,
        } => {
            let mut options = client.config().sync.to_options();
            options.mode = mode.unwrap_or(options.mode);
            options.dry_run |= dry_run;
            options.backup_before_write |= backup;
            options.create_missing_keys |= create_missing_keys;

            if options.mode == SyncMode::FullSync && !options.dry_run && !confirm_delete {
                bail!("full_sync deletes target rows missing from the source; pass --confirm-delete");
            }

            let tables = client.scan_tables().await?;
            let source = find_table(&tables, &source)?;
            let target = find_table(&tables, &target)?;
            let engine = client
                .sync_engine_with(options.clone())
                .with_cancellation(cancel_on_ctrl_c());

            if cascade {
                let result = engine
                    .sync_main_table_with_children(source, target, &tables, options.mode)
                    .await;
                report_cascade(&result, json)?;
                return Ok(exit_code(result.is_success()));
            }

            let result = if source.level().is_root() {
                engine.sync_main_table(source, target, options.mode).await
            } else {
                let parents = source
                    .hierarchy
                    .parent_name
                    .as_deref()
                    .zip(target.hierarchy.parent_name.as_deref())
                    .context("child table without a parent")?;
                let mapping = engine
                    .build_primary_key_mapping(find_table(&tables, parents.0)?, find_table(&tables, parents.1)?)
                    .await?;
                engine.sync_sub_table(source, target, &mapping, options.mode).await
            };
            report(&result, json)?;
            Ok(exit_code(result.success))
        }

        DatabaseCommand::LegacySync { source, target, backup } => {
            let tables = client.scan_tables().await?;
            let source = find_table(&tables, &source)?;
            let target = find_table(&tables, &target)?;
            let service = client.data_sync_service().with_cancellation(cancel_on_ctrl_c());
            let service = if backup { service.with_backup(true) } else { service };

            let result = if source.is_client_side {
                service.sync_client_to_server(source, target).await
            } else {
                service.sync_server_to_client(source, target).await
            };
            report(&result, json)?;
            Ok(exit_code(result.success))
        }

        DatabaseCommand::Restore { table, backup } => {
            let restored = client.data_sync_service().restore_from_backup(&table, &backup).await?;
            println!("restored {} rows into {} from {}", restored, table, backup);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn manage_overrides(config: &Config, action: OverrideAction, json: bool) -> anyhow::Result<ExitCode> {
    let path = config
        .matching
        .overrides_file
        .as_deref()
        .context("matching.overrides_file is not configured")?;
    let mut overrides = OverrideMap::load(path)?;

    match action {
        OverrideAction::Add { client, server } => {
            overrides.insert(client.as_str(), server.as_str())?;
            overrides.save(path)?;
            println!("{} -> {}", client, server);
        }
        OverrideAction::Remove { client } => {
            match overrides.remove(&client) {
                Some(server) => println!("removed {} -> {}", client, server),
                None => println!("no mapping for {}", client),
            }
            overrides.save(path)?;
        }
        OverrideAction::List => {
            if json {
                print_json(&overrides)?;
            } else {
                for (client, server) in overrides.iter() {
                    println!("{} -> {}", client, server);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C, rolling back after the current batch...");
            cancel.cancel();
        }
    });
    token
}

fn print_pair(pair: &TablePairResult) {
    let quality = pair
        .quality
        .as_ref()
        .map(|q| format!(" quality={:.3} ({})", q.overall_quality, q.quality_level()))
        .unwrap_or_default();
    println!(
        "{:<40} -> {:<40} [{}] similarity={:.3}{}{}",
        pair.client.name,
        pair.server_name().unwrap_or("-"),
        pair.match_method,
        pair.similarity,
        quality,
        if pair.is_multiple_match { " MULTIPLE" } else { "" }
    );
}

fn report(result: &SyncResult, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(result);
    }
    print_result(result);
    Ok(())
}

fn report_cascade(result: &CascadeSyncResult, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(result);
    }
    print_result(&result.root);
    for child in &result.children {
        print_result(child);
    }
    println!(
        "cascade: {} children succeeded, {} failed{}",
        result.success_count,
        result.failure_count,
        if result.aborted { " (aborted at root)" } else { "" }
    );
    Ok(())
}

fn print_result(result: &SyncResult) {
    println!(
        "{} -> {} [{}{}] {}: inserted={} updated={} unchanged={} skipped={} deleted={} ({} ms)",
        result.source_table,
        result.target_table,
        result.mode,
        if result.dry_run { ", dry run" } else { "" },
        if result.success { "ok" } else { "FAILED" },
        result.inserted_rows,
        result.updated_rows,
        result.unchanged_rows,
        result.skipped_rows,
        result.deleted_rows,
        result.elapsed_ms
    );
    for statement in &result.schema_updates {
        println!("  schema: {}", statement);
    }
    if let Some(backup) = &result.backup_table {
        println!("  backup: {}", backup);
    }
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    for error in &result.errors {
        println!("  error: {}", error);
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_do_not_need_a_database_command() {
        let cli = Cli::try_parse_from(["table_sync", "override", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Override {
                action: OverrideAction::List
            }
        ));

        let cli = Cli::try_parse_from(["table_sync", "--json", "sync", "--source", "client_item", "--target", "item", "--dry-run"])
            .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Database(DatabaseCommand::Sync { dry_run: true, cascade: false, .. })
        ));
    }
}
