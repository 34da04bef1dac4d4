use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tplsync::baseline::PushBaselineManager;
use tplsync::config::Config;
use tplsync::executor::{self, DirectorySnapshotStore, SnapshotStore};
use tplsync::lock::FileLockManager;
use tplsync::logging::{self, info};
use tplsync::progress::{self, ProgressReporter};
use tplsync::strategies::ConflictStrategy;
use tplsync::sync::SyncBuilder;
use tplsync::types::Change;

///////////////////////
// Utility functions //
///////////////////////

/// Defaults, then config file, then TPLSYNC_* variables, then flags
fn load_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
	let mut config = match matches.get_one::<String>("config") {
		Some(path) => Config::load(Path::new(path))?,
		None => Config::load_default()?,
	};
	config.apply_env()?;
	if let Some(dir) = matches.get_one::<String>("state-dir") {
		config.state_dir = PathBuf::from(dir);
	}
	config.validate()?;
	Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn print_changes(changes: &[Change]) {
	for change in changes {
		let mut line = format!("{:>4}  {:<8} {}", change.priority, change.change_type.to_string(), change.path);
		if let Some(old) = &change.old_path {
			line.push_str(&format!(" (from {})", old));
		}
		if change.is_conflicted() {
			line.push_str("  [conflict]");
		}
		println!("{}  ({:.2})", line, change.confidence());
		for err in &change.validation.errors {
			println!("        error: {}", err);
		}
		for warning in &change.validation.warnings {
			println!("        warning: {}", warning);
		}
	}
}

fn arg_path(matches: &ArgMatches, name: &str) -> Result<PathBuf, Box<dyn Error>> {
	matches
		.get_one::<String>(name)
		.map(PathBuf::from)
		.ok_or_else(|| format!("missing <{}> argument", name).into())
}

fn cli() -> Command {
	let dir = |name: &'static str| Arg::new(name).required(true);
	Command::new("tplsync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Template asset propagation")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.global(true)
				.help("Config file (.toml, .json or .json5)"),
		)
		.arg(
			Arg::new("state-dir")
				.long("state-dir")
				.value_name("DIR")
				.global(true)
				.help("State directory for locks, backups and baselines"),
		)
		.arg(
			Arg::new("json")
				.long("json")
				.action(ArgAction::SetTrue)
				.global(true)
				.help("Print reports as JSON"),
		)
		.subcommand(
			Command::new("detect")
				.about("Show classified changes without applying them")
				.arg(dir("source"))
				.arg(dir("dest")),
		)
		.subcommand(
			Command::new("sync")
				.about("Propagate source changes into the destination")
				.arg(dir("source"))
				.arg(dir("dest"))
				.arg(Arg::new("dry-run").long("dry-run").action(ArgAction::SetTrue))
				.arg(
					Arg::new("conflict")
						.long("conflict")
						.value_name("STRATEGY")
						.help("skip, use_source or keep_local"),
				)
				.arg(
					Arg::new("files")
						.long("files")
						.value_name("PATH")
						.num_args(1..)
						.action(ArgAction::Append)
						.help("Only apply changes to these relative paths"),
				)
				.arg(
					Arg::new("baseline")
						.long("baseline")
						.action(ArgAction::SetTrue)
						.help("Update the push baseline after a clean run"),
				)
				.arg(
					Arg::new("allow-invalid")
						.long("allow-invalid")
						.action(ArgAction::SetTrue)
						.help("Drop invalid changes instead of refusing the plan"),
				),
		)
		.subcommand(
			Command::new("rollback")
				.about("Restore a destination from a plan backup")
				.arg(dir("dest"))
				.arg(dir("backup-id")),
		)
		.subcommand(
			Command::new("locks")
				.about("Lock maintenance")
				.subcommand_required(true)
				.subcommand(Command::new("sweep").about("Remove stale locks")),
		)
		.subcommand(
			Command::new("baseline")
				.about("Push baseline inspection")
				.subcommand_required(true)
				.subcommand(
					Command::new("diff")
						.about("Compare the destination with its baseline")
						.arg(dir("dest")),
				)
				.subcommand(
					Command::new("update")
						.about("Record the destination's current state as pushed")
						.arg(dir("dest")),
				),
		)
		.subcommand(
			Command::new("cleanup")
				.about("Remove temp files left by interrupted updates")
				.arg(dir("dest")),
		)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = cli().get_matches();
	let config = load_config(&matches)?;
	logging::init_tracing(&config.log_level);
	let json = matches.get_flag("json");

	if let Some(sub) = matches.subcommand_matches("detect") {
		let analysis = SyncBuilder::with_config(config)
			.source(arg_path(sub, "source")?)
			.destination(arg_path(sub, "dest")?)
			.analyze()
			.await?;
		if json {
			print_json(&analysis)?;
		} else {
			print_changes(&analysis.classification.changes);
			info!("{} change(s)", analysis.classification.changes.len());
		}
	} else if let Some(sub) = matches.subcommand_matches("sync") {
		let mut config = config;
		if let Some(strategy) = sub.get_one::<String>("conflict") {
			config.conflict_strategy = ConflictStrategy::from_str(strategy)?;
		}
		if sub.get_flag("dry-run") {
			config.dry_run = true;
		}
		if sub.get_flag("allow-invalid") {
			config.block_on_invalid = false;
		}

		let locks = FileLockManager::new(&config);
		locks.install_shutdown_hook();

		let mut builder = SyncBuilder::with_config(config)
			.source(arg_path(sub, "source")?)
			.destination(arg_path(sub, "dest")?)
			.update_baseline(sub.get_flag("baseline"))
			.lock_manager(locks);
		if let Some(files) = sub.get_many::<String>("files") {
			builder = builder.select_files(files.cloned());
		}

		let renderer = if json {
			None
		} else {
			let (reporter, rx) = ProgressReporter::channel();
			builder = builder.progress(reporter);
			Some(tokio::spawn(progress::render_to_stderr(rx)))
		};

		let result = builder.sync().await;
		if let Some(handle) = renderer {
			let _ = handle.await;
		}
		let result = result?;

		if json {
			print_json(&result)?;
		} else {
			for op in &result.execution.operations {
				println!(
					"{:<10} {:<8} {}  {}",
					op.status.map(|s| s.to_string()).unwrap_or_default(),
					op.kind.to_string(),
					op.path,
					op.message.as_deref().unwrap_or("")
				);
			}
			if let Some(id) = &result.execution.backup_id {
				println!("backup: {}", id);
			}
		}
		if !result.execution.is_success() {
			std::process::exit(1);
		}
	} else if let Some(sub) = matches.subcommand_matches("rollback") {
		let store = DirectorySnapshotStore::new(config.backup_dir());
		let backup_id = sub.get_one::<String>("backup-id").ok_or("missing <backup-id> argument")?;
		let restored = store.restore_snapshot(backup_id, &arg_path(sub, "dest")?).await?;
		info!("Restored {} path(s) from backup {}", restored, backup_id);
	} else if let Some(sub) = matches.subcommand_matches("locks") {
		if sub.subcommand_matches("sweep").is_some() {
			let removed = FileLockManager::new(&config).sweep()?;
			info!("Removed {} stale lock(s)", removed);
		}
	} else if let Some(sub) = matches.subcommand_matches("baseline") {
		let manager = PushBaselineManager::new(&config);
		if let Some(diff_matches) = sub.subcommand_matches("diff") {
			let dest = arg_path(diff_matches, "dest")?;
			let current = manager.current_hashes(&dest).await?;
			let diff = manager.detect_changes(&dest, &current).await?;
			if json {
				print_json(&diff)?;
			} else {
				if !diff.has_baseline {
					println!("no baseline recorded yet");
				}
				for (label, paths) in
					[("added", &diff.added), ("modified", &diff.modified), ("deleted", &diff.deleted)]
				{
					for path in paths {
						println!("{:<9} {}", label, path);
					}
				}
			}
		} else if let Some(update_matches) = sub.subcommand_matches("update") {
			let dest = arg_path(update_matches, "dest")?;
			let current = manager.current_hashes(&dest).await?;
			let baseline = manager.update_baseline(&dest, &current, None).await?;
			info!("Baseline recorded {} path(s)", baseline.entries.len());
		}
	} else if let Some(sub) = matches.subcommand_matches("cleanup") {
		let removed = executor::cleanup_temp_files(&arg_path(sub, "dest")?).await?;
		info!("Removed {} temp file(s)", removed);
	}

	Ok(())
}

// vim: ts=4
