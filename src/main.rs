use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use bee_headless::{
	config::{AppConfig, SettingsFlags},
	console::{Command, HELP},
	controller::{Autopilot, Phase, Ticker},
	live::LivePage,
	page::{Clock, PageDriver, TokioClock},
	policy::Policy,
	resolver::Resolution,
	store::{AnswerStore, FileStore, StateStore},
};
use chromiumoxide::browser::{Browser, BrowserConfig};
use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::eyre};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
#[cfg(feature = "xdg")]
use v_utils::xdg_state_dir;
use v_utils::{elog, io::confirm, log};

#[derive(Parser)]
#[command(name = "bee_headless")]
#[command(about = "Answers multiple-choice challenges from a locally learned answer table", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
	#[command(flatten)]
	settings: SettingsFlags,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Open the site in a browser and drive it from the console
	Run {
		/// Page to open; its origin selects the answer store
		url: String,
		/// Start the autopilot right away
		#[arg(long)]
		auto: bool,
	},
	/// Resolve the question on a page once and exit
	Solve {
		url: String,
	},
	/// Merge answers from a JSON file into an origin's store
	Import {
		/// Any URL of the site
		url: String,
		file: PathBuf,
	},
	/// Print or write an origin's answers as JSON
	Export {
		url: String,
		file: Option<PathBuf>,
	},
	/// Forget every stored answer of an origin
	Clear {
		url: String,
		/// Don't ask for confirmation
		#[arg(short, long)]
		yes: bool,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	let cli = Cli::parse();
	let config = AppConfig::try_build(cli.settings).map_err(|e| eyre!("Failed to load config: {e}"))?;

	match cli.command {
		Commands::Run { url, auto } => run(&config, &url, auto).await,
		Commands::Solve { url } => solve(&config, &url).await,
		Commands::Import { url, file } => {
			let mut storage = storage_for(&config, &url)?;
			let mut store = AnswerStore::load(&storage);
			let written = import_file(&mut store, &file)?;
			store.save(&mut storage)?;
			log!("Imported {written} answer(s), {} stored for this site", store.len());
			Ok(())
		}
		Commands::Export { url, file } => {
			let storage = storage_for(&config, &url)?;
			write_export(&AnswerStore::load(&storage).to_json_pretty()?, file.as_deref())
		}
		Commands::Clear { url, yes } => {
			let mut storage = storage_for(&config, &url)?;
			if yes || confirm("Delete every stored answer for this site?").await {
				AnswerStore::new().save(&mut storage)?;
				log!("Answer store cleared");
			}
			Ok(())
		}
	}
}

fn load_policy(config: &AppConfig) -> Result<Policy> {
	match &config.policy_file {
		Some(path) => Policy::load_overrides(Path::new(path)),
		None => Ok(Policy::default()),
	}
}

/// Per-origin storage under the configured (or XDG) state dir
fn storage_for(config: &AppConfig, url: &str) -> Result<FileStore> {
	let dir = match &config.state_dir {
		Some(dir) => PathBuf::from(dir),
		None => default_state_dir()?,
	};
	Ok(FileStore::for_origin(&dir, url))
}

#[cfg(feature = "xdg")]
fn default_state_dir() -> Result<PathBuf> {
	Ok(xdg_state_dir!("origins").to_path_buf())
}

#[cfg(not(feature = "xdg"))]
fn default_state_dir() -> Result<PathBuf> {
	Err(eyre!("No storage location: set `state_dir` in the config or build with the `xdg` feature"))
}

fn import_file(store: &mut AnswerStore, file: &Path) -> Result<usize> {
	let payload = std::fs::read_to_string(file).map_err(|e| eyre!("Failed to read {}: {e}", file.display()))?;
	store.import(&payload).map_err(|e| eyre!("Import rejected, nothing changed: {e}"))
}

fn write_export(json: &str, file: Option<&Path>) -> Result<()> {
	match file {
		Some(path) => {
			std::fs::write(path, json).map_err(|e| eyre!("Failed to write {}: {e}", path.display()))?;
			log!("Answers written to {}", path.display());
		}
		None => println!("{json}"),
	}
	Ok(())
}

/// Where a console `export` without a file name goes
fn default_export_path() -> PathBuf {
	PathBuf::from(format!("beeware-db-{}.json", chrono::Local::now().format("%Y%m%d-%H%M%S")))
}

/// Run the stop hook with a message if configured
fn run_stop_hook(config: &AppConfig, message: &str) {
	if let Some(ref hook) = config.stop_hook {
		log!("Running stop hook: {} {:?}", hook, message);
		// Escape single quotes for shell: replace ' with '\''
		let escaped = message.replace('\'', "'\\''");
		let _ = tokio::process::Command::new("sh").arg("-c").arg(format!("{} '{}'", hook, escaped)).spawn();
	}
}

async fn launch_browser(config: &AppConfig) -> Result<(Browser, tokio::task::JoinHandle<()>)> {
	let browser_config = if config.visible {
		BrowserConfig::builder()
			.with_head() // Visible browser with UI
			.build()
			.map_err(|e| eyre!("Failed to build browser config: {}", e))?
	} else {
		BrowserConfig::builder().build().map_err(|e| eyre!("Failed to build browser config: {}", e))?
	};

	let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| eyre!("Failed to launch browser: {}", e))?;

	// Spawn a task to handle browser events (suppress errors as they're mostly noise)
	let handle = tokio::spawn(async move {
		while let Some(_event) = handler.next().await {
			// Silently consume events to prevent the browser from hanging
		}
	});
	Ok((browser, handle))
}

async fn open_page(browser: &Browser, url: &str, policy: &Policy) -> Result<LivePage> {
	let page = browser.new_page(url).await.map_err(|e| eyre!("Failed to open {url}: {e}"))?;
	// Let the single-page app render before the first read
	tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
	Ok(LivePage::new(page, policy))
}

async fn solve(config: &AppConfig, url: &str) -> Result<()> {
	let policy = Arc::new(load_policy(config)?);
	let storage = storage_for(config, url)?;
	let (mut browser, handle) = launch_browser(config).await?;
	let page = open_page(&browser, url, &policy).await?;

	let mut autopilot = Autopilot::new(page, storage, TokioClock, policy, config.timing());
	let outcome = autopilot.solve_now().await;

	browser.close().await.map_err(|e| eyre!("Failed to close browser: {}", e))?;
	handle.abort();
	report(&outcome?);
	Ok(())
}

fn report(resolution: &Resolution) {
	match resolution {
		Resolution::Answered { option, advanced } => log!("Selected {option:?}{}", if *advanced { ", moved on" } else { "" }),
		Resolution::NothingToResolve => elog!("No question/options detected"),
		Resolution::NoMatch { answer } => elog!("Stored answer {answer:?} matches none of the options"),
		Resolution::Learning { question } => log!("Waiting for your pick on {question:?}"),
		Resolution::Unknown { question } => log!("No stored answer for {question:?} (turn on `learn` to record one)"),
	}
}

async fn run(config: &AppConfig, url: &str, auto: bool) -> Result<()> {
	let policy = Arc::new(load_policy(config)?);
	let storage = storage_for(config, url)?;
	log!("Answer store: {}", storage.path().display());

	let (mut browser, handle) = launch_browser(config).await?;
	let page = open_page(&browser, url, &policy).await?;

	let timing = config.timing();
	let mut autopilot = Autopilot::new(page, storage, TokioClock, policy, timing);
	log!("{} answer(s) known for this site", autopilot.store().len());
	if auto || autopilot.phase() == Phase::Polling {
		// resuming a persisted run re-captures the loop target too
		autopilot.start().await?;
	}

	let mut ticker = Ticker::new(timing.poll_interval);
	ticker.follow(autopilot.phase());
	let mut watch = tokio::time::interval(timing.poll_interval);
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdin_open = true;
	eprintln!("{HELP}\nIn the page: Ctrl+Alt+S start/stop, Ctrl+Alt+X stop");

	loop {
		let before = autopilot.phase();
		tokio::select! {
			_ = ticker.tick() => {
				if let Err(e) = autopilot.tick().await {
					elog!("Tick skipped: {e}");
				}
			}
			_ = watch.tick() => {
				if let Err(e) = autopilot.watch().await {
					tracing::debug!("Watch skipped: {e}");
				}
			}
			line = lines.next_line(), if stdin_open => match line {
				Ok(Some(line)) => match Command::parse(&line) {
					Ok(Some(Command::Quit)) => break,
					Ok(Some(command)) =>
						if let Err(e) = handle_command(&mut autopilot, command).await {
							elog!("{e}");
						},
					Ok(None) => {}
					Err(e) => elog!("{e}"),
				},
				Ok(None) => stdin_open = false,
				Err(e) => {
					elog!("Failed to read stdin: {e}");
					stdin_open = false;
				}
			},
			_ = tokio::signal::ctrl_c() => break,
		}

		let after = autopilot.phase();
		ticker.follow(after);
		if before == Phase::Polling && after == Phase::Idle {
			run_stop_hook(config, "Autopilot stopped");
		}
	}

	drop(autopilot);
	browser.close().await.map_err(|e| eyre!("Failed to close browser: {}", e))?;
	handle.abort();
	Ok(())
}

async fn handle_command<P: PageDriver, S: StateStore, C: Clock>(autopilot: &mut Autopilot<P, S, C>, command: Command) -> Result<()> {
	match command {
		Command::ToggleRun => {
			autopilot.toggle_run().await?;
		}
		Command::Stop => autopilot.stop()?,
		Command::ToggleLearning => {
			autopilot.toggle_learning()?;
		}
		Command::ToggleLooping => {
			autopilot.toggle_looping().await?;
		}
		Command::Solve => report(&autopilot.solve_now().await?),
		Command::Import(path) => {
			let payload = std::fs::read_to_string(&path).map_err(|e| eyre!("Failed to read {}: {e}", path.display()))?;
			let written = autopilot.import(&payload).map_err(|e| eyre!("Import rejected, nothing changed: {e}"))?;
			log!("Imported {written} answer(s), {} stored", autopilot.store().len());
		}
		Command::Export(path) => {
			let path = path.unwrap_or_else(default_export_path);
			write_export(&autopilot.export()?, Some(&path))?;
		}
		Command::Clear =>
			if confirm("Delete every stored answer for this site?").await {
				autopilot.clear()?;
				log!("Answer store cleared");
			},
		Command::Back => autopilot.go_back().await?,
		Command::Status => println!("{}", autopilot.status()),
		Command::Help => eprintln!("{HELP}"),
		Command::Quit => {}
	}
	Ok(())
}
