//! Manual controls, one command per stdin line.

use std::path::PathBuf;

use color_eyre::{Result, eyre::bail};

pub const HELP: &str = "\
commands:
  auto | s          toggle the autopilot
  stop | x          force stop
  learn             toggle learning mode (your next pick on an unknown question is remembered)
  loop              toggle reopening the same challenge after it ends
  solve             resolve the current question once
  import <file>     merge answers from a JSON file
  export [file]     write all answers as JSON (stdout if no file)
  clear             forget every stored answer
  back              click the page's back control
  status            show flags and answer count
  quit              exit";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
	ToggleRun,
	Stop,
	ToggleLearning,
	ToggleLooping,
	Solve,
	Import(PathBuf),
	Export(Option<PathBuf>),
	Clear,
	Back,
	Status,
	Help,
	Quit,
}

impl Command {
	/// `Ok(None)` for a blank line
	pub fn parse(line: &str) -> Result<Option<Self>> {
		let mut words = line.split_whitespace();
		let Some(head) = words.next() else {
			return Ok(None);
		};
		let rest: Vec<&str> = words.collect();
		let path = || (!rest.is_empty()).then(|| PathBuf::from(rest.join(" ")));

		let command = match head.to_lowercase().as_str() {
			"auto" | "s" | "start" => Command::ToggleRun,
			"stop" | "x" => Command::Stop,
			"learn" => Command::ToggleLearning,
			"loop" => Command::ToggleLooping,
			"solve" => Command::Solve,
			"import" => match path() {
				Some(p) => Command::Import(p),
				None => bail!("usage: import <file>"),
			},
			"export" => Command::Export(path()),
			"clear" => Command::Clear,
			"back" => Command::Back,
			"status" => Command::Status,
			"help" | "?" => Command::Help,
			"quit" | "exit" | "q" => Command::Quit,
			other => bail!("unknown command {other:?} (try `help`)"),
		};
		Ok(Some(command))
	}
}
