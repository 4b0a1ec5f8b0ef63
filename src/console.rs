//! Line-oriented front end over a [`SessionHandler`].
//!
//! Every notice the session produces ends up here as plain text. The console
//! never stops on an analyzer error: it prints the notice and waits for the
//! next line.

use crate::core::AnalyzerError;
use crate::models::{ModelSelector, SentimentPreset};
use crate::session::batch::{BatchTable, DEFAULT_EXPORT_NAME, PREVIEW_ROWS};
use crate::session::{SessionHandler, SessionState};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const EXAMPLES: [&str; 3] = [
    "I love this product! 😍",
    "The food was awful and cold.",
    "It's okay, not the best but functional.",
];

const HELP: &str = "\
Type any text and press enter to classify it.

Commands:
  :model <repo-id>          use any Hugging Face model
  :preset <name>            use a built-in model (see below)
  :batch <input> [output]   classify the `text` column of a CSV file
  :examples                 show example sentences
  :help                     show this message
  :quit                     leave

Start a line with `::` to classify text that begins with `:`.";

const COMMANDS: [&str; 8] = [
    "model", "preset", "batch", "examples", "help", "quit", "q", "exit",
];

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Analyze(String),
    Model(ModelSelector),
    Preset(SentimentPreset),
    Batch { input: PathBuf, output: PathBuf },
    Examples,
    Help,
    Quit,
}

impl Command {
    /// A line is a command when it starts with `:` followed by a command
    /// name; anything else, `:)` included, is text to classify. A leading
    /// `::` sends the rest of the line, starting with `:`, as text. Errors
    /// carry a usage message.
    pub fn parse(line: &str) -> Result<Self, String> {
        let trimmed = line.trim_start();
        if let Some(escaped) = trimmed.strip_prefix("::") {
            return Ok(Command::Analyze(format!(":{escaped}")));
        }
        let Some(rest) = trimmed.strip_prefix(':') else {
            return Ok(Command::Analyze(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        if !COMMANDS.contains(&name) {
            return Ok(Command::Analyze(line.to_string()));
        }
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("model", [id]) => Ok(Command::Model(ModelSelector::new(*id))),
            ("model", _) => Err("usage: :model <repo-id>".into()),
            ("preset", [preset]) => {
                <SentimentPreset as clap::ValueEnum>::from_str(preset, true)
                    .map(Command::Preset)
                    .map_err(|_| format!("unknown preset `{preset}`; {}", preset_names()))
            }
            ("preset", _) => Err(format!("usage: :preset <name>; {}", preset_names())),
            ("batch", [input]) => Ok(Command::Batch {
                input: PathBuf::from(*input),
                output: PathBuf::from(DEFAULT_EXPORT_NAME),
            }),
            ("batch", [input, output]) => Ok(Command::Batch {
                input: PathBuf::from(*input),
                output: PathBuf::from(*output),
            }),
            ("batch", _) => Err("usage: :batch <input> [output]".into()),
            ("examples", []) => Ok(Command::Examples),
            ("help", []) => Ok(Command::Help),
            ("quit" | "q" | "exit", []) => Ok(Command::Quit),
            _ => Err(format!("`:{name}` takes no arguments; type :help")),
        }
    }
}

fn preset_names() -> String {
    let names: Vec<String> = SentimentPreset::ALL
        .iter()
        .filter_map(|p| clap::ValueEnum::to_possible_value(p))
        .map(|v| v.get_name().to_string())
        .collect();
    format!("presets: {}", names.join(", "))
}

/// The session state as shown to the user.
pub fn render_state(state: &SessionState) -> String {
    match state {
        SessionState::Idle => String::new(),
        SessionState::Result { top, .. } => {
            format!("Label: {}\nScore: {}", top.label, top.formatted_score())
        }
        SessionState::Failed(message) => message.clone(),
    }
}

pub struct Console<W> {
    session: SessionHandler,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(session: SessionHandler, out: W) -> Self {
        Self { session, out }
    }

    pub fn session(&self) -> &SessionHandler {
        &self.session
    }

    pub fn into_inner(self) -> (SessionHandler, W) {
        (self.session, self.out)
    }

    /// Read commands from `input` until `:quit` or end of input.
    pub async fn run<R>(&mut self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        writeln!(
            self.out,
            "Sentiment analyzer, model `{}`. Type :help for commands.",
            self.session.selector()
        )?;

        let mut lines = input.lines();
        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(usage) => {
                    writeln!(self.out, "{usage}")?;
                    continue;
                }
            };

            if command == Command::Quit {
                break;
            }
            self.dispatch(command).await?;
        }

        writeln!(self.out)?;
        Ok(())
    }

    async fn dispatch(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Analyze(text) => {
                self.analyze(&text, false).await?;
            }
            Command::Model(selector) => self.select(selector).await?,
            Command::Preset(preset) => self.select(preset.into()).await?,
            Command::Batch { input, output } => {
                self.batch(&input, &output).await?;
            }
            Command::Examples => {
                writeln!(self.out, "Examples:")?;
                for example in EXAMPLES {
                    writeln!(self.out, "- {example}")?;
                }
            }
            Command::Help => {
                writeln!(self.out, "{HELP}")?;
                writeln!(self.out, "{}", preset_names())?;
            }
            Command::Quit => {}
        }
        Ok(())
    }

    async fn busy_notice(&mut self, selector: &ModelSelector) -> anyhow::Result<()> {
        if !self.session.model_handle().is_resolved(selector.identifier()).await {
            writeln!(
                self.out,
                "Loading model `{selector}` - this may take 10-40 seconds the first time..."
            )?;
            self.out.flush()?;
        }
        Ok(())
    }

    async fn select(&mut self, selector: ModelSelector) -> anyhow::Result<()> {
        self.busy_notice(&selector).await?;
        match self.session.select_model(selector).await {
            Ok(classifier) => writeln!(self.out, "Using model `{}`.", classifier.model_id())?,
            Err(err) => writeln!(
                self.out,
                "{err}\nStill using `{}`.",
                self.session.selector()
            )?,
        }
        Ok(())
    }

    /// Classify one text and print the result. With `raw` the full ranked
    /// output follows as JSON.
    pub async fn analyze(&mut self, text: &str, raw: bool) -> anyhow::Result<bool> {
        if self.session.needs_resolution().await && !text.trim().is_empty() {
            let selector = self.session.selector().clone();
            self.busy_notice(&selector).await?;
        }

        let state = match self.session.submit(text).await {
            Ok(state) => state,
            Err(err) => {
                writeln!(self.out, "{err}")?;
                return Ok(false);
            }
        };

        writeln!(self.out, "{}", render_state(state))?;
        if raw {
            if let SessionState::Result { ranked, .. } = state {
                writeln!(self.out, "Raw output:")?;
                writeln!(self.out, "{}", serde_json::to_string_pretty(ranked)?)?;
            }
        }
        Ok(matches!(state, SessionState::Result { .. }))
    }

    /// Classify the `text` column of `input` and write the result to
    /// `output`. Returns whether the batch completed.
    pub async fn batch(&mut self, input: &Path, output: &Path) -> anyhow::Result<bool> {
        match self.try_batch(input, output).await {
            Ok(()) => Ok(true),
            Err(err) => {
                writeln!(self.out, "{err}")?;
                Ok(false)
            }
        }
    }

    async fn try_batch(&mut self, input: &Path, output: &Path) -> Result<(), AnalyzerError> {
        let table = BatchTable::from_path(input)?;
        writeln!(self.out, "Preview:\n{}", table.preview(PREVIEW_ROWS))?;

        if self.session.needs_resolution().await {
            let selector = self.session.selector().clone();
            writeln!(
                self.out,
                "Loading model `{selector}` - this may take 10-40 seconds the first time..."
            )?;
        }
        writeln!(self.out, "Classifying {} rows...", table.len())?;

        let report = self.session.analyze_batch(table).await?;
        report.write_to_path(output)?;

        writeln!(self.out, "Done - preview:\n{}", report.preview(PREVIEW_ROWS))?;
        if report.failures() > 0 {
            writeln!(self.out, "{} of {} rows failed.", report.failures(), report.len())?;
        }
        writeln!(self.out, "Results written to {}", output.display())?;
        Ok(())
    }
}
