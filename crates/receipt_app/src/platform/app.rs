use std::io::{self, BufRead};
use std::mem;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Local;
use intake_logging::{intake_info, intake_warn};
use receipt_core::{update, AppState, Msg, PollerState, SaveStatus};
use receipt_engine::{EngineHandle, StateStore};

use super::commands::{parse_command, SessionCommand, HELP};
use super::config::AppConfig;
use super::effects::EffectRunner;
use super::ui::render;
use super::{logging, persistence};
use crate::cli::{Cli, Command};

const LOG_FILENAME: &str = "receipt_intake.log";
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.config)?;
    let store = StateStore::open(&config.state_dir)
        .with_context(|| format!("opening state directory {:?}", config.state_dir))?;
    logging::initialize(
        config.log,
        intake_logging::level_for(cli.verbose),
        &store.path(LOG_FILENAME),
    );
    intake_info!("receipt_intake starting against {}", config.base_url);

    let engine = EngineHandle::new(config.api_settings()?).context("starting engine")?;
    let (msg_tx, msg_rx) = mpsc::channel();
    let runner = EffectRunner::new(engine, msg_tx);
    let mut app = App {
        state: AppState::with_poll_settings(config.poll_settings()),
        runner,
        msg_rx,
        last_notice: None,
    };

    match cli.command {
        Command::Upload { files, save } => run_upload(&mut app, files, save),
        Command::List => run_list(&mut app),
        Command::Session { files } => run_session(&mut app, &store, files),
    }
}

fn run_upload(app: &mut App, files: Vec<PathBuf>, save: bool) -> anyhow::Result<()> {
    app.handle(Msg::FilesSelected(files));
    app.pump_until(|_, state| state.poller() == PollerState::Drained)?;

    if !save {
        return Ok(());
    }
    app.save_all()?;
    match app.state.last_save().map(|report| report.status) {
        Some(SaveStatus::AllFailed) => bail!("no receipt could be saved"),
        _ => Ok(()),
    }
}

fn run_list(app: &mut App) -> anyhow::Result<()> {
    app.handle(Msg::SavedReceiptsRequested);
    app.pump_until(|msg, _| matches!(msg, Msg::SavedReceiptsLoaded(_)))?;
    if app.state.view().saved_loaded {
        Ok(())
    } else {
        bail!("could not load saved receipts")
    }
}

fn run_session(app: &mut App, store: &StateStore, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let restored = persistence::load_batch(store);
    let has_restored = restored.is_some();
    if let Some(snapshot) = restored {
        app.handle(Msg::RestoreBatch(snapshot));
        if app.state.poller() != PollerState::Drained {
            app.print_status();
        }
    }
    if !files.is_empty() {
        if has_restored {
            println!("A previous batch was restored; save it or use `add` to replace it");
        } else {
            app.handle(Msg::FilesSelected(files));
        }
    }
    println!("Type `help` for commands");

    let input_rx = spawn_input_reader();
    loop {
        app.pump(PUMP_INTERVAL)?;
        let line = match input_rx.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => continue,
            Err(TryRecvError::Disconnected) => break,
        };
        match parse_command(&line) {
            Ok(SessionCommand::Quit) => break,
            Ok(command) => app.execute(command),
            Err(message) => println!("{message}"),
        }
    }

    persistence::save_batch(store, app.state.batch_snapshot().as_ref());
    intake_info!("Session ended");
    Ok(())
}

fn spawn_input_reader() -> mpsc::Receiver<String> {
    let (line_tx, line_rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });
    line_rx
}

struct App {
    state: AppState,
    runner: EffectRunner,
    msg_rx: mpsc::Receiver<Msg>,
    last_notice: Option<String>,
}

impl App {
    fn execute(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Add(paths) => self.handle(Msg::FilesSelected(paths)),
            SessionCommand::Remove(position) => {
                let target = self
                    .state
                    .files()
                    .get(position)
                    .map(|file| (file.key, file.original_name.clone()));
                match target {
                    Some((key, name)) => {
                        self.handle(Msg::FileRemoved { key });
                        if self.state.files().iter().all(|file| file.key != key) {
                            println!("Removed {name}");
                        }
                    }
                    None => println!("There is no file {}", position + 1),
                }
            }
            SessionCommand::Save => self.handle(Msg::SaveAllClicked {
                today: Local::now().date_naive(),
            }),
            SessionCommand::List => self.handle(Msg::SavedReceiptsRequested),
            SessionCommand::Status => self.print_status(),
            SessionCommand::Help => println!("{HELP}"),
            SessionCommand::Quit | SessionCommand::Empty => {}
        }
    }

    fn save_all(&mut self) -> anyhow::Result<()> {
        self.handle(Msg::SaveAllClicked {
            today: Local::now().date_naive(),
        });
        if self.state.is_saving() {
            self.pump_until(|msg, state| {
                matches!(msg, Msg::SaveFinished { .. }) && !state.is_saving()
            })?;
        }
        Ok(())
    }

    /// Waits up to `timeout` for one message, then drains whatever else is queued.
    fn pump(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let first = match self.msg_rx.recv_timeout(timeout) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => Msg::Tick,
            Err(RecvTimeoutError::Disconnected) => bail!("engine event stream closed"),
        };
        self.handle(first);
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.handle(msg);
        }
        Ok(())
    }

    fn pump_until<F>(&mut self, mut done: F) -> anyhow::Result<()>
    where
        F: FnMut(&Msg, &AppState) -> bool,
    {
        loop {
            let msg = match self.msg_rx.recv_timeout(PUMP_INTERVAL) {
                Ok(msg) => msg,
                Err(RecvTimeoutError::Timeout) => Msg::Tick,
                Err(RecvTimeoutError::Disconnected) => bail!("engine event stream closed"),
            };
            let seen = msg.clone();
            self.handle(msg);
            if done(&seen, &self.state) {
                return Ok(());
            }
        }
    }

    /// Runs one message through `update`, executes its effects and prints what changed.
    fn handle(&mut self, msg: Msg) {
        let poller_before = self.state.poller();
        let was_saving = self.state.is_saving();
        let state = mem::take(&mut self.state);
        let report_arrived = matches!(msg, Msg::SaveFinished { .. });
        let loaded_list = matches!(msg, Msg::SavedReceiptsLoaded(Ok(_)));

        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        self.state = state;
        self.runner.enqueue(effects);

        if !was_dirty {
            return;
        }
        let view = self.state.view();
        if view.notice != self.last_notice {
            if let Some(notice) = &view.notice {
                println!("{notice}");
            }
            self.last_notice = view.notice.clone();
        }
        if poller_before != PollerState::Drained && view.poller == PollerState::Drained {
            self.print_status();
        }
        if report_arrived && was_saving && !self.state.is_saving() {
            match &view.last_save {
                Some(report) => print_lines(render::report_lines(report)),
                None => intake_warn!("Save finished without a report"),
            }
        }
        if loaded_list {
            print_lines(render::saved_lines(&view.saved));
        }
    }

    fn print_status(&self) {
        print_lines(render::status_lines(&self.state.view()));
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}
