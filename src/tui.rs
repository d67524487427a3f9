//! Terminal UI front-end.
//!
//! Three panels: a one-line CPU/memory monitor refreshed at 1 Hz, a
//! scrolling log of operational lines, and a byte progress gauge. The
//! copy engine runs on a worker thread and reports through a channel;
//! this thread owns the terminal.
//!
//! The terminal is restored on every exit path, including panics.

use std::io::{self, Stdout};
use std::panic;
use std::path::Path;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use sysinfo::System;

use crate::engine::{CopyStats, EngineError, EventSink};
use crate::progress::{timestamp, LogTee};
use crate::signal::ShutdownHandler;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);
const MAX_LOG_LINES: usize = 500;

type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Events flowing from the engine thread to the UI thread.
enum UiEvent {
    Log(String),
    Progress { copied: u64, total: u64 },
    Fatal(String),
}

/// `EventSink` that forwards engine output to the UI thread.
struct TuiSink {
    tx: Sender<UiEvent>,
    tee: LogTee,
}

impl EventSink for TuiSink {
    fn log(&self, line: &str) {
        let stamped = format!("[{}] {}", timestamp(), line);
        self.tee.write_line(&stamped);
        let _ = self.tx.send(UiEvent::Log(stamped));
    }

    fn progress(&self, copied: u64, total: u64) {
        let _ = self.tx.send(UiEvent::Progress { copied, total });
    }

    fn fatal(&self, line: &str) {
        let stamped = format!("[{}] [FATAL] {}", timestamp(), line);
        self.tee.write_line(&stamped);
        let _ = self.tx.send(UiEvent::Fatal(stamped));
    }
}

/// UI state accumulated from engine events.
struct UiState {
    lines: Vec<String>,
    copied: u64,
    total: u64,
    done: bool,
    fatal: bool,
}

impl UiState {
    fn new(total: u64) -> Self {
        Self {
            lines: Vec::new(),
            copied: 0,
            total,
            done: false,
            fatal: false,
        }
    }

    fn push_line(&mut self, line: String) {
        self.lines.push(line);
        if self.lines.len() > MAX_LOG_LINES {
            let excess = self.lines.len() - MAX_LOG_LINES;
            self.lines.drain(..excess);
        }
    }

    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(line) => self.push_line(line),
            UiEvent::Progress { copied, total } => {
                self.copied = copied;
                self.total = total;
            }
            UiEvent::Fatal(line) => {
                self.push_line(line);
                self.fatal = true;
            }
        }
    }
}

/// Run the copy engine under the TUI.
///
/// `copy` receives the sink wired to this UI and runs on a worker thread;
/// the calling thread drives the terminal until the copy finishes and the
/// user dismisses the screen (or requests shutdown with `q`/Ctrl+C).
pub fn run_with_ui<F>(
    total_bytes: u64,
    log_path: Option<&Path>,
    shutdown: &ShutdownHandler,
    banner: &[String],
    copy: F,
) -> io::Result<Result<CopyStats, EngineError>>
where
    F: FnOnce(&dyn EventSink) -> Result<CopyStats, EngineError> + Send,
{
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    let result = run_inner(total_bytes, log_path, shutdown, banner, copy);

    let _ = panic::take_hook();
    result
}

fn run_inner<F>(
    total_bytes: u64,
    log_path: Option<&Path>,
    shutdown: &ShutdownHandler,
    banner: &[String],
    copy: F,
) -> io::Result<Result<CopyStats, EngineError>>
where
    F: FnOnce(&dyn EventSink) -> Result<CopyStats, EngineError> + Send,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let sink = TuiSink {
        tx,
        tee: LogTee::open(log_path),
    };
    for line in banner {
        sink.log(line);
    }

    let mut terminal = setup_terminal()?;
    let mut state = UiState::new(total_bytes);

    let outcome = std::thread::scope(|scope| {
        let handle = scope.spawn(move || {
            let result = copy(&sink);
            sink.log("Copy process completed. Press any key to exit.");
            result
        });
        let ui_result = event_loop(&mut terminal, &rx, &mut state, shutdown, &handle);
        let copy_result = handle
            .join()
            .unwrap_or(Err(EngineError::Fatal("Copy worker panicked".into())));
        ui_result.map(|()| copy_result)
    });

    restore_terminal()?;
    outcome
}

fn event_loop(
    terminal: &mut Terminal,
    rx: &Receiver<UiEvent>,
    state: &mut UiState,
    shutdown: &ShutdownHandler,
    handle: &std::thread::ScopedJoinHandle<'_, Result<CopyStats, EngineError>>,
) -> io::Result<()> {
    let mut system = System::new();
    let mut monitor_line = String::from("CPU: --% | Mem: --%");
    let mut last_monitor = Instant::now() - MONITOR_INTERVAL;

    loop {
        for event in rx.try_iter() {
            state.apply(event);
        }
        if handle.is_finished() {
            state.done = true;
        }

        if last_monitor.elapsed() >= MONITOR_INTERVAL {
            last_monitor = Instant::now();
            monitor_line = sample_monitor(&mut system);
        }

        terminal.draw(|frame| render(frame, state, &monitor_line))?;

        if event::poll(POLL_TIMEOUT)? {
            if let Event::Key(key) = event::read()? {
                let ctrl_c = key.code == KeyCode::Char('c')
                    && key.modifiers.contains(KeyModifiers::CONTROL);
                if state.done {
                    // Any key dismisses the finished screen.
                    return Ok(());
                }
                if key.code == KeyCode::Char('q') || ctrl_c {
                    shutdown.request_shutdown();
                }
            }
        }

        if state.done && shutdown.is_shutdown_requested() {
            return Ok(());
        }
    }
}

/// One line of CPU and memory usage, refreshed at the monitor interval.
fn sample_monitor(system: &mut System) -> String {
    system.refresh_cpu_usage();
    system.refresh_memory();
    let cpu = system.global_cpu_info().cpu_usage();
    let used = system.used_memory();
    let total = system.total_memory();
    let mem_pct = if total > 0 {
        used as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    format!(
        "CPU: {:.2}% | Mem: {:.2}% ({} / {})",
        cpu,
        mem_pct,
        bytesize::ByteSize::b(used),
        bytesize::ByteSize::b(total)
    )
}

fn render(frame: &mut Frame, state: &UiState, monitor_line: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(
        Paragraph::new(monitor_line).style(Style::default().fg(Color::Cyan)),
        chunks[0],
    );

    // Tail of the log, newest lines kept visible.
    let visible = chunks[1].height as usize;
    let start = state.lines.len().saturating_sub(visible.saturating_sub(2));
    let items: Vec<ListItem> = state.lines[start..]
        .iter()
        .map(|l| ListItem::new(l.as_str()))
        .collect();
    let log = List::new(items).block(Block::default().borders(Borders::ALL).title("Log"));
    frame.render_widget(log, chunks[1]);

    let ratio = if state.total > 0 {
        (state.copied as f64 / state.total as f64).min(1.0)
    } else if state.done {
        1.0
    } else {
        0.0
    };
    let label = format!(
        "{} / {}",
        bytesize::ByteSize::b(state.copied),
        bytesize::ByteSize::b(state.total)
    );
    let color = if state.fatal { Color::Red } else { Color::Green };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Total"))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, chunks[2]);
}

fn setup_terminal() -> io::Result<Terminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
