//! Progress reporting for plans and steps
//!
//! The runner and every step report through an explicit [`ProgressSink`]
//! instead of a process-wide console, so plans can be run quietly in tests.

use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Receiver of plan and step lifecycle events
pub trait ProgressSink: Send + Sync {
    /// A step is about to run (its skip check included)
    fn step_started(&self, name: &str, description: &str);

    /// Intermediate status of the running step
    fn update(&self, message: &str);

    /// Extra diagnostic line (verbose / hints mode)
    fn detail(&self, message: &str);

    fn step_skipped(&self, name: &str);

    fn step_completed(&self, name: &str, duration: Duration);

    fn step_failed(&self, name: &str, message: &str, duration: Duration);
}

/// Terminal progress: timestamped lines plus a spinner for the running step
pub struct ConsoleProgress {
    start_time: Instant,
    state: Mutex<ConsoleState>,
}

#[derive(Default)]
struct ConsoleState {
    spinner: Option<ProgressBar>,
    description: Option<String>,
    durations: Vec<(String, Duration)>,
    errors: usize,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            state: Mutex::new(ConsoleState::default()),
        }
    }

    fn timestamp() -> String {
        Local::now().format("%H:%M:%S").to_string()
    }

    fn spinner(description: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{} ...", description));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    fn take_spinner(&self) -> Option<String> {
        let mut state = self.lock();
        if let Some(pb) = state.spinner.take() {
            pb.finish_and_clear();
        }
        state.description.take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConsoleState> {
        // A poisoned lock only means another thread panicked mid-print.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Print a summary of everything reported so far
    pub fn print_summary(&self, title: &str) {
        let state = self.lock();
        let slowest = state.durations.iter().max_by_key(|(_, d)| *d);

        println!();
        println!("{}", "═".repeat(44));
        println!("Plan Summary: {}", title.cyan().bold());
        println!("{}", "─".repeat(44));
        println!(
            "Total time:    {}",
            format_duration(self.start_time.elapsed()).green()
        );
        if let Some((name, duration)) = slowest {
            println!("Slowest step:  {} ({})", name, format_duration(*duration));
        }
        if state.errors > 0 {
            println!("Errors:        {}", state.errors.to_string().red().bold());
        } else {
            println!("Errors:        {}", "0".green());
        }
        println!("{}", "═".repeat(44));
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn step_started(&self, _name: &str, description: &str) {
        let mut state = self.lock();
        if let Some(pb) = state.spinner.take() {
            pb.finish_and_clear();
        }
        state.spinner = Some(Self::spinner(description));
        state.description = Some(description.to_string());
    }

    fn update(&self, message: &str) {
        let state = self.lock();
        if let (Some(pb), Some(description)) = (&state.spinner, &state.description) {
            pb.set_message(format!("{} ... {}", description, message));
        }
    }

    fn detail(&self, message: &str) {
        let line = format!("[{}]   → {}", Self::timestamp().dimmed(), message.cyan());
        let state = self.lock();
        match &state.spinner {
            Some(pb) => pb.println(line),
            None => println!("{}", line),
        }
    }

    fn step_skipped(&self, name: &str) {
        let description = self.take_spinner().unwrap_or_else(|| name.to_string());
        println!(
            "[{}] {} {} ({})",
            Self::timestamp().dimmed(),
            "⏭".yellow(),
            description,
            "already done".dimmed()
        );
    }

    fn step_completed(&self, name: &str, duration: Duration) {
        let description = self.take_spinner().unwrap_or_else(|| name.to_string());
        println!(
            "[{}] {} {} ({})",
            Self::timestamp().dimmed(),
            "✓".green().bold(),
            description,
            format_duration(duration).dimmed()
        );
        self.lock().durations.push((name.to_string(), duration));
    }

    fn step_failed(&self, name: &str, message: &str, duration: Duration) {
        let description = self.take_spinner().unwrap_or_else(|| name.to_string());
        eprintln!(
            "[{}] {} {}: {}",
            Self::timestamp().dimmed(),
            "✗".red().bold(),
            description,
            message.red()
        );
        let mut state = self.lock();
        state.durations.push((name.to_string(), duration));
        state.errors += 1;
    }
}

/// Event captured by [`RecordingProgress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started(String),
    Update(String),
    Detail(String),
    Skipped(String),
    Completed(String),
    Failed { step: String, message: String },
}

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Status updates received, in order
    pub fn updates(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Update(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl ProgressSink for RecordingProgress {
    fn step_started(&self, name: &str, _description: &str) {
        self.push(ProgressEvent::Started(name.to_string()));
    }

    fn update(&self, message: &str) {
        self.push(ProgressEvent::Update(message.to_string()));
    }

    fn detail(&self, message: &str) {
        self.push(ProgressEvent::Detail(message.to_string()));
    }

    fn step_skipped(&self, name: &str) {
        self.push(ProgressEvent::Skipped(name.to_string()));
    }

    fn step_completed(&self, name: &str, _duration: Duration) {
        self.push(ProgressEvent::Completed(name.to_string()));
    }

    fn step_failed(&self, name: &str, message: &str, _duration: Duration) {
        self.push(ProgressEvent::Failed {
            step: name.to_string(),
            message: message.to_string(),
        });
    }
}

/// Format a duration for humans ("50ms", "1.5s", "1m 30s")
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else if total_secs >= 1 {
        format!("{}.{}s", total_secs, millis / 100)
    } else {
        format!("{}ms", millis)
    }
}
