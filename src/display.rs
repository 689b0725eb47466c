//! Terminal display of the controller's active codes
//!
//! Polls on a fixed period, keeps polling whether or not the controller is
//! reachable, and redraws the code table only when it changes.

use lcnckit_communication::{ConnectionMonitor, ConnectionTransition, StatusChannel};
use lcnckit_core::{render_code_table, CodeRow, EventDispatcher, StatusSnapshot};
use lcnckit_settings::DisplaySettings;
use std::io::Write;
use tokio::time::MissedTickBehavior;

/// Code table kept between refreshes
#[derive(Debug, Clone)]
pub struct CodeDisplay {
    rows: usize,
    current: Option<Vec<CodeRow>>,
}

impl CodeDisplay {
    /// Empty display clipped to `rows` table rows
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            current: None,
        }
    }

    /// Lay out the snapshot's codes; true when the table differs from the last one
    pub fn update(&mut self, snapshot: &StatusSnapshot) -> bool {
        let rows = render_code_table(&snapshot.gcodes(), &snapshot.mcodes(), self.rows);
        if self.current.as_ref() == Some(&rows) {
            return false;
        }
        self.current = Some(rows);
        true
    }

    /// Forget the current table so the next update redraws
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Rows of the current table, empty before the first update
    pub fn rows(&self) -> &[CodeRow] {
        self.current.as_deref().unwrap_or(&[])
    }

    /// Table text with a header line
    pub fn render(&self) -> String {
        let mut out = String::from("  Code  Label\n");
        for row in self.rows() {
            out.push_str(&row.to_string());
            out.push('\n');
        }
        out
    }
}

/// Counters from a monitor session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Polls attempted
    pub polls: u64,
    /// Times the table was printed
    pub redraws: u64,
    /// Times the controller went missing
    pub losses: u64,
}

/// Poll `controller` and print the code table until interrupted
///
/// Stops after `iterations` polls when given, otherwise on Ctrl-C. Controller
/// failures never end the loop; they are reported once per loss.
pub async fn run_monitor<C, W>(
    controller: &mut C,
    settings: DisplaySettings,
    iterations: Option<u64>,
    dispatcher: Option<EventDispatcher>,
    out: &mut W,
) -> anyhow::Result<MonitorSummary>
where
    C: StatusChannel + ?Sized,
    W: Write,
{
    let mut monitor = ConnectionMonitor::new();
    if let Some(dispatcher) = dispatcher {
        monitor = monitor.with_dispatcher(dispatcher);
    }
    let mut display = CodeDisplay::new(settings.rows);
    let mut summary = MonitorSummary::default();

    let mut ticker = tokio::time::interval(settings.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        if iterations.is_some_and(|limit| summary.polls >= limit) {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("Monitor interrupted");
                break;
            }
        }

        summary.polls += 1;
        let (snapshot, transition) = monitor.observe(controller.poll());
        match transition {
            Some(ConnectionTransition::Detected) => {
                writeln!(out, "Controller detected")?;
            }
            Some(ConnectionTransition::NotDetected(_)) => {
                writeln!(out, "Controller not detected")?;
                display.invalidate();
            }
            None => {}
        }

        if let Some(snapshot) = snapshot {
            if display.update(&snapshot) {
                summary.redraws += 1;
                write!(out, "{}", display.render())?;
                out.flush()?;
            }
        }
    }

    summary.losses = monitor.lost_count();
    Ok(summary)
}
