//! The probe: a fixed batch of typed calls whose results the CLI prints.

use std::fmt;
use std::io::{self, Write};

use envim_rpc::{CallError, Method, PartialList, Session, Value, api, args};
use tracing::debug;

/// Log target for probe progress.
const PROBE_TARGET: &str = "envim_cli::probe";

/// Text whose display width the probe asks the editor for.
const WIDTH_SAMPLE: &str = "envim ✓";

/// One probed method and its rendered outcome.
#[derive(Debug)]
pub(crate) struct ProbeLine {
    method: &'static str,
    outcome: Result<String, CallError>,
}

impl ProbeLine {
    fn new<R, T: fmt::Display>(method: Method<R>, outcome: Result<T, CallError>) -> Self {
        Self {
            method: method.name(),
            outcome: outcome.map(|value| value.to_string()),
        }
    }

    fn listing<T: fmt::Display>(
        method: Method<PartialList<T>>,
        outcome: Result<PartialList<T>, CallError>,
    ) -> Self {
        Self {
            method: method.name(),
            outcome: outcome.map(|list| render_list(&list)),
        }
    }
}

impl fmt::Display for ProbeLine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(value) => write!(formatter, "{}: {value}", self.method),
            Err(error) => write!(formatter, "{}: failed: {error}", self.method),
        }
    }
}

/// Every probed method, in a stable order.
#[derive(Debug)]
pub(crate) struct ProbeReport {
    lines: Vec<ProbeLine>,
}

impl ProbeReport {
    /// Number of calls that did not produce a value.
    pub(crate) fn failures(&self) -> usize {
        self.lines.iter().filter(|line| line.outcome.is_err()).count()
    }

    /// Writes one line per probed method.
    pub(crate) fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in &self.lines {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }
}

/// Issues every probe call at once and waits for all of them.
///
/// Individual call failures are recorded in the report rather than
/// aborting the probe.
pub(crate) async fn collect(session: &Session) -> ProbeReport {
    let current_window = Value::from(0_i64);
    let (line, buffer, buffers, window, cursor, width) = tokio::join!(
        session.request(api::GET_CURRENT_LINE, Vec::new()),
        session.request(api::GET_CURRENT_BUF, Vec::new()),
        session.request(api::LIST_BUFS, Vec::new()),
        session.request(api::GET_CURRENT_WIN, Vec::new()),
        session.request(api::WIN_GET_CURSOR, vec![current_window]),
        session.request(api::STRWIDTH, args![WIDTH_SAMPLE]),
    );

    let report = ProbeReport {
        lines: vec![
            ProbeLine::new(api::GET_CURRENT_LINE, line.map(|text| format!("{text:?}"))),
            ProbeLine::new(api::GET_CURRENT_BUF, buffer),
            ProbeLine::listing(api::LIST_BUFS, buffers),
            ProbeLine::new(api::GET_CURRENT_WIN, window),
            ProbeLine::new(api::WIN_GET_CURSOR, cursor),
            ProbeLine::new(api::STRWIDTH, width),
        ],
    };
    debug!(
        target: PROBE_TARGET,
        calls = report.lines.len(),
        failures = report.failures(),
        "probe finished"
    );
    report
}

fn render_list<T: fmt::Display>(list: &PartialList<T>) -> String {
    let items: Vec<String> = list.items.iter().map(ToString::to_string).collect();
    let mut rendered = if items.is_empty() {
        "(none)".to_owned()
    } else {
        items.join(", ")
    };
    if !list.is_complete() {
        rendered.push_str(&format!(" ({} skipped)", list.skipped));
    }
    rendered
}
