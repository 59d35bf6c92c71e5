//! The dispatch engine: paced fan-out of order units with a join barrier.
//!
//! One task is spawned per unit. Each task builds its own payload,
//! serializes it, POSTs it and reports the outcome to the sink before it
//! exits. The engine spaces launches by the configured delay and only
//! returns once every launched task has been joined, so every launched unit
//! is reported exactly once, panics included.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use tokio::task::{Id, JoinSet};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builder::PayloadSource;
use crate::errors::{DispatchError, ErrorCategory};
use crate::metrics::{
    ERROR_RESPONSES_BY_CATEGORY, IN_FLIGHT_REQUESTS, REQUEST_DURATION_SECONDS,
    RESPONSE_STATUS_CODES, UNITS_COMPLETED_TOTAL, UNITS_FAILED_TOTAL, UNITS_LAUNCHED_TOTAL,
};
use crate::outcome::{DispatchOutcome, OutcomeReport};
use crate::pacing::{Pacer, Pacing};
use crate::percentiles::{LatencyTracker, PercentileStats};
use crate::sink::OutcomeSink;
use crate::unit::{UnitLifecycle, UnitState};

/// What to send, where, and how fast.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub total_units: usize,
    pub target_url: String,
    pub launch_delay: Duration,
    pub pacing: Pacing,
}

/// Aggregate view of a finished run.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub requested: usize,
    pub launched: usize,
    pub completed: usize,
    pub failed: usize,
    /// Units skipped because the run was cancelled before their launch.
    pub not_launched: usize,
    pub status_counts: BTreeMap<u16, u64>,
    pub failures_by_category: BTreeMap<&'static str, u64>,
    /// Round-trip latency of completed units.
    pub latency: Option<PercentileStats>,
    pub elapsed: Duration,
}

impl DispatchSummary {
    /// Units that reached a terminal state and were reported.
    pub fn reported(&self) -> usize {
        self.completed + self.failed
    }

    fn record(&mut self, report: &OutcomeReport) {
        match &report.outcome {
            DispatchOutcome::Completed { status, .. } => {
                self.completed += 1;
                *self.status_counts.entry(*status).or_insert(0) += 1;
            }
            DispatchOutcome::Failed(e) => {
                self.failed += 1;
                *self.failures_by_category.entry(e.label()).or_insert(0) += 1;
            }
        }
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dispatch summary:")?;
        writeln!(f, "  Requested:    {}", self.requested)?;
        writeln!(f, "  Launched:     {}", self.launched)?;
        writeln!(f, "  Completed:    {}", self.completed)?;
        writeln!(f, "  Failed:       {}", self.failed)?;
        if self.not_launched > 0 {
            writeln!(f, "  Not launched: {}", self.not_launched)?;
        }
        writeln!(f, "  Elapsed:      {:.2?}", self.elapsed)?;
        for (status, count) in &self.status_counts {
            writeln!(f, "  HTTP {}: {}", status, count)?;
        }
        for (category, count) in &self.failures_by_category {
            writeln!(f, "  {}: {}", category, count)?;
        }
        if let Some(ref latency) = self.latency {
            writeln!(f, "  Latency: {}", latency.format())?;
        }
        Ok(())
    }
}

/// State shared read-only by every unit task of a run.
struct Shared<P> {
    client: reqwest::Client,
    target_url: String,
    payloads: Arc<P>,
    sink: Arc<dyn OutcomeSink>,
    latency: LatencyTracker,
}

pub struct DispatchEngine<P: PayloadSource> {
    client: reqwest::Client,
    payloads: Arc<P>,
    config: DispatchConfig,
    sink: Arc<dyn OutcomeSink>,
}

impl<P: PayloadSource> DispatchEngine<P> {
    pub fn new(
        client: reqwest::Client,
        payloads: P,
        config: DispatchConfig,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        Self {
            client,
            payloads: Arc::new(payloads),
            config,
            sink,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatches every unit and waits for all of them to finish.
    pub async fn run(&self) -> DispatchSummary {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops launching once `cancel` fires.
    ///
    /// Units already in flight race their request against the token; the
    /// losers are reported as [`DispatchError::Cancelled`]. The call still
    /// waits for every launched unit before returning.
    pub async fn run_until_cancelled(&self, cancel: CancellationToken) -> DispatchSummary {
        let total = self.config.total_units;
        let start = Instant::now();
        let shared = Arc::new(Shared {
            client: self.client.clone(),
            target_url: self.config.target_url.clone(),
            payloads: self.payloads.clone(),
            sink: self.sink.clone(),
            latency: LatencyTracker::new(),
        });

        info!(
            total_units = total,
            target_url = %self.config.target_url,
            launch_delay_ms = self.config.launch_delay.as_millis() as u64,
            pacing = %self.config.pacing,
            "Dispatch starting"
        );

        let mut tasks = JoinSet::new();
        // Holds only units still in flight; settle() removes each one as it is joined.
        let mut in_flight: HashMap<Id, (usize, Instant)> = HashMap::new();
        let mut summary = DispatchSummary {
            requested: total,
            ..DispatchSummary::default()
        };
        let mut pacer = Pacer::new(self.config.pacing, self.config.launch_delay);

        for index in 0..total {
            if cancel.is_cancelled() {
                break;
            }

            let launched_at = Instant::now();
            let handle = tasks.spawn(dispatch_unit(
                shared.clone(),
                index,
                launched_at,
                cancel.clone(),
            ));
            in_flight.insert(handle.id(), (index, launched_at));
            summary.launched += 1;
            UNITS_LAUNCHED_TOTAL.inc();
            debug!(index = index, "Unit launched");

            // Reap finished units while waiting so the join set stays small.
            if index + 1 < total {
                let wait = pacer.wait();
                tokio::pin!(wait);
                loop {
                    tokio::select! {
                        _ = &mut wait => break,
                        _ = cancel.cancelled() => break,
                        Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                            self.settle(joined, &mut in_flight, &mut summary);
                        }
                    }
                }
            }
        }

        summary.not_launched = total - summary.launched;
        if summary.not_launched > 0 {
            warn!(
                launched = summary.launched,
                not_launched = summary.not_launched,
                "Dispatch cancelled before all units were launched"
            );
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            self.settle(joined, &mut in_flight, &mut summary);
        }

        summary.latency = shared.latency.stats();
        summary.elapsed = start.elapsed();

        info!(
            launched = summary.launched,
            completed = summary.completed,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Dispatch finished"
        );

        summary
    }

    /// Accounts for one joined task. A task that panicked never reached its
    /// sink call, so its failure is reported here instead.
    fn settle(
        &self,
        joined: Result<(Id, OutcomeReport), tokio::task::JoinError>,
        in_flight: &mut HashMap<Id, (usize, Instant)>,
        summary: &mut DispatchSummary,
    ) {
        match joined {
            Ok((id, report)) => {
                in_flight.remove(&id);
                summary.record(&report);
            }
            Err(join_error) => {
                let Some((index, launched_at)) = in_flight.remove(&join_error.id()) else {
                    error!(error = %join_error, "Joined a task that was never launched");
                    return;
                };
                error!(index = index, error = %join_error, "Unit task aborted");

                let error = DispatchError::TaskPanicked(join_error.to_string());
                UNITS_FAILED_TOTAL.with_label_values(&[error.label()]).inc();
                let report = OutcomeReport {
                    index,
                    code: String::new(),
                    outcome: DispatchOutcome::Failed(error),
                    launched_at,
                    latency: launched_at.elapsed(),
                };
                self.sink.report(&report);
                summary.record(&report);
            }
        }
    }
}

fn advance(unit: &mut UnitLifecycle, next: UnitState) {
    if let Err(e) = unit.advance(next) {
        warn!(error = %e, "Unit state machine violated");
    }
}

/// Build, serialize, send and report one unit.
async fn dispatch_unit<P: PayloadSource>(
    shared: Arc<Shared<P>>,
    index: usize,
    launched_at: Instant,
    cancel: CancellationToken,
) -> OutcomeReport {
    let mut unit = UnitLifecycle::new(index);

    let payload = shared.payloads.build(index);
    let code = shared.payloads.code(&payload);
    advance(&mut unit, UnitState::Built);

    let outcome = match serde_json::to_vec(&payload) {
        Ok(body) => {
            drop(payload);
            advance(&mut unit, UnitState::Sent);
            send(&shared, body, &cancel).await
        }
        Err(e) => DispatchOutcome::Failed(e.into()),
    };
    advance(&mut unit, outcome.state());

    let latency = launched_at.elapsed();
    match &outcome {
        DispatchOutcome::Completed { status, .. } => {
            UNITS_COMPLETED_TOTAL.inc();
            RESPONSE_STATUS_CODES
                .with_label_values(&[crate::metrics::status_code_label(*status)])
                .inc();
            if let Some(category) = ErrorCategory::from_status_code(*status) {
                ERROR_RESPONSES_BY_CATEGORY
                    .with_label_values(&[category.label()])
                    .inc();
            }
            shared.latency.record(latency);
            debug!(index = index, code = %code, status_code = status, "Unit completed");
        }
        DispatchOutcome::Failed(e) => {
            UNITS_FAILED_TOTAL.with_label_values(&[e.label()]).inc();
            debug!(
                index = index,
                code = %code,
                error = %e,
                error_category = e.label(),
                "Unit failed"
            );
        }
    }

    let report = OutcomeReport {
        index,
        code,
        outcome,
        launched_at,
        latency,
    };
    shared.sink.report(&report);
    report
}

async fn send<P>(
    shared: &Shared<P>,
    body: Vec<u8>,
    cancel: &CancellationToken,
) -> DispatchOutcome {
    let request = shared
        .client
        .post(&shared.target_url)
        .header(CONTENT_TYPE, "application/json")
        .body(body);

    IN_FLIGHT_REQUESTS.inc();
    let request_start = Instant::now();

    // The body drain is raced against cancellation along with the send.
    let exchange = async {
        let mut response = request.send().await?;
        let status = response.status();
        // Drain and discard the body so the connection can be reused.
        while let Ok(Some(_chunk)) = response.chunk().await {}
        Ok::<_, reqwest::Error>(status)
    };

    let outcome = tokio::select! {
        result = exchange => match result {
            Ok(status) => DispatchOutcome::completed(status),
            Err(e) => DispatchOutcome::Failed(DispatchError::from_reqwest(&e)),
        },
        _ = cancel.cancelled() => DispatchOutcome::Failed(DispatchError::Cancelled),
    };

    REQUEST_DURATION_SECONDS.observe(request_start.elapsed().as_secs_f64());
    IN_FLIGHT_REQUESTS.dec();
    outcome
}
