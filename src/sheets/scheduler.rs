use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use super::connection::GoogleConnection;
use super::settings::{SyncInterval, SyncMode, SyncSettings, load_settings};
use super::sync::{SyncEngine, SyncResult};
use crate::db::{DbActorHandle, GOOGLE_SHEETS_INTEGRATION_ID};
use crate::error::FormyChatError;

/// What one cron firing did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronOutcome {
    /// The setup is no longer valid for scheduled sync; the event was removed.
    Unscheduled(&'static str),
    /// Nothing to sync into yet.
    Skipped,
    /// Sync pass handed off to a background task.
    Dispatched,
    Synced(SyncResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub scheduled: bool,
    pub interval: Option<SyncInterval>,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum SchedulerMessage {
    /// Schedule when enabled and in scheduled mode, otherwise unschedule. Replies with
    /// whether an event exists afterwards.
    MaybeSchedule(RpcReplyPort<Result<bool, FormyChatError>>),
    /// Replace any existing event. Replies with the first run time.
    Schedule(SyncInterval, RpcReplyPort<DateTime<Utc>>),
    /// Replies with whether an event was removed.
    Unschedule(RpcReplyPort<bool>),
    UpdateFromSettings(SyncSettings, RpcReplyPort<bool>),
    Status(RpcReplyPort<ScheduleStatus>),
    /// Run the firing logic now and wait for the sync pass.
    RunNow(RpcReplyPort<Result<CronOutcome, FormyChatError>>),

    // Internal: sent by the ticker task, tagged with its generation.
    Fire(u64),
}

/// Handle to the periodic sync scheduler.
#[derive(Clone)]
pub struct SyncSchedulerHandle {
    actor: ActorRef<SchedulerMessage>,
}

fn rpc_err(op: &str, e: impl std::fmt::Display) -> FormyChatError {
    FormyChatError::RactorError(format!("SyncScheduler {op} RPC failed: {e}"))
}

impl SyncSchedulerHandle {
    pub async fn spawn(db: DbActorHandle, engine: SyncEngine) -> Result<Self, ActorProcessingErr> {
        let (actor, _jh) = Actor::spawn(None, SyncSchedulerActor, (db, engine))
            .await
            .map_err(|e| {
                ActorProcessingErr::from(format!("SyncSchedulerActor spawn failed: {e}"))
            })?;
        Ok(Self { actor })
    }

    pub async fn maybe_schedule_cron(&self) -> Result<bool, FormyChatError> {
        ractor::call!(self.actor, SchedulerMessage::MaybeSchedule)
            .map_err(|e| rpc_err("MaybeSchedule", e))?
    }

    pub async fn schedule_sync(
        &self,
        interval: SyncInterval,
    ) -> Result<DateTime<Utc>, FormyChatError> {
        ractor::call!(self.actor, SchedulerMessage::Schedule, interval)
            .map_err(|e| rpc_err("Schedule", e))
    }

    pub async fn unschedule_sync(&self) -> Result<bool, FormyChatError> {
        ractor::call!(self.actor, SchedulerMessage::Unschedule)
            .map_err(|e| rpc_err("Unschedule", e))
    }

    /// Scheduled mode gets an event at the configured interval, other modes get none.
    pub async fn update_cron_from_settings(
        &self,
        settings: SyncSettings,
    ) -> Result<bool, FormyChatError> {
        ractor::call!(self.actor, SchedulerMessage::UpdateFromSettings, settings)
            .map_err(|e| rpc_err("UpdateFromSettings", e))
    }

    pub async fn status(&self) -> Result<ScheduleStatus, FormyChatError> {
        ractor::call!(self.actor, SchedulerMessage::Status).map_err(|e| rpc_err("Status", e))
    }

    pub async fn is_scheduled(&self) -> Result<bool, FormyChatError> {
        Ok(self.status().await?.scheduled)
    }

    pub async fn get_next_run(&self) -> Result<Option<DateTime<Utc>>, FormyChatError> {
        Ok(self.status().await?.next_run)
    }

    /// Fires the scheduled job immediately, as if its timer had elapsed.
    pub async fn run_now(&self) -> Result<CronOutcome, FormyChatError> {
        ractor::call!(self.actor, SchedulerMessage::RunNow).map_err(|e| rpc_err("RunNow", e))?
    }
}

struct Ticker {
    generation: u64,
    interval: SyncInterval,
    next_run: DateTime<Utc>,
    task: JoinHandle<()>,
}

struct SyncSchedulerState {
    db: DbActorHandle,
    engine: SyncEngine,
    ticker: Option<Ticker>,
    /// Bumped on every schedule so firings queued by a replaced ticker can be told apart.
    generation: u64,
}

enum Readiness {
    Ready,
    Invalid(&'static str),
    NoSpreadsheet,
}

struct SyncSchedulerActor;

fn next_run_after(interval: SyncInterval) -> DateTime<Utc> {
    let secs = i64::try_from(interval.period().as_secs()).unwrap_or(i64::MAX);
    Utc::now().trunc_subsecs(0) + TimeDelta::seconds(secs)
}

impl SyncSchedulerActor {
    fn schedule(
        &self,
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SyncSchedulerState,
        interval: SyncInterval,
    ) -> DateTime<Utc> {
        self.unschedule(state);

        state.generation += 1;
        let generation = state.generation;
        let period = interval.period();
        let next_run = next_run_after(interval);
        let actor = myself.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if ractor::cast!(actor, SchedulerMessage::Fire(generation)).is_err() {
                    break;
                }
            }
        });

        info!(interval = interval.as_str(), %next_run, "Google Sheets sync scheduled");
        state.ticker = Some(Ticker {
            generation,
            interval,
            next_run,
            task,
        });
        next_run
    }

    fn unschedule(&self, state: &mut SyncSchedulerState) -> bool {
        match state.ticker.take() {
            Some(ticker) => {
                ticker.task.abort();
                info!(interval = ticker.interval.as_str(), "Google Sheets sync unscheduled");
                true
            }
            None => false,
        }
    }

    async fn maybe_schedule(
        &self,
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SyncSchedulerState,
    ) -> Result<bool, FormyChatError> {
        let enabled = state
            .db
            .integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID)
            .await?;
        let settings = load_settings(&state.db).await?;

        if enabled && settings.sync_mode == SyncMode::Scheduled {
            if state.ticker.is_none() {
                self.schedule(myself, state, settings.sync_interval);
            }
            Ok(true)
        } else {
            self.unschedule(state);
            Ok(false)
        }
    }

    async fn readiness(&self, state: &SyncSchedulerState) -> Result<Readiness, FormyChatError> {
        if !state
            .db
            .integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID)
            .await?
        {
            return Ok(Readiness::Invalid("integration disabled"));
        }
        let settings = load_settings(&state.db).await?;
        if settings.sync_mode != SyncMode::Scheduled {
            return Ok(Readiness::Invalid("sync mode is not scheduled"));
        }
        match GoogleConnection::load(&state.db).await? {
            None => return Ok(Readiness::Invalid("not connected")),
            Some(c) if !c.connected => return Ok(Readiness::Invalid("not connected")),
            Some(c) if c.revoked => return Ok(Readiness::Invalid("connection revoked")),
            Some(_) => {}
        }
        if !settings.has_spreadsheet() {
            return Ok(Readiness::NoSpreadsheet);
        }
        Ok(Readiness::Ready)
    }

    /// Shared firing logic. With `wait` the pass runs inline, otherwise on a spawned task.
    async fn fire(
        &self,
        state: &mut SyncSchedulerState,
        wait: bool,
    ) -> Result<CronOutcome, FormyChatError> {
        if let Some(ticker) = state.ticker.as_mut() {
            ticker.next_run = next_run_after(ticker.interval);
        }

        match self.readiness(state).await? {
            Readiness::Invalid(reason) => {
                warn!(reason, "Scheduled Google Sheets sync no longer valid; unscheduling");
                self.unschedule(state);
                Ok(CronOutcome::Unscheduled(reason))
            }
            Readiness::NoSpreadsheet => {
                debug!("Scheduled sync skipped: no spreadsheet selected");
                Ok(CronOutcome::Skipped)
            }
            Readiness::Ready if wait => {
                let result = state.engine.sync_leads(false).await?;
                Ok(CronOutcome::Synced(result))
            }
            Readiness::Ready => {
                let engine = state.engine.clone();
                tokio::spawn(async move {
                    match engine.sync_leads(false).await {
                        Ok(result) if result.success => {
                            debug!(synced = result.synced, "Scheduled sync finished");
                        }
                        Ok(result) => {
                            warn!(error = ?result.error, "Scheduled sync did not complete");
                        }
                        Err(e) => warn!(error = %e, "Scheduled sync failed"),
                    }
                });
                Ok(CronOutcome::Dispatched)
            }
        }
    }
}

#[ractor::async_trait]
impl Actor for SyncSchedulerActor {
    type Msg = SchedulerMessage;
    type State = SyncSchedulerState;
    type Arguments = (DbActorHandle, SyncEngine);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (db, engine): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(SyncSchedulerState {
            db,
            engine,
            ticker: None,
            generation: 0,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        self.unschedule(state);
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SchedulerMessage::MaybeSchedule(rp) => {
                let _ = rp.send(self.maybe_schedule(&myself, state).await);
            }
            SchedulerMessage::Schedule(interval, rp) => {
                let _ = rp.send(self.schedule(&myself, state, interval));
            }
            SchedulerMessage::Unschedule(rp) => {
                let _ = rp.send(self.unschedule(state));
            }
            SchedulerMessage::UpdateFromSettings(settings, rp) => {
                let scheduled = if settings.sync_mode == SyncMode::Scheduled {
                    self.schedule(&myself, state, settings.sync_interval);
                    true
                } else {
                    self.unschedule(state);
                    false
                };
                let _ = rp.send(scheduled);
            }
            SchedulerMessage::Status(rp) => {
                let status = match &state.ticker {
                    Some(t) => ScheduleStatus {
                        scheduled: true,
                        interval: Some(t.interval),
                        next_run: Some(t.next_run),
                    },
                    None => ScheduleStatus {
                        scheduled: false,
                        interval: None,
                        next_run: None,
                    },
                };
                let _ = rp.send(status);
            }
            SchedulerMessage::RunNow(rp) => {
                let _ = rp.send(self.fire(state, true).await);
            }
            SchedulerMessage::Fire(generation) => {
                if state.ticker.as_ref().map(|t| t.generation) != Some(generation) {
                    debug!(generation, "Dropping firing from a replaced schedule");
                    return Ok(());
                }
                if let Err(e) = self.fire(state, false).await {
                    warn!(error = %e, "Scheduled sync check failed");
                }
            }
        }
        Ok(())
    }
}
