use std::fmt;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::select_candidate;
use super::Candidate;

/// Externally visible lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationStatus {
    #[default]
    Idle,
    /// Browsing, nothing found yet
    Browsing,
    /// Collecting candidates during the settle window
    Selecting,
    /// Pushing the full resource set
    Registering,
    /// Synchronized; forwarding changes and sending heartbeats
    Registered,
    /// Waiting for the reset delay before browsing again
    Disconnected,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Start,
    CandidateFound(Candidate),
    SettleElapsed,
    WatchdogFired,
    SyncCompleted,
    SyncFailed(String),
    HeartbeatSucceeded,
    HeartbeatFailed(String),
    ForwardFailed(String),
    ResetTimerFired,
}

/// Side effects requested by the state machine, performed in order
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Advertise,
    Browse,
    StopBrowse,
    ArmSettle,
    ArmWatchdog,
    /// Cancels the settle and watchdog timers
    DisarmDiscoveryTimers,
    /// Push self, then every resource, to the registry at this URL
    Synchronize(String),
    ScheduleHeartbeat,
    CancelHeartbeat,
    ArmReset,
}

/// Sans-IO registration state machine.
#[derive(Debug, Default)]
pub struct RegistrationState {
    status: RegistrationStatus,
    candidates: Vec<Candidate>,
    selected: Option<Candidate>,
    advertised: bool,
}

impl RegistrationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    /// URL of the registry being registered with, if any
    pub fn registry(&self) -> Option<&str> {
        self.selected.as_ref().map(|c| c.url.as_str())
    }

    pub fn is_registered(&self) -> bool {
        self.status == RegistrationStatus::Registered
    }

    pub fn handle(
        &mut self,
        event: LifecycleEvent,
    ) -> Vec<Action> {
        use LifecycleEvent::*;
        use RegistrationStatus::*;

        match (self.status, event) {
            (Idle, Start) => {
                let mut actions = vec![];
                if !self.advertised {
                    self.advertised = true;
                    actions.push(Action::Advertise);
                }
                actions.extend(self.begin_browsing());
                actions
            }

            (Browsing, CandidateFound(candidate)) => {
                debug!(name = %candidate.name, priority = candidate.priority, "Registry candidate found");
                self.candidates.push(candidate);
                self.status = Selecting;
                vec![Action::ArmSettle]
            }
            (Selecting, CandidateFound(candidate)) => {
                debug!(name = %candidate.name, priority = candidate.priority, "Registry candidate found");
                self.candidates.push(candidate);
                vec![]
            }

            (Selecting, SettleElapsed) => match select_candidate(&self.candidates).cloned() {
                Some(best) => {
                    info!(name = %best.name, url = %best.url, priority = best.priority, "Registry selected");
                    let url = best.url.clone();
                    self.selected = Some(best);
                    self.candidates.clear();
                    self.status = Registering;
                    vec![Action::DisarmDiscoveryTimers, Action::StopBrowse, Action::Synchronize(url)]
                }
                None => {
                    self.status = Browsing;
                    vec![]
                }
            },

            // A pending selection outlives the watchdog
            (Browsing, WatchdogFired) => {
                warn!("No registry selected in time, restarting discovery");
                let mut actions = vec![Action::StopBrowse];
                actions.extend(self.begin_browsing());
                actions
            }

            (Registering, SyncCompleted) => {
                info!(registry = ?self.registry(), "Registered with registry");
                self.status = Registered;
                vec![Action::ScheduleHeartbeat]
            }
            (Registered, HeartbeatSucceeded) => vec![Action::ScheduleHeartbeat],

            (Registering, SyncFailed(reason)) | (Registered, HeartbeatFailed(reason) | ForwardFailed(reason)) => {
                warn!(registry = ?self.registry(), %reason, "Registration lost, resetting");
                self.reset()
            }

            (Disconnected, ResetTimerFired) => self.begin_browsing(),

            (status, event) => {
                debug!(%status, ?event, "Event ignored");
                vec![]
            }
        }
    }

    fn begin_browsing(&mut self) -> Vec<Action> {
        self.status = RegistrationStatus::Browsing;
        self.candidates.clear();
        self.selected = None;
        vec![Action::Browse, Action::ArmWatchdog]
    }

    fn reset(&mut self) -> Vec<Action> {
        self.status = RegistrationStatus::Disconnected;
        self.candidates.clear();
        self.selected = None;
        vec![Action::CancelHeartbeat, Action::DisarmDiscoveryTimers, Action::ArmReset]
    }
}
