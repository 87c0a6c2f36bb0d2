use super::*;
use crate::Candidate;

fn candidate(
    url: &str,
    priority: i64,
) -> Candidate {
    Candidate {
        name: format!("{url}._nmos-registration._tcp.local."),
        url: url.to_string(),
        priority,
    }
}

fn registered() -> RegistrationState {
    let mut state = RegistrationState::new();
    state.handle(LifecycleEvent::Start);
    state.handle(LifecycleEvent::CandidateFound(candidate("http://a:3001", 100)));
    state.handle(LifecycleEvent::SettleElapsed);
    state.handle(LifecycleEvent::SyncCompleted);
    assert!(state.is_registered());
    state
}

#[test]
fn start_advertises_once_and_browses() {
    let mut state = RegistrationState::new();

    let actions = state.handle(LifecycleEvent::Start);

    assert_eq!(actions, vec![Action::Advertise, Action::Browse, Action::ArmWatchdog]);
    assert_eq!(state.status(), RegistrationStatus::Browsing);
}

#[test]
fn first_candidate_opens_the_settle_window() {
    let mut state = RegistrationState::new();
    state.handle(LifecycleEvent::Start);

    let first = state.handle(LifecycleEvent::CandidateFound(candidate("http://a:3001", 10)));
    let second = state.handle(LifecycleEvent::CandidateFound(candidate("http://b:3001", 20)));

    assert_eq!(first, vec![Action::ArmSettle]);
    assert!(second.is_empty());
    assert_eq!(state.status(), RegistrationStatus::Selecting);
}

#[test]
fn settle_selects_highest_priority() {
    let mut state = RegistrationState::new();
    state.handle(LifecycleEvent::Start);
    for (url, priority) in [("http://a:3001", 10), ("http://b:3001", 90), ("http://c:3001", 90)] {
        state.handle(LifecycleEvent::CandidateFound(candidate(url, priority)));
    }

    let actions = state.handle(LifecycleEvent::SettleElapsed);

    assert_eq!(
        actions,
        vec![
            Action::DisarmDiscoveryTimers,
            Action::StopBrowse,
            Action::Synchronize("http://b:3001".into())
        ]
    );
    assert_eq!(state.status(), RegistrationStatus::Registering);
    assert_eq!(state.registry(), Some("http://b:3001"));
}

#[test]
fn successful_sync_starts_heartbeats() {
    let mut state = RegistrationState::new();
    state.handle(LifecycleEvent::Start);
    state.handle(LifecycleEvent::CandidateFound(candidate("http://a:3001", 1)));
    state.handle(LifecycleEvent::SettleElapsed);

    assert_eq!(state.handle(LifecycleEvent::SyncCompleted), vec![Action::ScheduleHeartbeat]);
    assert_eq!(state.handle(LifecycleEvent::HeartbeatSucceeded), vec![Action::ScheduleHeartbeat]);
    assert_eq!(state.status(), RegistrationStatus::Registered);
}

#[test]
fn every_failure_resets_through_disconnected() {
    for failure in [
        LifecycleEvent::HeartbeatFailed("timeout".into()),
        LifecycleEvent::ForwardFailed("status 409".into()),
    ] {
        let mut state = registered();

        let actions = state.handle(failure);

        assert_eq!(
            actions,
            vec![Action::CancelHeartbeat, Action::DisarmDiscoveryTimers, Action::ArmReset]
        );
        assert_eq!(state.status(), RegistrationStatus::Disconnected);
        assert_eq!(state.registry(), None);
    }
}

#[test]
fn rejected_sync_resets() {
    let mut state = RegistrationState::new();
    state.handle(LifecycleEvent::Start);
    state.handle(LifecycleEvent::CandidateFound(candidate("http://a:3001", 1)));
    state.handle(LifecycleEvent::SettleElapsed);

    state.handle(LifecycleEvent::SyncFailed("status 400".into()));

    assert_eq!(state.status(), RegistrationStatus::Disconnected);
}

#[test]
fn reset_timer_rebrowses_without_readvertising() {
    let mut state = registered();
    state.handle(LifecycleEvent::HeartbeatFailed("timeout".into()));

    let actions = state.handle(LifecycleEvent::ResetTimerFired);

    assert_eq!(actions, vec![Action::Browse, Action::ArmWatchdog]);
    assert_eq!(state.status(), RegistrationStatus::Browsing);
}

#[test]
fn watchdog_restarts_an_empty_browse() {
    let mut state = RegistrationState::new();
    state.handle(LifecycleEvent::Start);

    let actions = state.handle(LifecycleEvent::WatchdogFired);

    assert_eq!(actions, vec![Action::StopBrowse, Action::Browse, Action::ArmWatchdog]);
    assert_eq!(state.status(), RegistrationStatus::Browsing);
}

#[test]
fn stale_events_are_ignored() {
    let mut state = registered();

    assert!(state.handle(LifecycleEvent::WatchdogFired).is_empty());
    assert!(state.handle(LifecycleEvent::SettleElapsed).is_empty());
    assert!(state.handle(LifecycleEvent::ResetTimerFired).is_empty());
    assert!(state.handle(LifecycleEvent::CandidateFound(candidate("http://z:1", 999))).is_empty());
    assert_eq!(state.status(), RegistrationStatus::Registered);
    assert_eq!(state.registry(), Some("http://a:3001"));
}

#[test]
fn pending_selection_survives_the_watchdog() {
    let mut state = RegistrationState::new();
    state.handle(LifecycleEvent::Start);
    state.handle(LifecycleEvent::CandidateFound(candidate("http://a:3001", 1)));

    assert!(state.handle(LifecycleEvent::WatchdogFired).is_empty());
    assert_eq!(state.status(), RegistrationStatus::Selecting);
}
