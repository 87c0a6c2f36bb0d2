use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall clock as a duration since the unix epoch.
///
/// A clock set before 1970 is treated as the epoch itself.
pub(crate) fn now_since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// return second
pub(crate) fn get_now_as_u64() -> u64 {
    now_since_epoch().as_secs()
}

/// `"<seconds>:<nanoseconds>"` timestamp used in grains
pub(crate) fn timestamp_string() -> String {
    let now = now_since_epoch();
    format!("{}:{}", now.as_secs(), now.subsec_nanos())
}

/// Completes at `deadline`, or never when there is none. Lets an optional
/// timer sit in a `select!` arm.
pub(crate) async fn fire_at(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
