//! Timer/cron scheduler. Resolves a
//! `TimerSpec` into a concrete due timestamp (or a cron expression's
//! next fire time) and exposes a `due()` check the engine's reaper loop
//! polls — the reaper itself lives in `engine.rs` since it needs
//! `Arc<dyn DocumentStore>` access this module shouldn't depend on.

use crate::error::{EngineError, Result};
use crate::model::node::TimerSpec;
use crate::types::Timestamp;
use iso8601_duration::Duration as IsoDuration;

/// Resolve a `TimerSpec` into the next due timestamp relative to `now`.
pub fn resolve_due_at(spec: &TimerSpec, now: Timestamp) -> Result<Timestamp> {
    match spec {
        TimerSpec::Duration(iso) => {
            let millis = parse_iso_duration_ms(iso)?;
            Ok(now + millis)
        }
        TimerSpec::Cycle(expr) => resolve_cycle(expr, now),
        TimerSpec::Date(iso_date) => parse_iso_datetime_ms(iso_date),
    }
}

/// `R[n]/PT...` repeating-interval cycles (spec glossary "timer
/// cycle"). An absent `R[n]` (bare `R/PT...`) repeats without bound; we
/// only need the next occurrence so the repeat count doesn't change
/// this function's result, only how many times the caller re-arms it.
fn resolve_cycle(expr: &str, now: Timestamp) -> Result<Timestamp> {
    let duration_part = expr
        .rsplit('/')
        .next()
        .ok_or_else(|| EngineError::DefinitionLoad(format!("malformed timer cycle: {expr}")))?;
    let millis = parse_iso_duration_ms(duration_part)?;
    Ok(now + millis)
}

/// Repeat count encoded in an `R[n]/...` cycle, if bounded. `None`
/// means unbounded (`R/...`).
pub fn cycle_repeat_count(expr: &str) -> Option<u32> {
    let first = expr.split('/').next()?;
    let digits = first.strip_prefix('R')?;
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn parse_iso_duration_ms(iso: &str) -> Result<i64> {
    let parsed: IsoDuration = iso
        .parse()
        .map_err(|_| EngineError::DefinitionLoad(format!("invalid ISO-8601 duration: {iso}")))?;
    let seconds = parsed.num_seconds().unwrap_or(0.0);
    Ok((seconds * 1000.0) as i64)
}

fn parse_iso_datetime_ms(iso: &str) -> Result<Timestamp> {
    chrono_lite_parse(iso)
        .ok_or_else(|| EngineError::DefinitionLoad(format!("invalid ISO-8601 date: {iso}")))
}

fn chrono_lite_parse(iso: &str) -> Option<Timestamp> {
    chrono::DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

pub fn is_due(due_at: Timestamp, now: Timestamp) -> bool {
    now >= due_at
}

/// Resolve a Unix-cron expression's next fire time after `now` (spec
/// glossary "cron expression"). Used for recurring business-calendar
/// triggers outside the BPMN timer-cycle grammar.
pub fn next_cron_fire(expr: &str, now_epoch_secs: i64) -> Result<Timestamp> {
    use cron::Schedule;
    use std::str::FromStr;
    let schedule = Schedule::from_str(expr)
        .map_err(|e| EngineError::DefinitionLoad(format!("invalid cron expression {expr}: {e}")))?;
    let after = chrono_from_epoch_secs(now_epoch_secs);
    schedule
        .after(&after)
        .next()
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| EngineError::DefinitionLoad(format!("cron expression {expr} never fires again")))
}

fn chrono_from_epoch_secs(secs: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_timer_resolves_relative_to_now() {
        let due = resolve_due_at(&TimerSpec::Duration("PT1H".into()), 0).unwrap();
        assert_eq!(due, 3_600_000);
    }

    #[test]
    fn cycle_repeat_count_parses_bounded_and_unbounded() {
        assert_eq!(cycle_repeat_count("R3/PT10M"), Some(3));
        assert_eq!(cycle_repeat_count("R/PT10M"), None);
    }

    #[test]
    fn cycle_resolves_duration_component() {
        let due = resolve_due_at(&TimerSpec::Cycle("R3/PT10M".into()), 1_000).unwrap();
        assert_eq!(due, 1_000 + 600_000);
    }

    #[test]
    fn is_due_compares_timestamps() {
        assert!(is_due(100, 150));
        assert!(!is_due(200, 150));
    }
}
