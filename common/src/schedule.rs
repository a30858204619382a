// Time normalization and trigger cadence
//
// Every timestamp entering the system passes through `normalize_scheduled_at`,
// and every comparison afterwards happens on `DateTime<Utc>`.

use crate::errors::ScheduleError;
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use std::time::Duration;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Normalize an authoring timestamp to UTC
///
/// Accepts RFC3339 with an explicit offset (the timezone argument is then
/// ignored), or a naive local time interpreted in `timezone`. A naive time
/// without a timezone is rejected rather than guessed.
pub fn normalize_scheduled_at(
    value: &str,
    timezone: Option<&str>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| ScheduleError::InvalidTimestamp {
            value: value.to_string(),
            reason: "expected RFC3339 or YYYY-MM-DDTHH:MM[:SS]".to_string(),
        })?;

    let tz_name = timezone.ok_or_else(|| ScheduleError::InvalidTimestamp {
        value: value.to_string(),
        reason: "local time given without an offset or timezone".to_string(),
    })?;
    let tz = parse_timezone(tz_name)?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, _) => Err(ScheduleError::AmbiguousLocalTime(value.to_string())),
        LocalResult::None => Err(ScheduleError::InvalidTimestamp {
            value: value.to_string(),
            reason: format!("local time does not exist in {}", tz_name),
        }),
    }
}

/// Parse and validate a cron expression (6 or 7 fields, seconds first)
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// How often the in-process trigger fires
#[derive(Debug, Clone)]
pub enum TriggerSchedule {
    /// Fire immediately, then every `Duration`
    Interval(Duration),
    /// Fire on each cron occurrence, evaluated in the given timezone
    Cron {
        expression: String,
        schedule: Box<CronSchedule>,
        timezone: Tz,
    },
}

impl TriggerSchedule {
    pub fn interval(period: Duration) -> Self {
        TriggerSchedule::Interval(period)
    }

    pub fn cron(expression: &str, timezone: &str) -> Result<Self, ScheduleError> {
        Ok(TriggerSchedule::Cron {
            expression: expression.to_string(),
            schedule: Box::new(parse_cron_expression(expression)?),
            timezone: parse_timezone(timezone)?,
        })
    }

    /// Next fire time strictly after `reference`
    pub fn next_after(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        match self {
            TriggerSchedule::Interval(period) => {
                let step = chrono::Duration::from_std(*period).map_err(|e| {
                    ScheduleError::InvalidTimestamp {
                        value: format!("{:?}", period),
                        reason: e.to_string(),
                    }
                })?;
                Ok(reference + step)
            }
            TriggerSchedule::Cron {
                expression,
                schedule,
                timezone,
            } => {
                let reference_in_tz = reference.with_timezone(timezone);
                schedule
                    .after(&reference_in_tz)
                    .next()
                    .map(|next| next.with_timezone(&Utc))
                    .ok_or_else(|| ScheduleError::NoNextRun(expression.clone()))
            }
        }
    }

    /// Time to wait from `now` until the next fire
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Result<Duration, ScheduleError> {
        let next = self.next_after(now)?;
        Ok((next - now).to_std().unwrap_or(Duration::ZERO))
    }
}
