// Schedule parsing and next firing time calculation
//
// Accepts standard 5-field cron, seconds-first 6/7-field cron, the @yearly..@hourly
// descriptors, `@every <duration>` and an optional `CRON_TZ=`/`TZ=` zone prefix.
//
// In 5-field expressions that restrict both day of month and day of week, a day
// matches when either field does.

use crate::errors::ScheduleError;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// A parsed schedule expression
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    Cron {
        schedule: CronSchedule,
        /// Day-of-week half of a day-of-month OR day-of-week expression
        weekday_schedule: Option<CronSchedule>,
        timezone: Tz,
    },
    Every(Duration),
}

impl ScheduleSpec {
    /// Next firing time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScheduleSpec::Cron {
                schedule,
                weekday_schedule,
                timezone,
            } => {
                let local = after.with_timezone(timezone);
                let next = schedule.after(&local).next();
                let weekday_next = weekday_schedule
                    .as_ref()
                    .and_then(|weekly| weekly.after(&local).next());
                match (next, weekday_next) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                }
                .map(|next| next.with_timezone(&Utc))
            }
            ScheduleSpec::Every(interval) => after.checked_add_signed(*interval),
        }
    }
}

/// Parse a schedule expression into a [`ScheduleSpec`]
pub fn parse_schedule(expression: &str) -> Result<ScheduleSpec, ScheduleError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(invalid(expression, "expression is empty"));
    }

    let (timezone, body) = split_timezone(trimmed)?;

    if let Some(rest) = body.strip_prefix("@every") {
        let interval = parse_every(rest.trim())
            .ok_or_else(|| invalid(expression, "expected @every <duration>, e.g. @every 1h30m"))?;
        return Ok(ScheduleSpec::Every(interval));
    }

    let normalized = match body {
        "@yearly" | "@annually" => NormalizedCron::single("0 0 0 1 1 *"),
        "@monthly" => NormalizedCron::single("0 0 0 1 * *"),
        "@weekly" => NormalizedCron::single("0 0 0 * * 1"),
        "@daily" | "@midnight" => NormalizedCron::single("0 0 0 * * *"),
        "@hourly" => NormalizedCron::single("0 0 * * * *"),
        other if other.starts_with('@') => {
            return Err(invalid(expression, "unknown descriptor"));
        }
        other => normalize_cron_fields(other).map_err(|reason| invalid(expression, &reason))?,
    };

    let reword = |e: ScheduleError| match e {
        ScheduleError::InvalidCronExpression { reason, .. } => invalid(expression, &reason),
        other => other,
    };
    let schedule = parse_cron_expression(&normalized.primary).map_err(reword)?;
    let weekday_schedule = normalized
        .weekday
        .as_deref()
        .map(parse_cron_expression)
        .transpose()
        .map_err(reword)?;

    Ok(ScheduleSpec::Cron {
        schedule,
        weekday_schedule,
        timezone,
    })
}

/// Parse a seconds-first cron expression with the `cron` crate
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(expression: &str, reason: &str) -> ScheduleError {
    ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}

fn split_timezone(expression: &str) -> Result<(Tz, &str), ScheduleError> {
    let prefixed = expression
        .strip_prefix("CRON_TZ=")
        .or_else(|| expression.strip_prefix("TZ="));

    let Some(rest) = prefixed else {
        return Ok((Tz::UTC, expression));
    };

    let (zone, body) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| invalid(expression, "timezone prefix without schedule"))?;
    let timezone =
        Tz::from_str(zone).map_err(|_| ScheduleError::InvalidTimezone(zone.to_string()))?;

    Ok((timezone, body.trim()))
}

/// Parse durations such as `90s`, `5m`, `1h30m`. Minimum one second.
fn parse_every(input: &str) -> Option<Duration> {
    if input.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: i64 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(unit)?)?;
    }

    // Trailing number without a unit
    if !digits.is_empty() || total < 1 {
        return None;
    }

    Some(Duration::seconds(total))
}

/// Seconds-first expressions ready for the `cron` crate
#[derive(Debug, PartialEq)]
struct NormalizedCron {
    primary: String,
    /// Set when day of month and day of week are both restricted
    weekday: Option<String>,
}

impl NormalizedCron {
    fn single(expression: &str) -> Self {
        Self {
            primary: expression.to_string(),
            weekday: None,
        }
    }
}

/// Convert a 5-field expression into the seconds-first form the `cron` crate expects.
///
/// Standard cron numbers weekdays 0-7 with Sunday as 0 and 7; the `cron` crate
/// numbers them 1-7 with Sunday as 1. The crate also requires day of month and
/// day of week to both match, so an expression restricting both is split into a
/// day-of-month schedule and a day-of-week schedule. 6- and 7-field expressions
/// pass through.
fn normalize_cron_fields(expression: &str) -> Result<NormalizedCron, String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let (minute, hour, day_of_month, month) = (fields[0], fields[1], fields[2], fields[3]);
            let day_of_week = shift_day_of_week(fields[4])?;

            if is_unrestricted(day_of_month) || is_unrestricted(fields[4]) {
                return Ok(NormalizedCron {
                    primary: format!(
                        "0 {} {} {} {} {}",
                        minute, hour, day_of_month, month, day_of_week
                    ),
                    weekday: None,
                });
            }

            Ok(NormalizedCron {
                primary: format!("0 {} {} {} {} *", minute, hour, day_of_month, month),
                weekday: Some(format!("0 {} {} * {} {}", minute, hour, month, day_of_week)),
            })
        }
        6 | 7 => Ok(NormalizedCron::single(&fields.join(" "))),
        n => Err(format!("expected 5, 6 or 7 fields, found {}", n)),
    }
}

fn is_unrestricted(field: &str) -> bool {
    matches!(field, "*" | "?")
}

fn shift_day_of_week(field: &str) -> Result<String, String> {
    let mut parts: Vec<String> = Vec::new();
    let mut push = |value: String| {
        if !parts.contains(&value) {
            parts.push(value);
        }
    };

    for part in field.split(',') {
        let (base, step) = match part.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (part, None),
        };

        let Some((start, end)) = base.split_once('-') else {
            let shifted = shift_weekday(base)?;
            match step {
                Some(step) => push(format!("{}/{}", shifted, step)),
                None => push(shifted),
            }
            continue;
        };

        match (start.parse::<u32>(), end.parse::<u32>(), step) {
            // Stepped numeric ranges are listed day by day, so Sunday-as-7 lands on 1
            (Ok(low), Ok(high), Some(step)) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| format!("invalid step '{}' in day of week", step))?;
                if low > high || high > 7 {
                    return Err(format!("invalid day of week range {}-{}", low, high));
                }
                for day in (low..=high).step_by(step) {
                    push(shift_weekday(&day.to_string())?);
                }
            }
            // Range ending on Sunday-as-7 wraps to the crate's Sunday (1)
            (_, Ok(7), None) => {
                let start = shift_weekday(start)?;
                if start != "1" {
                    push("1".to_string());
                }
                push(format!("{}-7", start));
            }
            _ => {
                let range = format!("{}-{}", shift_weekday(start)?, shift_weekday(end)?);
                match step {
                    Some(step) => push(format!("{}/{}", range, step)),
                    None => push(range),
                }
            }
        }
    }
    Ok(parts.join(","))
}

fn shift_weekday(token: &str) -> Result<String, String> {
    match token.parse::<u32>() {
        Ok(n @ 0..=6) => Ok((n + 1).to_string()),
        Ok(7) => Ok("1".to_string()),
        Ok(n) => Err(format!("day of week {} out of range", n)),
        // `*`, `?` and names such as MON pass through unchanged
        Err(_) => Ok(token.to_string()),
    }
}
