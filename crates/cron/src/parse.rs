//! Parsing utilities for run times and crontab expressions.

use {chrono::NaiveDateTime, chrono_tz::Tz};

use crate::{Error, Result};

/// `strftime` pattern for one-shot run times, e.g. `01.01.2099 08:00:00`.
pub const RUN_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Human-readable form of [`RUN_TIME_FORMAT`], used in error messages.
pub const RUN_TIME_FORMAT_HINT: &str = "DD.MM.YYYY HH:MM:SS";

/// Parse a `DD.MM.YYYY HH:MM:SS` local date-time.
pub fn parse_run_time(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), RUN_TIME_FORMAT)
        .map_err(|_| Error::invalid_run_time(input))
}

/// Format a date-time the way [`parse_run_time`] reads it.
pub fn format_run_time(at: &NaiveDateTime) -> String {
    at.format(RUN_TIME_FORMAT).to_string()
}

/// Resolve an IANA timezone name such as `Europe/Berlin`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::unknown_timezone(name))
}

/// Convert a standard 5-field crontab expression into the 7-field syntax the
/// `cron` crate expects (`sec min hour dom month dow year`).
///
/// Crontab ORs day-of-month and day-of-week when both are restricted, while the
/// `cron` crate ANDs them, so that case yields two expressions to be matched
/// independently.
pub fn crontab_to_schedules(expr: &str) -> Result<Vec<String>> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(Error::invalid_cron(
            expr,
            format!(
                "expected 5 fields (minute hour day month weekday), got {}",
                fields.len()
            ),
        ));
    }
    let (minute, hour, dom, month) = (fields[0], fields[1], fields[2], fields[3]);
    let dow =
        translate_weekday_field(fields[4]).map_err(|reason| Error::invalid_cron(expr, reason))?;

    if is_restricted(dom) && is_restricted(&dow) {
        Ok(vec![
            format!("0 {minute} {hour} {dom} {month} * *"),
            format!("0 {minute} {hour} * {month} {dow} *"),
        ])
    } else {
        Ok(vec![format!("0 {minute} {hour} {dom} {month} {dow} *")])
    }
}

fn is_restricted(field: &str) -> bool {
    field != "*" && field != "?"
}

/// Map crontab weekday numbers (0-7, Sunday = 0 or 7) to the `cron` crate's
/// numbering (1-7, Sunday = 1). Named days pass through unchanged.
fn translate_weekday_field(field: &str) -> std::result::Result<String, String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => (base, Some(step)),
            None => (item, None),
        };
        let suffix = step.map(|s| format!("/{s}")).unwrap_or_default();

        if let Some((lo, hi)) = base.split_once('-') {
            let (Ok(lo), Ok(hi)) = (lo.parse::<u8>(), hi.parse::<u8>()) else {
                items.push(item.to_string());
                continue;
            };
            if lo > 7 || hi > 7 {
                return Err(format!("weekday out of range in '{item}' (0-7)"));
            }
            if lo > hi {
                return Err(format!("weekday range '{base}' runs backwards"));
            }
            if hi < 7 {
                items.push(format!("{}-{}{suffix}", lo + 1, hi + 1));
            } else if lo == 7 {
                items.push("1".to_string());
            } else {
                items.push(format!("{}-7{suffix}", lo + 1));
                // 7 is Sunday again; include it unless the step skips it.
                let hits_sunday = match step {
                    None => true,
                    Some(s) => s.parse::<u8>().is_ok_and(|s| s > 0 && (7 - lo) % s == 0),
                };
                if lo > 0 && hits_sunday {
                    items.push("1".to_string());
                }
            }
        } else if let Ok(day) = base.parse::<u8>() {
            if day > 7 {
                return Err(format!("weekday out of range in '{item}' (0-7)"));
            }
            let day = if day == 7 { 1 } else { day + 1 };
            items.push(format!("{day}{suffix}"));
        } else {
            items.push(item.to_string());
        }
    }
    Ok(items.join(","))
}
