//! Turns a template's relative due offset into an absolute timestamp.

use chrono::{DateTime, Months, TimeDelta, Utc};
use thiserror::Error;

use crate::types::DueUnit;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DueProjectionError {
    #[error("due_interval {0} has no due_unit")]
    MissingUnit(i32),
    #[error("due offset of {interval} {unit} is out of range")]
    OutOfRange { interval: i32, unit: DueUnit },
}

/// Projects `anchor` forward by `interval` units.
///
/// An absent interval means "no due date". Month arithmetic is calendar-aware and clamps
/// to the last day of the target month, so Jan 31 + 1 month lands on the last day of
/// February.
pub fn project_due(
    anchor: DateTime<Utc>,
    interval: Option<i32>,
    unit: Option<DueUnit>,
) -> Result<Option<DateTime<Utc>>, DueProjectionError> {
    let Some(interval) = interval else {
        return Ok(None);
    };
    let Some(unit) = unit else {
        return Err(DueProjectionError::MissingUnit(interval));
    };
    let out_of_range = || DueProjectionError::OutOfRange { interval, unit };

    let projected = match unit {
        DueUnit::Month => {
            let months = Months::new(interval.unsigned_abs());
            if interval >= 0 {
                anchor.checked_add_months(months)
            } else {
                anchor.checked_sub_months(months)
            }
        }
        DueUnit::Minute | DueUnit::Hour | DueUnit::Day | DueUnit::Week => {
            let amount = i64::from(interval);
            let delta = match unit {
                DueUnit::Minute => TimeDelta::try_minutes(amount),
                DueUnit::Hour => TimeDelta::try_hours(amount),
                DueUnit::Day => TimeDelta::try_days(amount),
                _ => TimeDelta::try_weeks(amount),
            }
            .ok_or_else(out_of_range)?;
            anchor.checked_add_signed(delta)
        }
    };

    projected.map(Some).ok_or_else(out_of_range)
}
