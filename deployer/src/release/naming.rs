//! Release names: timestamp generation and recency ordering

use std::cmp::Ordering;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::errors::DeployError;

/// Fixed-width `yyyyMMddHHmmss`, sortable both lexically and chronologically
pub const TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Default release name generator
pub fn name_from_current_time() -> String {
    name_from_instant(&Local::now())
}

/// Format an instant as a release name
pub fn name_from_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.format(TIME_FORMAT).to_string()
}

/// Parse a release name produced by the default generator
pub fn parse_release_name(name: &str) -> Result<NaiveDateTime, DeployError> {
    if name.len() != 14 {
        return Err(DeployError::ReleaseNameError(name.to_string()));
    }
    NaiveDateTime::parse_from_str(name, TIME_FORMAT)
        .map_err(|_| DeployError::ReleaseNameError(name.to_string()))
}

/// Default comparer: later release first, equal timestamps compare equal
pub fn compare_release_names(a: &str, b: &str) -> Result<Ordering, DeployError> {
    let a = parse_release_name(a)?;
    let b = parse_release_name(b)?;
    Ok(b.cmp(&a))
}

/// Sort release names most recent first with the given comparer.
///
/// Stable insertion sort: releases the comparer deems equal keep their
/// listing order across repeated sorts. The first comparer failure is
/// returned instead of a partially sorted list.
pub fn sort_releases<C>(names: &[String], comparer: C) -> Result<Vec<String>, DeployError>
where
    C: Fn(&str, &str) -> Result<Ordering, DeployError>,
{
    let mut sorted: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut index = sorted.len();
        while index > 0 && comparer(&sorted[index - 1], name)? == Ordering::Greater {
            index -= 1;
        }
        sorted.insert(index, name.clone());
    }
    Ok(sorted)
}
