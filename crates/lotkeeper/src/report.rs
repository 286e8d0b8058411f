//! Revenue and occupancy reports.
//!
//! A report covers the current day, week or month (UTC) and is rendered as a
//! two-section CSV: summary metrics, then one row per zone.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::fee::Money;
use crate::lot::{OccupancyStats, Space, Zone};
use crate::storage::Storage;
use crate::ticket::Ticket;

const SUMMARY_HEADER: &str =
    "Report Type,Generated At,Total Revenue,Occupancy Rate,Total Vehicles,Average Stay Duration";
const ZONE_HEADER: &str = "Zone Name,Occupancy Rate,Revenue,Available Slots,Total Slots";

/// Time span a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    /// Since midnight today.
    Daily,
    /// Since Monday midnight of this week.
    Weekly,
    /// Since midnight on the first of this month.
    Monthly,
}

impl ReportPeriod {
    /// Start of the period containing `now`.
    #[must_use]
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first_day = match self {
            Self::Daily => today,
            Self::Weekly => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            Self::Monthly => NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today),
        };
        Utc.from_utc_datetime(&first_day.and_time(NaiveTime::MIN))
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for ReportPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(Error::invalid_input(format!("unknown report period: {other}"))),
        }
    }
}

/// Per-zone figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReport {
    /// Zone code.
    pub code: String,
    /// Zone display name.
    pub name: String,
    /// Occupied share of the zone's spaces, in percent.
    pub occupancy_percent: f64,
    /// Fees collected in the zone during the period.
    pub revenue: Money,
    /// Spaces free right now.
    pub available: usize,
    /// All spaces in the zone.
    pub total: usize,
}

/// A generated report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Covered period.
    pub period: ReportPeriod,
    /// Start of the covered period.
    pub since: DateTime<Utc>,
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
    /// Fees from tickets closed in the period.
    pub total_revenue: Money,
    /// Current lot occupancy, whole percent.
    pub occupancy_rate: u32,
    /// Vehicles checked in during the period.
    pub total_vehicles: usize,
    /// Mean stay of tickets closed in the period, in seconds.
    pub average_stay_secs: Option<i64>,
    /// One entry per zone.
    pub zones: Vec<ZoneReport>,
}

impl Report {
    /// Assemble a report from the lot layout and the period's tickets.
    ///
    /// `spaces` carry their current status; `checked_in` are tickets opened
    /// in the period and `closed` are tickets closed in it.
    #[must_use]
    pub fn build(
        period: ReportPeriod,
        now: DateTime<Utc>,
        zones: &[Zone],
        spaces: &[Space],
        checked_in: &[Ticket],
        closed: &[Ticket],
    ) -> Self {
        let zone_of: HashMap<&str, &str> = spaces
            .iter()
            .map(|s| (s.id.as_str(), s.zone.as_str()))
            .collect();

        let mut zone_revenue: HashMap<&str, Money> = HashMap::new();
        for ticket in closed {
            if let (Some(zone), Some(fee)) = (zone_of.get(ticket.space()), ticket.fee()) {
                let entry = zone_revenue.entry(*zone).or_default();
                *entry = *entry + fee;
            }
        }

        let zone_reports = zones
            .iter()
            .map(|zone| {
                let stats =
                    OccupancyStats::from_spaces(spaces.iter().filter(|s| s.zone == zone.code));
                ZoneReport {
                    code: zone.code.clone(),
                    name: zone.name.clone(),
                    occupancy_percent: stats.occupancy_percent(),
                    revenue: zone_revenue
                        .get(zone.code.as_str())
                        .copied()
                        .unwrap_or_default(),
                    available: stats.available,
                    total: stats.total,
                }
            })
            .collect();

        let stays: Vec<i64> = closed
            .iter()
            .filter_map(Ticket::stay)
            .map(|d| d.num_seconds().max(0))
            .collect();
        let average_stay_secs = if stays.is_empty() {
            None
        } else {
            let count = i64::try_from(stays.len()).unwrap_or(i64::MAX);
            Some(stays.iter().sum::<i64>() / count)
        };

        Self {
            period,
            since: period.start(now),
            generated_at: now,
            total_revenue: closed.iter().filter_map(Ticket::fee).sum(),
            occupancy_rate: OccupancyStats::from_spaces(spaces).occupancy_rate(),
            total_vehicles: checked_in.len(),
            average_stay_secs,
            zones: zone_reports,
        }
    }

    /// Average stay as text, e.g. `2.5 hours`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_stay_label(&self) -> String {
        match self.average_stay_secs {
            Some(secs) => format!("{:.1} hours", secs as f64 / 3600.0),
            None => "n/a".to_string(),
        }
    }

    /// CSV rendering, amounts prefixed with `currency_symbol`.
    #[must_use]
    pub fn csv<'a>(&'a self, currency_symbol: &'a str) -> ReportCsv<'a> {
        ReportCsv {
            report: self,
            currency_symbol,
        }
    }

    /// Render as CSV, amounts prefixed with `currency_symbol`.
    #[must_use]
    pub fn to_csv(&self, currency_symbol: &str) -> String {
        self.csv(currency_symbol).to_string()
    }

    /// File name for this report, e.g. `parking_report_daily_2024-03-20_10-30.csv`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "parking_report_{}_{}.csv",
            self.period,
            self.generated_at.format("%Y-%m-%d_%H-%M")
        )
    }

    /// Write the CSV into `dir`, creating it if needed. Returns the file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file written.
    pub fn write_to_dir(&self, dir: &Path, currency_symbol: &str) -> Result<PathBuf> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let path = dir.join(self.file_name());
        let mut file = BufWriter::new(File::create(&path)?);
        write!(file, "{}", self.csv(currency_symbol))?;
        file.flush()?;
        info!("Wrote {} report to {}", self.period, path.display());
        Ok(path)
    }
}

/// Two-section CSV view of a [`Report`], written through [`fmt::Display`].
#[derive(Debug, Clone, Copy)]
pub struct ReportCsv<'a> {
    report: &'a Report,
    currency_symbol: &'a str,
}

impl fmt::Display for ReportCsv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(f, "{SUMMARY_HEADER}")?;
        writeln!(
            f,
            "{},{},{},{}%,{},{}",
            report.period,
            report.generated_at.format("%Y-%m-%d %H:%M:%S"),
            csv_field(&report.total_revenue.with_symbol(self.currency_symbol)),
            report.occupancy_rate,
            report.total_vehicles,
            csv_field(&report.average_stay_label()),
        )?;
        writeln!(f)?;
        writeln!(f, "{ZONE_HEADER}")?;
        for zone in &report.zones {
            writeln!(
                f,
                "{},{:.1}%,{},{},{}",
                csv_field(&zone.name),
                zone.occupancy_percent,
                csv_field(&zone.revenue.with_symbol(self.currency_symbol)),
                zone.available,
                zone.total,
            )?;
        }
        Ok(())
    }
}

/// Build a report for the period containing `now` from stored data.
///
/// # Errors
///
/// Returns an error if a storage query fails.
pub fn build_report(storage: &Storage, period: ReportPeriod, now: DateTime<Utc>) -> Result<Report> {
    let since = period.start(now);
    let zones = storage.zones()?;
    let spaces = storage.spaces(None)?;
    let checked_in = storage.tickets_checked_in_between(since, now)?;
    let closed = storage.tickets_closed_between(since, now)?;
    Ok(Report::build(period, now, &zones, &spaces, &checked_in, &closed))
}

/// Quote a CSV field if it contains a separator, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
