//! Parking fee computation.
//!
//! Fees are billed per started hour: the elapsed time between check-in and
//! checkout is rounded up to whole hours and multiplied by the hourly rate,
//! with a minimum fee as the floor. Amounts are kept in integer cents.

use std::fmt;
use std::ops::Add;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds in one billed hour.
const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// A monetary amount in minor currency units (cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create an amount from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// The amount in cents.
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Multiply by a whole number, saturating at `u64::MAX` cents.
    #[must_use]
    pub const fn saturating_mul(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(factor))
    }

    /// Format with a currency symbol, e.g. `$8.00`.
    #[must_use]
    pub fn with_symbol(self, symbol: &str) -> String {
        format!("{symbol}{self}")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Hourly rate and minimum fee used to price a stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Price of one started hour.
    pub hourly_rate: Money,
    /// Lowest amount ever charged.
    pub minimum_fee: Money,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            hourly_rate: Money::from_cents(200),
            minimum_fee: Money::from_cents(200),
        }
    }
}

impl FeeSchedule {
    /// Create a schedule from explicit amounts.
    #[must_use]
    pub const fn new(hourly_rate: Money, minimum_fee: Money) -> Self {
        Self {
            hourly_rate,
            minimum_fee,
        }
    }

    /// The same schedule with a different hourly rate.
    #[must_use]
    pub const fn with_hourly_rate(self, hourly_rate: Money) -> Self {
        Self {
            hourly_rate,
            minimum_fee: self.minimum_fee,
        }
    }

    /// Fee owed for a stay that began at `check_in` and ends at `now`.
    #[must_use]
    pub fn fee(&self, check_in: DateTime<Utc>, now: DateTime<Utc>) -> Money {
        let hours = billed_hours(check_in, now);
        self.hourly_rate.saturating_mul(hours).max(self.minimum_fee)
    }
}

/// Number of started hours between `check_in` and `now`.
///
/// Zero or negative durations bill one hour.
#[must_use]
pub fn billed_hours(check_in: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let elapsed_ms = (now - check_in).num_milliseconds();
    if elapsed_ms <= 0 {
        return 1;
    }
    let hours = elapsed_ms / MILLIS_PER_HOUR + i64::from(elapsed_ms % MILLIS_PER_HOUR != 0);
    u64::try_from(hours).unwrap_or(u64::MAX).max(1)
}

/// Fee under the default schedule (2.00 per hour, 2.00 minimum).
#[must_use]
pub fn calculate_fee(check_in: DateTime<Utc>, now: DateTime<Utc>) -> Money {
    FeeSchedule::default().fee(check_in, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-20T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_half_hour_charges_minimum() {
        let fee = calculate_fee(t0(), t0() + Duration::minutes(30));
        assert_eq!(fee, Money::from_cents(200));
    }

    #[test]
    fn test_three_hours_five_minutes_bills_four_hours() {
        let fee = calculate_fee(t0(), t0() + Duration::hours(3) + Duration::minutes(5));
        assert_eq!(fee, Money::from_cents(800));
        assert_eq!(fee.to_string(), "8.00");
    }

    #[test]
    fn test_exact_hours_are_not_rounded_up() {
        assert_eq!(billed_hours(t0(), t0() + Duration::hours(2)), 2);
        assert_eq!(
            billed_hours(t0(), t0() + Duration::hours(2) + Duration::milliseconds(1)),
            3
        );
    }

    #[test]
    fn test_zero_and_negative_elapsed_bill_one_hour() {
        assert_eq!(billed_hours(t0(), t0()), 1);
        assert_eq!(billed_hours(t0(), t0() - Duration::hours(5)), 1);
        assert_eq!(calculate_fee(t0(), t0() - Duration::hours(5)), Money::from_cents(200));
    }

    #[test]
    fn test_minimum_fee_floor_above_rate() {
        let schedule = FeeSchedule::new(Money::from_cents(100), Money::from_cents(500));
        assert_eq!(
            schedule.fee(t0(), t0() + Duration::hours(2)),
            Money::from_cents(500)
        );
        assert_eq!(
            schedule.fee(t0(), t0() + Duration::hours(7)),
            Money::from_cents(700)
        );
    }

    #[test]
    fn test_with_hourly_rate_keeps_minimum() {
        let schedule = FeeSchedule::default().with_hourly_rate(Money::from_cents(500));
        assert_eq!(schedule.minimum_fee, Money::from_cents(200));
        assert_eq!(
            schedule.fee(t0(), t0() + Duration::minutes(90)),
            Money::from_cents(1000)
        );
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(800).with_symbol("$"), "$8.00");
    }

    #[test]
    fn test_money_sum_and_saturation() {
        let total: Money = [200, 400, 800].into_iter().map(Money::from_cents).sum();
        assert_eq!(total, Money::from_cents(1400));

        let huge = Money::from_cents(u64::MAX).saturating_mul(2);
        assert_eq!(huge.cents(), u64::MAX);
    }

    #[test]
    fn test_money_serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(350)).unwrap();
        assert_eq!(json, "350");
    }
}
