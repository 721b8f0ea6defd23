//! Recall and birthday outreach: who to message, and who has already been
//! messaged.

mod birthday;
mod recall;

pub use birthday::*;
pub use recall::*;

use std::cmp::Ordering;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

/// Whole months from `earlier` to `later`, with date-fns `differenceInMonths`
/// rules.
///
/// The calendar-month difference is reduced by one when `later`, shifted
/// back by that many months, has not reached `earlier` yet. A `later` on
/// Feb 28 or 29 is first moved to "Feb 30" (which rolls into March), and a
/// `later` on the last day of its month one calendar month on counts as a
/// full month. So 2024-01-31 → 2024-02-29 is 1 month and 2023-08-30 →
/// 2024-02-28 is 6. Negative when `later` precedes `earlier`.
pub fn months_between(earlier: NaiveDateTime, later: NaiveDateTime) -> i64 {
    let sign = sign_of(later.cmp(&earlier));
    let difference = calendar_months(earlier, later).abs();
    if difference < 1 {
        return 0;
    }

    let mut anchor = later;
    if later.month() == 2 && later.day() > 27 {
        anchor = rolled(later.year(), i64::from(later.month0()), 30, later);
    }
    let shifted = rolled(
        anchor.year(),
        i64::from(anchor.month0()) - sign * difference,
        i64::from(anchor.day()),
        anchor,
    );

    let mut last_month_not_full = sign_of(shifted.cmp(&earlier)) == -sign;
    if is_last_day_of_month(later.date()) && difference == 1 && later > earlier {
        last_month_not_full = false;
    }
    sign * (difference - i64::from(last_month_not_full))
}

fn calendar_months(earlier: NaiveDateTime, later: NaiveDateTime) -> i64 {
    i64::from(later.year() - earlier.year()) * 12 + i64::from(later.month()) - i64::from(earlier.month())
}

fn sign_of(ordering: Ordering) -> i64 {
    match ordering {
        Ordering::Greater => 1,
        Ordering::Less => -1,
        Ordering::Equal => 0,
    }
}

/// Build a date from a possibly out-of-range month (0-based) and day,
/// carrying overflow into the following months and years. Keeps the time
/// of `time_of`.
fn rolled(year: i32, month0: i64, day: i64, time_of: NaiveDateTime) -> NaiveDateTime {
    let year = i64::from(year) + month0.div_euclid(12);
    let month = month0.rem_euclid(12) as u32 + 1;
    let first = i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, month, 1))
        .unwrap_or(time_of.date());
    let date = first
        .checked_add_days(Days::new(u64::try_from(day - 1).unwrap_or(0)))
        .unwrap_or(first);
    date.and_time(time_of.time())
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}
