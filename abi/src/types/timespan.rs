use std::ops::Bound;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::types::PgRange;

use crate::OfficeError;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timespan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Timespan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, OfficeError> {
        let span = Self { start, end };
        span.validate()?;
        Ok(span)
    }

    /// The UTC calendar day `[date 00:00, date+1 00:00)`.
    pub fn whole_day(date: NaiveDate) -> Result<Self, OfficeError> {
        let invalid = || OfficeError::InvalidInterval(format!("no such day: {}", date));
        let start = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        let end = date
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .ok_or_else(invalid)?;

        Ok(Self {
            start: Utc.from_utc_datetime(&start),
            end: Utc.from_utc_datetime(&end),
        })
    }

    pub fn validate(&self) -> Result<(), OfficeError> {
        if self.end <= self.start {
            return Err(OfficeError::InvalidInterval(format!(
                "end {} must be after start {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && s2 < e1`; touching
    /// boundaries do not.
    pub fn overlaps(&self, other: &Timespan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl From<Timespan> for PgRange<DateTime<Utc>> {
    fn from(span: Timespan) -> Self {
        PgRange {
            start: Bound::Included(span.start),
            end: Bound::Excluded(span.end),
        }
    }
}

impl TryFrom<PgRange<DateTime<Utc>>> for Timespan {
    type Error = OfficeError;

    fn try_from(range: PgRange<DateTime<Utc>>) -> Result<Self, Self::Error> {
        match (range.start, range.end) {
            (Bound::Included(start), Bound::Excluded(end)) => Timespan::new(start, end),
            (start, end) => Err(OfficeError::InvalidInterval(format!(
                "unsupported range bounds: {:?}..{:?}",
                start, end
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn end_before_or_at_start_should_be_rejected() {
        let err = Timespan::new(at("2024-01-10T10:00:00Z"), at("2024-01-10T10:00:00Z")).unwrap_err();
        assert!(matches!(err, OfficeError::InvalidInterval(_)));

        let err = Timespan::new(at("2024-01-10T11:00:00Z"), at("2024-01-10T10:00:00Z")).unwrap_err();
        assert!(matches!(err, OfficeError::InvalidInterval(_)));
    }

    #[test]
    fn touching_spans_should_not_overlap() {
        let first = Timespan::new(at("2024-01-10T10:00:00Z"), at("2024-01-10T11:00:00Z")).unwrap();
        let second = Timespan::new(at("2024-01-10T11:00:00Z"), at("2024-01-10T12:00:00Z")).unwrap();
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn partial_and_nested_spans_should_overlap() {
        let first = Timespan::new(at("2024-01-10T10:00:00Z"), at("2024-01-10T11:00:00Z")).unwrap();
        let partial = Timespan::new(at("2024-01-10T10:30:00Z"), at("2024-01-10T11:30:00Z")).unwrap();
        let nested = Timespan::new(at("2024-01-10T10:15:00Z"), at("2024-01-10T10:45:00Z")).unwrap();
        assert!(first.overlaps(&partial));
        assert!(first.overlaps(&nested));
        assert!(nested.overlaps(&first));
    }

    #[test]
    fn whole_day_should_cover_utc_midnight_to_midnight() {
        let day = Timespan::whole_day(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()).unwrap();
        assert_eq!(day.start.to_rfc3339(), "2024-01-10T00:00:00+00:00");
        assert_eq!(day.end.to_rfc3339(), "2024-01-11T00:00:00+00:00");
        assert_eq!(day.duration(), Duration::hours(24));
    }

    #[test]
    fn pg_range_should_keep_half_open_bounds() {
        let span = Timespan::new(at("2024-01-10T09:00:00Z"), at("2024-01-10T10:00:00Z")).unwrap();
        let range: PgRange<DateTime<Utc>> = span.into();
        assert_eq!(range.start, Bound::Included(span.start));
        assert_eq!(range.end, Bound::Excluded(span.end));
        assert_eq!(Timespan::try_from(range).unwrap(), span);
    }
}
