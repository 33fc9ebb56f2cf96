use crate::error::{validation_error, CalResult};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar month used as the cache partition key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Create a key, rejecting months outside 1-12 and years chrono cannot represent
    pub fn new(month: u32, year: i32) -> CalResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(validation_error(&format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| validation_error(&format!("Year {} is out of range", year)))?;
        Ok(Self { year, month })
    }

    /// Key of the month a date falls in
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// First calendar day of the month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the month
    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// True when the date lies inside this month
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// The following month, if representable
    pub fn next(&self) -> CalResult<Self> {
        if self.month == 12 {
            Self::new(1, self.year + 1)
        } else {
            Self::new(self.month + 1, self.year)
        }
    }

    /// The preceding month, if representable
    pub fn previous(&self) -> CalResult<Self> {
        if self.month == 1 {
            Self::new(12, self.year - 1)
        } else {
            Self::new(self.month - 1, self.year)
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_day().format("%B %Y"))
    }
}

/// A calendar event as stored by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(with = "event_date")]
    pub date: NaiveDate,
    /// Wall-clock start, "hh:mm AM/PM" or 24h
    pub time: String,
    /// Wall-clock end in the same notation, may be empty
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub description: String,
}

impl Event {
    /// Attach an id to a draft
    pub fn from_draft(id: impl Into<String>, draft: EventDraft) -> Self {
        Self {
            id: id.into(),
            title: draft.title,
            date: draft.date,
            time: draft.time,
            end_time: draft.end_time,
            description: draft.description,
        }
    }

    /// The cache partition this event belongs to
    pub fn month_key(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }

    /// Editable fields of the event
    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            date: self.date,
            time: self.time.clone(),
            end_time: self.end_time.clone(),
            description: self.description.clone(),
        }
    }
}

/// An event without an id, as sent to the create endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    #[serde(with = "event_date")]
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub description: String,
}

impl EventDraft {
    /// A blank draft on the given day with the default time slot
    pub fn blank(date: NaiveDate) -> Self {
        use crate::utils::time::{DEFAULT_END_TIME, DEFAULT_START_TIME};

        Self {
            title: String::new(),
            date,
            time: DEFAULT_START_TIME.to_string(),
            end_time: DEFAULT_END_TIME.to_string(),
            description: String::new(),
        }
    }
}

/// Dates go out as `YYYY-MM-DD`. Incoming values may also be ISO-8601
/// timestamps; only their calendar-date part is used, without any
/// timezone conversion.
mod event_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let date_part = raw.trim().split('T').next().unwrap_or_default();
        NaiveDate::parse_from_str(date_part, FORMAT)
            .map_err(|e| de::Error::custom(format!("invalid event date '{}': {}", raw, e)))
    }
}
