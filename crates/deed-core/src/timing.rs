use chrono::NaiveDate;

/// Gaps strictly longer than this many days keep the deed on the structured path.
pub const INQUIRY_WINDOW_DAYS: i64 = 21;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Routing outcome of the inquiry-timing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InquiryTiming {
    OverWindow { days: i64 },
    WithinWindow { days: i64 },
    MissingDates,
    Unparsable,
}

impl InquiryTiming {
    /// Classify the gap between the inquiry request and deed execution.
    ///
    /// Missing (absent or empty) dates take precedence over unparsable ones. Only the
    /// strict `YYYY-MM-DD` shape is parsed; short or signed years are unparsable.
    pub fn assess(inquiry_date: Option<&str>, deed_date: Option<&str>) -> Self {
        let (Some(inquiry), Some(deed)) = (present(inquiry_date), present(deed_date)) else {
            return Self::MissingDates;
        };

        let (Some(inquiry), Some(deed)) = (parse_date(inquiry), parse_date(deed)) else {
            return Self::Unparsable;
        };

        let days = (deed - inquiry).num_days();
        if days > INQUIRY_WINDOW_DAYS {
            Self::OverWindow { days }
        } else {
            Self::WithinWindow { days }
        }
    }

    pub fn days(self) -> Option<i64> {
        match self {
            Self::OverWindow { days } | Self::WithinWindow { days } => Some(days),
            Self::MissingDates | Self::Unparsable => None,
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

// chrono's `%Y` takes 1-4 digits and a sign, so the shape is checked first.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}
