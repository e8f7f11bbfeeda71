// Best-effort parsing of free-form `Information Date` values into calendar dates.
// Time-of-day tails are dropped; unparseable input degrades to no date plus a warning.
use serde::Serialize;
use time::Date;
use time::macros::format_description;

/// Non-fatal diagnostic for an `Information Date` that could not be understood.
/// The record is kept with no date; its saved text is left as it was.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DateParseWarning {
    pub id: i64,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

impl DateParseWarning {
    pub fn message(&self) -> String {
        format!(
            "record {}: could not parse Information Date {:?}; date left empty",
            self.id, self.input
        )
    }
}

/// Returns `None` for empty input as well as for text no known layout accepts.
pub fn parse_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_known_layouts(trimmed).or_else(|| {
        let head = date_head(trimmed)?;
        parse_known_layouts(head)
    })
}

pub fn format_date(date: Date) -> String {
    date.to_string()
}

// "2017-04-30T00:00:00", "4/30/2017 12:00:00 AM" -> the leading date token.
fn date_head(value: &str) -> Option<&str> {
    if !value.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let end = value.find(['T', ' '])?;
    Some(&value[..end])
}

fn parse_known_layouts(value: &str) -> Option<Date> {
    Date::parse(
        value,
        format_description!("[year]-[month padding:none]-[day padding:none]"),
    )
    .or_else(|_| {
        Date::parse(
            value,
            format_description!("[year]/[month padding:none]/[day padding:none]"),
        )
    })
    .or_else(|_| {
        Date::parse(
            value,
            format_description!("[month padding:none]/[day padding:none]/[year]"),
        )
    })
    .or_else(|_| {
        Date::parse(
            value,
            format_description!("[month padding:none]-[day padding:none]-[year]"),
        )
    })
    .or_else(|_| Date::parse(value, format_description!("[year][month][day]")))
    .or_else(|_| {
        Date::parse(
            value,
            format_description!(
                "[month repr:long case_sensitive:false] [day padding:none], [year]"
            ),
        )
    })
    .or_else(|_| {
        Date::parse(
            value,
            format_description!("[month repr:long case_sensitive:false] [day padding:none] [year]"),
        )
    })
    .or_else(|_| {
        Date::parse(
            value,
            format_description!(
                "[month repr:short case_sensitive:false] [day padding:none], [year]"
            ),
        )
    })
    .or_else(|_| {
        Date::parse(
            value,
            format_description!("[day padding:none] [month repr:long case_sensitive:false] [year]"),
        )
    })
    .or_else(|_| {
        Date::parse(
            value,
            format_description!("[day padding:none]-[month repr:short case_sensitive:false]-[year]"),
        )
    })
    .ok()
}
