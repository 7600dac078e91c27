use chrono::{Datelike, NaiveDate};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
];

/// Month-year grouping key (`YYYY-MM`) for a receipt.
///
/// Uses the date printed on the receipt when it parses, otherwise `fallback`.
pub fn month_year_key(receipt_date: Option<&str>, fallback: NaiveDate) -> String {
    let date = receipt_date
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .and_then(parse_receipt_date)
        .unwrap_or(fallback);
    format!("{:04}-{:02}", date.year(), date.month())
}

fn parse_receipt_date(text: &str) -> Option<NaiveDate> {
    // OCR output often carries a time after the date.
    let candidate = text.split('T').next().unwrap_or(text);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
        .or_else(|| {
            let head = candidate.split_whitespace().next()?;
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(head, format).ok())
        })
}
