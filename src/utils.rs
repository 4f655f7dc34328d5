use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Minor currency units are hundredths for every currency this report handles.
pub const MINOR_UNITS_PER_MAJOR: u32 = 2;

const MILLIS_PER_DAY: i64 = 86_400_000;

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
}

/// Converts an amount in minor units (cents) to major units, exactly.
pub fn minor_to_major(amount: i64) -> Decimal {
    Decimal::new(amount, MINOR_UNITS_PER_MAJOR)
}

/// Whole days from `due` to `now`, rounded towards negative infinity.
///
/// A due date in the future yields a negative count; callers decide how to
/// surface it.
pub fn days_overdue(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - due).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

/// Quotes a tab title for use in A1 notation, doubling embedded single quotes.
pub fn quote_sheet_name(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// The range anchored at the top-left cell of a tab.
pub fn top_left_range(title: &str) -> String {
    format!("{}!A1", quote_sheet_name(title))
}

/// Spreadsheet column letters for a 1-based column number: 1 is `A`, 27 is `AA`.
pub fn column_letter(column: u32) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Ranges of a `grid_rows` x `grid_cols` tab that lie outside a block of
/// `rows` x `cols` written at `A1`: first the rows below it, then the columns
/// to its right. Empty when the block covers the grid.
pub fn trailing_ranges(
    title: &str,
    rows: u32,
    cols: u32,
    grid_rows: u32,
    grid_cols: u32,
) -> Vec<String> {
    let name = quote_sheet_name(title);
    let last_col = column_letter(grid_cols.max(cols));
    let mut ranges = Vec::new();

    if grid_rows > rows {
        ranges.push(format!("{}!A{}:{}{}", name, rows + 1, last_col, grid_rows));
    }
    if grid_cols > cols && rows > 0 {
        ranges.push(format!(
            "{}!{}1:{}{}",
            name,
            column_letter(cols + 1),
            last_col,
            rows.min(grid_rows)
        ));
    }

    ranges
}

pub fn normalize_currency(currency: &str) -> String {
    currency.trim().to_uppercase()
}
