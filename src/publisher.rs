use crate::error::{Result, SinkError};
use crate::schema::{
    PublishedReport, PublishedRow, ReportTable, SheetLocation, SheetTab, UpdateSummary,
    NOT_AVAILABLE,
};
use crate::sink::SpreadsheetSink;
use crate::utils::{days_overdue, format_timestamp, top_left_range, trailing_ranges};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

/// Derives the publish-time columns for every row of `table` as of `now`.
///
/// `now` is shared by all rows so a single run reports one consistent
/// timestamp. The table itself is left untouched.
pub fn render(table: &ReportTable, now: DateTime<Utc>) -> PublishedReport {
    let last_updated_at = format_timestamp(now);

    let rows = table
        .rows
        .iter()
        .map(|record| {
            let (original_due_date, days_overdue) = match record.original_due_date {
                Some(due) => {
                    let days = days_overdue(due, now);
                    if days < 0 {
                        warn!(
                            "Subscription {} has a due date {} after the report time {}",
                            record.subscription_id,
                            format_timestamp(due),
                            last_updated_at
                        );
                    }
                    (format_timestamp(due), days.to_string())
                }
                None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
            };

            PublishedRow {
                record: record.clone(),
                original_due_date,
                last_updated_at: last_updated_at.clone(),
                days_overdue,
            }
        })
        .collect();

    PublishedReport {
        generated_at: now,
        rows,
    }
}

pub struct Publisher<'a> {
    sink: &'a dyn SpreadsheetSink,
    clear_stale_rows: bool,
}

impl<'a> Publisher<'a> {
    pub fn new(sink: &'a dyn SpreadsheetSink) -> Self {
        Self {
            sink,
            clear_stale_rows: true,
        }
    }

    /// Whether to clear whatever lies outside the freshly written block, so rows
    /// left over from a longer previous report do not survive. The clear only
    /// runs after the write has been accepted.
    pub fn with_clear_stale_rows(mut self, clear: bool) -> Self {
        self.clear_stale_rows = clear;
        self
    }

    pub async fn resolve_tab_name(&self, location: &SheetLocation) -> Result<String> {
        Ok(self.resolve_tab(location).await?.title)
    }

    async fn resolve_tab(&self, location: &SheetLocation) -> Result<SheetTab> {
        let tabs = self.sink.sheet_tabs(&location.spreadsheet_id).await?;

        tabs.into_iter()
            .find(|tab| tab.tab_id == location.tab_id)
            .ok_or_else(|| {
                SinkError::TabNotFound {
                    spreadsheet_id: location.spreadsheet_id.clone(),
                    tab_id: location.tab_id,
                }
                .into()
            })
    }

    /// Publishes `table` stamped with the current time.
    pub async fn publish(
        &self,
        table: &ReportTable,
        location: &SheetLocation,
    ) -> Result<UpdateSummary> {
        let tab = self.resolve_tab(location).await?;
        let report = render(table, Utc::now());
        self.write(&tab, &report, location).await
    }

    /// Publishes `table` as of an explicit instant.
    pub async fn publish_at(
        &self,
        table: &ReportTable,
        location: &SheetLocation,
        now: DateTime<Utc>,
    ) -> Result<UpdateSummary> {
        let tab = self.resolve_tab(location).await?;
        let report = render(table, now);
        self.write(&tab, &report, location).await
    }

    async fn write(
        &self,
        tab: &SheetTab,
        report: &PublishedReport,
        location: &SheetLocation,
    ) -> Result<UpdateSummary> {
        let tab_name = tab.title.as_str();
        let matrix = report.to_matrix();
        let rows = matrix.len() as u32;
        let cols = matrix.first().map_or(0, Vec::len) as u32;

        let updated = self
            .sink
            .overwrite_range(&location.spreadsheet_id, &top_left_range(tab_name), matrix)
            .await?;

        if self.clear_stale_rows {
            for range in trailing_ranges(tab_name, rows, cols, tab.row_count, tab.column_count) {
                debug!("Clearing stale cells {}", range);
                self.sink
                    .clear_range(&location.spreadsheet_id, &range)
                    .await
                    .inspect_err(|e| {
                        warn!(
                            "Report written to '{}' but stale cells {} could not be cleared: {}",
                            tab_name, range, e
                        )
                    })?;
            }
        }

        info!(
            "{} cells updated in sheet '{}'.",
            updated.updated_cells, tab_name
        );

        Ok(UpdateSummary {
            tab_name: tab_name.to_string(),
            updated_cells: updated.updated_cells,
            updated_rows: updated.updated_rows,
        })
    }
}
