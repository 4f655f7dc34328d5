use crate::error::Result;
use crate::schema::{SheetTab, UpdatedRange};
use async_trait::async_trait;

/// The spreadsheet operations the publisher needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpreadsheetSink: Send + Sync {
    /// Every tab in the spreadsheet, with its numeric id, title and grid size.
    async fn sheet_tabs(&self, spreadsheet_id: &str) -> Result<Vec<SheetTab>>;

    /// Overwrite cells starting at `range`, parsing values as if typed by a user.
    async fn overwrite_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<UpdatedRange>;

    /// Clear every value in `range`, keeping formatting.
    async fn clear_range(&self, spreadsheet_id: &str, range: &str) -> Result<()>;
}
