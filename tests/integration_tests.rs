use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use late_payments_report::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A processor holding every subscription in memory and serving them in fixed-size pages.
struct InMemoryProcessor {
    subscriptions: Vec<SubscriptionSummary>,
    invoices: HashMap<String, InvoiceSummary>,
    customers: HashMap<String, CustomerSummary>,
    page_size: usize,
    list_calls: AtomicUsize,
}

impl InMemoryProcessor {
    fn new(page_size: usize) -> Self {
        Self {
            subscriptions: Vec::new(),
            invoices: HashMap::new(),
            customers: HashMap::new(),
            page_size,
            list_calls: AtomicUsize::new(0),
        }
    }

    fn add(
        &mut self,
        id: &str,
        status: SubscriptionStatus,
        invoice: Option<(i64, DateTime<Utc>)>,
        email: Option<&str>,
    ) {
        let customer_id = format!("cus_{}", id);
        let invoice_id = invoice.map(|(amount_due, created)| {
            let invoice_id = format!("in_{}", id);
            self.invoices.insert(
                invoice_id.clone(),
                InvoiceSummary {
                    id: invoice_id.clone(),
                    amount_due,
                    created,
                },
            );
            invoice_id
        });
        self.customers.insert(
            customer_id.clone(),
            CustomerSummary {
                id: customer_id.clone(),
                email: email.map(str::to_string),
            },
        );
        self.subscriptions.push(SubscriptionSummary {
            id: id.to_string(),
            status,
            customer_id,
            latest_invoice_id: invoice_id,
            currency: "usd".to_string(),
        });
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryProcessor {
    async fn list_subscriptions(&self, starting_after: Option<String>) -> Result<SubscriptionPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let start = match starting_after {
            None => 0,
            Some(cursor) => {
                self.subscriptions
                    .iter()
                    .position(|s| s.id == cursor)
                    .ok_or_else(|| ReportError::upstream("list subscriptions", "bad cursor"))?
                    + 1
            }
        };
        let end = (start + self.page_size).min(self.subscriptions.len());

        Ok(SubscriptionPage {
            data: self.subscriptions[start..end].to_vec(),
            has_more: end < self.subscriptions.len(),
        })
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<InvoiceSummary> {
        self.invoices
            .get(invoice_id)
            .cloned()
            .ok_or_else(|| {
                ReportError::upstream_status(
                    "retrieve invoice",
                    format!("No such invoice: {}", invoice_id),
                    404,
                )
            })
    }

    async fn get_customer(&self, customer_id: &str) -> Result<CustomerSummary> {
        self.customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| {
                ReportError::upstream_status(
                    "retrieve customer",
                    format!("No such customer: {}", customer_id),
                    404,
                )
            })
    }
}

/// A single-tab spreadsheet that applies writes cell by cell, like the real API.
struct InMemorySheet {
    tab: SheetTab,
    grid: Mutex<Vec<Vec<String>>>,
    reject_writes: bool,
    clear_calls: AtomicUsize,
}

const GRID_ROWS: u32 = 20;
const GRID_COLUMNS: u32 = 12;

impl InMemorySheet {
    fn new(tab_id: i64, title: &str) -> Self {
        Self {
            tab: SheetTab {
                tab_id,
                title: title.to_string(),
                row_count: GRID_ROWS,
                column_count: GRID_COLUMNS,
            },
            grid: Mutex::new(Vec::new()),
            reject_writes: false,
            clear_calls: AtomicUsize::new(0),
        }
    }

    /// Fills the top of the tab with rows wider than the report, as a previous
    /// run with extra notes to the right would leave them.
    fn with_rows(self, rows: usize) -> Self {
        *self.grid.lock().unwrap() = (0..rows)
            .map(|i| vec![format!("stale_{}", i); 11])
            .collect();
        self
    }

    /// Non-empty rows with trailing blank cells dropped.
    fn rows(&self) -> Vec<Vec<String>> {
        self.grid
            .lock()
            .unwrap()
            .iter()
            .map(|row| {
                let width = row.iter().rposition(|cell| !cell.is_empty()).map_or(0, |i| i + 1);
                row[..width].to_vec()
            })
            .filter(|row| !row.is_empty())
            .collect()
    }
}

/// 1-based (row, column) of an A1 cell such as `J12`.
fn parse_cell(cell: &str) -> (usize, usize) {
    let split = cell.find(|c: char| c.is_ascii_digit()).unwrap();
    let (letters, digits) = cell.split_at(split);
    let column = letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
    (digits.parse().unwrap(), column)
}

#[async_trait]
impl SpreadsheetSink for InMemorySheet {
    async fn sheet_tabs(&self, _spreadsheet_id: &str) -> Result<Vec<SheetTab>> {
        Ok(vec![self.tab.clone()])
    }

    async fn overwrite_range(
        &self,
        _spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<UpdatedRange> {
        if self.reject_writes {
            return Err(SinkError::WriteRejected("quota exceeded".to_string()).into());
        }
        assert_eq!(range, top_left_range(&self.tab.title));

        let mut grid = self.grid.lock().unwrap();
        let mut cells = 0u64;
        for (r, row) in values.iter().enumerate() {
            if grid.len() <= r {
                grid.push(Vec::new());
            }
            for (c, value) in row.iter().enumerate() {
                if grid[r].len() <= c {
                    grid[r].resize(c + 1, String::new());
                }
                grid[r][c] = value.clone();
                cells += 1;
            }
        }

        Ok(UpdatedRange {
            updated_cells: cells,
            updated_rows: values.len() as u64,
        })
    }

    async fn clear_range(&self, _spreadsheet_id: &str, range: &str) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);

        let (name, cells) = range.rsplit_once('!').unwrap();
        assert_eq!(name, quote_sheet_name(&self.tab.title));
        let (from, to) = cells.split_once(':').unwrap();
        let (first_row, first_col) = parse_cell(from);
        let (last_row, last_col) = parse_cell(to);
        assert!(last_row <= GRID_ROWS as usize && last_col <= GRID_COLUMNS as usize);

        let mut grid = self.grid.lock().unwrap();
        for row in grid.iter_mut().take(last_row).skip(first_row - 1) {
            for cell in row.iter_mut().take(last_col).skip(first_col - 1) {
                cell.clear();
            }
        }
        Ok(())
    }
}

fn config(tab_id: i64, clear_stale_rows: bool, policy: LookupFailurePolicy) -> ReportConfig {
    ReportConfig {
        processor_api_key: "sk_test".to_string(),
        spreadsheet_id: "spreadsheet".to_string(),
        tab_id,
        credentials_path: PathBuf::from("creds.json"),
        lookup_failure_policy: policy,
        clear_stale_rows,
    }
}

fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn test_multi_page_report_preserves_listing_order() {
    let mut processor = InMemoryProcessor::new(3);
    let statuses = [
        SubscriptionStatus::Active,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::Unpaid,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::IncompleteExpired,
        SubscriptionStatus::Unpaid,
        SubscriptionStatus::Active,
        SubscriptionStatus::Paused,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Incomplete,
    ];
    for (i, status) in statuses.iter().enumerate() {
        processor.add(
            &format!("sub_{:02}", i),
            *status,
            Some((1000 + i as i64, jan(1))),
            Some("billing@example.com"),
        );
    }

    let sheet = InMemorySheet::new(5, "Late Payments");
    let config = config(5, true, LookupFailurePolicy::Degrade);

    let summary = LatePaymentsReport::new(&config, &processor, &sheet)
        .run_at(jan(11))
        .await
        .unwrap();

    assert_eq!(processor.list_calls.load(Ordering::SeqCst), 4);
    assert_eq!(summary.subscriptions_processed, 12);
    assert_eq!(summary.late_subscriptions, 5);

    let rows = sheet.rows();
    let ids: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, vec!["sub_01", "sub_03", "sub_05", "sub_07", "sub_10"]);
    assert!(rows[1..]
        .iter()
        .all(|r| r[1] == "past_due" || r[1] == "unpaid"));
    assert!(rows[1..].iter().all(|r| r[8] == "10"));
}

#[tokio::test]
async fn test_reference_row_and_missing_invoice() {
    let mut processor = InMemoryProcessor::new(100);
    processor.add(
        "1",
        SubscriptionStatus::PastDue,
        Some((2550, jan(1))),
        Some("a@b.com"),
    );
    processor.add("2", SubscriptionStatus::Unpaid, None, None);

    let sheet = InMemorySheet::new(0, "Sheet1");
    let config = config(0, true, LookupFailurePolicy::Degrade);

    LatePaymentsReport::new(&config, &processor, &sheet)
        .run_at(jan(11))
        .await
        .unwrap();

    let rows = sheet.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[1],
        vec![
            "1",
            "past_due",
            "cus_1",
            "a@b.com",
            "25.50",
            "USD",
            "2024-01-01 00:00:00 UTC",
            "2024-01-11 00:00:00 UTC",
            "10",
        ]
    );
    assert_eq!(
        rows[2],
        vec![
            "2",
            "unpaid",
            "cus_2",
            "N/A",
            "N/A",
            "USD",
            "N/A",
            "2024-01-11 00:00:00 UTC",
            "N/A",
        ]
    );
}

#[tokio::test]
async fn test_no_late_subscriptions_publishes_header_only() {
    let mut processor = InMemoryProcessor::new(100);
    processor.add("1", SubscriptionStatus::Active, Some((500, jan(1))), None);

    let sheet = InMemorySheet::new(0, "Sheet1").with_rows(4);
    let config = config(0, true, LookupFailurePolicy::Degrade);

    let summary = run_report(&config, &processor, &sheet).await.unwrap();

    assert_eq!(summary.late_subscriptions, 0);
    assert_eq!(summary.update.updated_rows, 1);
    assert_eq!(sheet.rows(), vec![PublishedReport::header()]);
}

#[tokio::test]
async fn test_stale_rows_cleared_or_left_behind() {
    let mut processor = InMemoryProcessor::new(100);
    processor.add("1", SubscriptionStatus::PastDue, Some((100, jan(1))), None);
    processor.add("2", SubscriptionStatus::PastDue, Some((200, jan(2))), None);

    let cleared = InMemorySheet::new(0, "Sheet1").with_rows(6);
    run_report(&config(0, true, LookupFailurePolicy::Degrade), &processor, &cleared)
        .await
        .unwrap();
    let rows = cleared.rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2][0], "2");
    assert!(rows.iter().all(|r| r.len() == 9));

    let overwritten = InMemorySheet::new(0, "Sheet1").with_rows(6);
    run_report(&config(0, false, LookupFailurePolicy::Degrade), &processor, &overwritten)
        .await
        .unwrap();
    let rows = overwritten.rows();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[2][0], "2");
    assert_eq!(rows[3][0], "stale_3");
    assert_eq!(rows[0][10], "stale_0");
    assert_eq!(overwritten.clear_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_write_keeps_previous_snapshot() {
    let mut processor = InMemoryProcessor::new(100);
    processor.add("1", SubscriptionStatus::PastDue, Some((100, jan(1))), None);

    let mut sheet = InMemorySheet::new(0, "Sheet1").with_rows(6);
    sheet.reject_writes = true;
    let previous = sheet.rows();

    let result = run_report(&config(0, true, LookupFailurePolicy::Degrade), &processor, &sheet).await;

    assert!(matches!(
        result,
        Err(ReportError::Sink(SinkError::WriteRejected(_)))
    ));
    assert_eq!(sheet.rows(), previous);
    assert_eq!(sheet.rows()[5][0], "stale_5");
    assert_eq!(sheet.clear_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_repeated_runs_differ_only_in_derived_columns() {
    let mut processor = InMemoryProcessor::new(2);
    processor.add("1", SubscriptionStatus::PastDue, Some((999, jan(1))), Some("x@y.z"));
    processor.add("2", SubscriptionStatus::Unpaid, Some((1, jan(5))), None);
    processor.add("3", SubscriptionStatus::Unpaid, None, Some("q@r.s"));

    let sheet = InMemorySheet::new(0, "Sheet1");
    let config = config(0, true, LookupFailurePolicy::Degrade);
    let report = LatePaymentsReport::new(&config, &processor, &sheet);

    report.run_at(jan(11)).await.unwrap();
    let first = sheet.rows();
    report
        .run_at(jan(11) + Duration::days(5) + Duration::hours(7))
        .await
        .unwrap();
    let second = sheet.rows();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()).skip(1) {
        assert_eq!(a[..7], b[..7]);
        assert_ne!(a[7], b[7]);
    }
    assert_eq!(first[1][8], "10");
    assert_eq!(second[1][8], "15");
    assert_eq!(first[2][8], "6");
    assert_eq!(second[2][8], "11");
    assert_eq!(second[3][8], "N/A");
}

#[tokio::test]
async fn test_missing_invoice_degrades_or_aborts() {
    let mut processor = InMemoryProcessor::new(100);
    processor.add("1", SubscriptionStatus::PastDue, Some((100, jan(1))), None);
    processor.subscriptions[0].latest_invoice_id = Some("in_deleted".to_string());
    processor.add("2", SubscriptionStatus::Unpaid, Some((200, jan(2))), None);

    let degraded = InMemorySheet::new(0, "Sheet1");
    let summary = run_report(&config(0, true, LookupFailurePolicy::Degrade), &processor, &degraded)
        .await
        .unwrap();
    assert_eq!(summary.late_subscriptions, 2);
    let rows = degraded.rows();
    assert_eq!(rows[1][4], "N/A");
    assert_eq!(rows[1][6], "N/A");
    assert_eq!(rows[2][4], "2.00");

    let untouched = InMemorySheet::new(0, "Sheet1").with_rows(2);
    let result = run_report(&config(0, true, LookupFailurePolicy::Abort), &processor, &untouched).await;
    assert!(matches!(result, Err(ReportError::Upstream { .. })));
    assert_eq!(untouched.rows()[0][0], "stale_0");
}

#[tokio::test]
async fn test_sink_failures() {
    let processor = InMemoryProcessor::new(100);

    let sheet = InMemorySheet::new(1, "Sheet1");
    let result = run_report(&config(2, true, LookupFailurePolicy::Degrade), &processor, &sheet).await;
    assert!(matches!(
        result,
        Err(ReportError::Sink(SinkError::TabNotFound { tab_id: 2, .. }))
    ));

    let mut rejecting = InMemorySheet::new(1, "Sheet1");
    rejecting.reject_writes = true;
    let result = run_report(&config(1, false, LookupFailurePolicy::Degrade), &processor, &rejecting).await;
    assert!(matches!(
        result,
        Err(ReportError::Sink(SinkError::WriteRejected(_)))
    ));
}
