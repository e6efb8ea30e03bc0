// CSV export of reconciliation rows (what the operator sees in a bucket)

use crate::models::BankTransaction;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ExportRow<'a> {
    id: i64,
    transaction_id: &'a str,
    transaction_date: &'a str,
    transaction_mode: &'a str,
    amount: String,
    status: &'static str,
    claims_count: u32,
}

/// Write `rows` as CSV with a header line. Returns the number of data rows.
pub fn write_transactions_csv<W: Write>(rows: &[BankTransaction], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for row in rows {
        wtr.serialize(ExportRow {
            id: row.id,
            transaction_id: &row.transaction_id,
            transaction_date: &row.transaction_date,
            transaction_mode: &row.transaction_mode,
            amount: format!("{:.2}", row.transaction_amount),
            status: row.reconciliation_status.as_str(),
            claims_count: row.claims_count,
        })
        .with_context(|| format!("Failed to write row {}", row.id))?;
    }

    wtr.flush().context("Failed to flush CSV export")?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::fixtures::bank_transaction;
    use crate::models::ReconciliationStatus;

    #[test]
    fn test_export_writes_header_and_rows() {
        let rows = vec![
            bank_transaction(1, ReconciliationStatus::Unsettled),
            bank_transaction(2, ReconciliationStatus::Settled),
        ];
        let mut out = Vec::new();

        let written = write_transactions_csv(&rows, &mut out).unwrap();

        assert_eq!(written, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "id,transaction_id,transaction_date,transaction_mode,amount,status,claims_count"
        );
        assert_eq!(lines[1], "1,UTR000001,2025-01-15,UPI,5000.00,UNSETTLED,0");
        assert_eq!(lines[2], "2,UTR000002,2025-01-15,UPI,5000.00,SETTLED,0");
    }

    #[test]
    fn test_empty_export_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(write_transactions_csv(&[], &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
