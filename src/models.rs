// 🧾 Reconciliation data model - what the backend hands us
//
// None of these records are owned by the console. The backend creates them,
// transitions them and decides what matches what; we only read them and ask
// for transitions. Field names follow the backend's camelCase JSON.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type StaffId = i64;
pub type ReconciliationId = i64;
pub type DonationId = i64;
pub type ClaimId = i64;

// ============================================================================
// BANK TRANSACTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    Unsettled,
    Matched,
    Settled,
    NotFound,
    Unclaimed,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Unsettled => "UNSETTLED",
            ReconciliationStatus::Matched => "MATCHED",
            ReconciliationStatus::Settled => "SETTLED",
            ReconciliationStatus::NotFound => "NOT_FOUND",
            ReconciliationStatus::Unclaimed => "UNCLAIMED",
        }
    }

    /// Already resolved rows; settling them again is never offered.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            ReconciliationStatus::Matched | ReconciliationStatus::Settled
        )
    }
}

impl Default for ReconciliationStatus {
    fn default() -> Self {
        ReconciliationStatus::Unclaimed
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an uploaded bank statement, as the backend reconciled it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    /// Reconciliation row id (the handle every request uses)
    pub id: ReconciliationId,

    /// Bank-side reference printed on the statement
    pub transaction_id: String,

    #[serde(default)]
    pub transaction_amount: f64,

    #[serde(default)]
    pub transaction_date: String,

    #[serde(default)]
    pub transaction_mode: String,

    #[serde(default)]
    pub reconciliation_status: ReconciliationStatus,

    #[serde(default)]
    pub claims_count: u32,
}

// ============================================================================
// DONATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Created,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: DonationId,
    pub donor: DonorRef,
    pub amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_campaign: Option<String>,

    /// Payment mode as the donation was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DonationStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_sent: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_sent: Option<bool>,

    /// 80G certificate issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form80_sent: Option<bool>,
}

// ============================================================================
// CLAIMS (disputed transactions)
// ============================================================================

/// Claim lifecycle: CREATED -> APPROVED | REJECTED, both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Created,
    Approved,
    Rejected,
}

impl DisputeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisputeStatus::Created)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisputeStatus::Created => "Pending Review",
            DisputeStatus::Approved => "Approved",
            DisputeStatus::Rejected => "Rejected",
        }
    }
}

impl Default for DisputeStatus {
    fn default() -> Self {
        DisputeStatus::Created
    }
}

/// Admin view of one staff claim against a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSummary {
    pub id: ClaimId,

    #[serde(default)]
    pub staff_name: String,

    #[serde(default)]
    pub donor_name: String,

    #[serde(default)]
    pub donation_amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<String>,

    #[serde(default)]
    pub dispute_status: DisputeStatus,
}

/// A staff member's own claim, as listed under "My Claims".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffClaim {
    pub id: ClaimId,
    pub bank_transaction_id: String,
    #[serde(default)]
    pub bank_amount: f64,
    #[serde(default)]
    pub bank_transaction_date: String,
    #[serde(default)]
    pub donation_amount: f64,
    #[serde(default)]
    pub donor_name: String,
    #[serde(default)]
    pub dispute_status: DisputeStatus,
    #[serde(default)]
    pub claimed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
}

/// Admin outer list row: a transaction with at least one open claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReconciliation {
    pub reconciliation_id: ReconciliationId,
    pub bank_transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_amount: Option<f64>,
    #[serde(default)]
    pub bank_date: String,
    #[serde(default)]
    pub transaction_mode: String,
    #[serde(default)]
    pub claims_count: u32,
}

impl PendingReconciliation {
    pub fn is_single_claim(&self) -> bool {
        self.claims_count == 1
    }
}

/// Claim creation correlates exactly these three ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub donation_id: DonationId,
    pub staff_id: StaffId,
    pub reconciliation_id: ReconciliationId,
}

// ============================================================================
// PAGINATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn first(size: u32) -> Self {
        PageRequest { page: 0, size }
    }

    pub fn at(page: u32, size: u32) -> Self {
        PageRequest { page, size }
    }
}

/// Spring-style page envelope. A missing `content` decodes as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,

    #[serde(default)]
    pub total_elements: u64,

    #[serde(default)]
    pub number: u32,

    #[serde(default)]
    pub size: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Page {
            content: Vec::new(),
            total_elements: 0,
            number: 0,
            size: 0,
        }
    }
}

impl<T> Page<T> {
    pub fn from_items(content: Vec<T>, total_elements: u64, request: PageRequest) -> Self {
        Page {
            content,
            total_elements,
            number: request.page,
            size: request.size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn total_pages(&self) -> u32 {
        if self.size == 0 {
            return if self.content.is_empty() { 0 } else { 1 };
        }
        ((self.total_elements + self.size as u64 - 1) / self.size as u64) as u32
    }
}

/// Some list endpoints answer with a page, some with a bare array.
pub fn page_or_list<'de, D, T>(deserializer: D) -> Result<Page<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape<T> {
        List(Vec<T>),
        Paged(Page<T>),
    }

    Ok(match Shape::deserialize(deserializer)? {
        Shape::List(content) => Page {
            total_elements: content.len() as u64,
            size: content.len() as u32,
            number: 0,
            content,
        },
        Shape::Paged(page) => page,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bank_transaction_defaults_missing_fields() {
        let tx: BankTransaction = serde_json::from_value(json!({
            "id": 42,
            "transactionId": "UTR-991"
        }))
        .unwrap();

        assert_eq!(tx.reconciliation_status, ReconciliationStatus::Unclaimed);
        assert_eq!(tx.claims_count, 0);
        assert_eq!(tx.transaction_amount, 0.0);
    }

    #[test]
    fn test_status_wire_names() {
        let status: ReconciliationStatus = serde_json::from_value(json!("NOT_FOUND")).unwrap();
        assert_eq!(status, ReconciliationStatus::NotFound);
        assert_eq!(status.to_string(), "NOT_FOUND");
        assert!(ReconciliationStatus::Settled.is_resolved());
        assert!(!ReconciliationStatus::Unsettled.is_resolved());
    }

    #[test]
    fn test_page_without_content_is_empty() {
        let page: Page<BankTransaction> = serde_json::from_value(json!({
            "totalElements": 0
        }))
        .unwrap();

        assert!(page.is_empty());
        assert_eq!(page.total_pages(), 0);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page: Page<u8> = Page::from_items(vec![1, 2, 3], 21, PageRequest::first(10));
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_page_or_list_accepts_both_shapes() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "page_or_list")]
            claims: Page<ClaimSummary>,
        }

        let bare: Wrapper = serde_json::from_value(json!({
            "claims": [{"id": 1, "staffName": "Anjali", "donorName": "Ramesh Gupta", "donationAmount": 5000.0}]
        }))
        .unwrap();
        assert_eq!(bare.claims.content.len(), 1);
        assert_eq!(bare.claims.total_elements, 1);
        assert_eq!(bare.claims.content[0].dispute_status, DisputeStatus::Created);

        let paged: Wrapper = serde_json::from_value(json!({
            "claims": {"content": [], "totalElements": 7}
        }))
        .unwrap();
        assert_eq!(paged.claims.total_elements, 7);
    }

    #[test]
    fn test_dispute_status_terminality() {
        assert!(!DisputeStatus::Created.is_terminal());
        assert!(DisputeStatus::Approved.is_terminal());
        assert!(DisputeStatus::Rejected.is_terminal());
    }
}
