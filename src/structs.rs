use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Deal {
    pub id: String,
    pub name: String,
    /// Principal advanced, in whole currency units.
    pub size: u64,
    /// Repayment multiplier: total repayment is `size * rate`.
    pub rate: Decimal,
    /// Repayment period in days.
    pub term: u32,
}

impl Deal {
    pub fn total_repayment(&self) -> Decimal {
        Decimal::from(self.size) * self.rate
    }
}

/// One day of a deal's repayment schedule.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PaymentEntry {
    pub date: NaiveDate,
    pub amount: Decimal,
    /// Free text, empty until someone sets it.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PaymentEntry {
    pub fn scheduled(date: NaiveDate, amount: Decimal) -> Self {
        PaymentEntry {
            date,
            amount,
            status: String::new(),
            original_amount: None,
            note: None,
        }
    }

    pub fn has_status(&self, status: &str) -> bool {
        self.status.eq_ignore_ascii_case(status)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ShareView {
    pub user: String,
    pub percent: u32,
    pub amount: Decimal,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DealSummary {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub rate: Decimal,
    pub term: u32,
    pub total_repayment: Decimal,
    pub daily_amount: Decimal,
    pub paid_count: usize,
    pub progress: u32,
    pub shares: Vec<ShareView>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct DashboardMetrics {
    pub total_funded: u64,
    pub total_to_collect: Decimal,
    pub total_collected: Decimal,
    pub missed_payments: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DailyCollection {
    pub date: NaiveDate,
    pub collected: Decimal,
}

/// A deal's slice of the total funded book.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DealDistribution {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub percent: Decimal,
}
