//! Flat daily amortization for merchant cash advances.
//!
//! Every day of the term carries the same amount: total repayment divided by
//! the term, rounded to cents. There is no declining balance.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::errors::LedgerError;
use crate::structs::PaymentEntry;

/// Longest repayment period accepted, ten years of daily payments.
pub const MAX_TERM_DAYS: u32 = 3650;

/// Per-day repayment, `round(size * rate / term, 2)`.
pub fn daily_amount(size: u64, rate: Decimal, term: u32) -> Result<Decimal, LedgerError> {
    if term == 0 {
        return Err(LedgerError::InvalidTerm(term));
    }
    let total = Decimal::from(size)
        .checked_mul(rate)
        .ok_or_else(|| LedgerError::invalid("size", "repayment total overflows"))?;
    let daily = total
        .checked_div(Decimal::from(term))
        .ok_or_else(|| LedgerError::invalid("term", "daily amount overflows"))?;
    Ok(to_cents(daily))
}

/// Rounds half-to-even on the exact decimal value and fixes the scale at two
/// places.
pub fn to_cents(amount: Decimal) -> Decimal {
    let mut cents = amount.round_dp(2);
    cents.rescale(2);
    cents
}

/// Builds the schedule for a deal, one entry per day starting at `anchor`.
pub fn generate_schedule(
    size: u64,
    rate: Decimal,
    term: u32,
    anchor: NaiveDate,
) -> Result<Vec<PaymentEntry>, LedgerError> {
    let amount = daily_amount(size, rate, term)?;
    if term > MAX_TERM_DAYS {
        return Err(LedgerError::invalid(
            "term",
            format!("{term} days exceeds the {MAX_TERM_DAYS}-day maximum"),
        ));
    }
    let last_offset = u64::from(term - 1);
    if anchor.checked_add_days(Days::new(last_offset)).is_none() {
        return Err(LedgerError::invalid("term", "schedule runs past the calendar"));
    }

    let mut schedule = Vec::with_capacity(term as usize);
    let mut date = anchor;
    for offset in 0..=last_offset {
        if offset > 0 {
            date = date
                .succ_opt()
                .ok_or_else(|| LedgerError::invalid("term", "schedule runs past the calendar"))?;
        }
        schedule.push(PaymentEntry::scheduled(date, amount));
    }
    Ok(schedule)
}
