//! In-memory book of users, deals, syndications and payment schedules.

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::errors::LedgerError;
use crate::schedule::{generate_schedule, to_cents};
use crate::structs::{
    DailyCollection, DashboardMetrics, Deal, DealDistribution, DealSummary, PaymentEntry, ShareView,
};
use crate::utils::{normalize_username, parse_decimal, parse_percent, parse_u32, parse_u64};

const FIRST_DEAL_SEQ: u64 = 101;

pub type Shares = BTreeMap<String, u32>;

#[derive(Debug, Clone)]
pub struct Ledger {
    users: Vec<String>,
    deals: Vec<Deal>,
    syndications: BTreeMap<String, Shares>,
    payments: BTreeMap<String, Vec<PaymentEntry>>,
    next_deal_seq: u64,
}

/// Borrowed view of the whole ledger, ready for rendering.
#[derive(Serialize, Debug)]
pub struct LedgerSnapshot<'a> {
    pub users: &'a [String],
    pub deals: &'a [Deal],
    pub payments: &'a BTreeMap<String, Vec<PaymentEntry>>,
    pub syndications: &'a BTreeMap<String, Shares>,
    pub summaries: Vec<DealSummary>,
    pub distribution: Vec<DealDistribution>,
    pub metrics: DashboardMetrics,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            users: Vec::new(),
            deals: Vec::new(),
            syndications: BTreeMap::new(),
            payments: BTreeMap::new(),
            next_deal_seq: FIRST_DEAL_SEQ,
        }
    }

    /// The starting book the tracker ships with: six investors, three deals.
    pub fn with_demo_data(anchor: NaiveDate) -> Result<Self, LedgerError> {
        let mut ledger = Ledger::new();
        for user in ["albert", "jacobo", "matty", "joel", "zack", "juli"] {
            ledger.add_user(user);
        }

        let deals = [
            ("Green Cafe", 30000, dec!(1.49), 30, vec![("albert", 40), ("jacobo", 60)]),
            (
                "FastFit Gym",
                50000,
                dec!(1.45),
                60,
                vec![("matty", 30), ("joel", 30), ("zack", 40)],
            ),
            ("TechNova Labs", 100000, dec!(1.5), 90, vec![("juli", 50), ("jacobo", 50)]),
        ];
        for (name, size, rate, term, shares) in deals {
            let id = ledger.insert_deal(name, size, rate, term, anchor)?;
            let shares = shares
                .into_iter()
                .map(|(user, pct)| (user.to_owned(), pct))
                .collect();
            ledger.syndications.insert(id, shares);
        }
        Ok(ledger)
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn deal(&self, deal_id: &str) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == deal_id)
    }

    pub fn payments(&self, deal_id: &str) -> Option<&[PaymentEntry]> {
        self.payments.get(deal_id).map(Vec::as_slice)
    }

    pub fn syndication(&self, deal_id: &str) -> Option<&Shares> {
        self.syndications.get(deal_id)
    }

    /// Adds a user unless the normalized name is empty or already known.
    /// Returns whether the user set changed.
    pub fn add_user(&mut self, raw_name: &str) -> bool {
        let name = normalize_username(raw_name);
        if name.is_empty() || self.users.contains(&name) {
            log::debug!("Ignoring user {:?}", raw_name);
            return false;
        }
        log::info!("User added: {}", name);
        self.users.push(name);
        true
    }

    /// Parses form values, records the deal and its payment schedule.
    /// Nothing is recorded when any field is rejected.
    pub fn add_deal(
        &mut self,
        name: &str,
        size: &str,
        rate: &str,
        term: &str,
        anchor: NaiveDate,
    ) -> Result<String, LedgerError> {
        let size = parse_u64("size", size)?;
        let rate = parse_decimal("rate", rate)?;
        let term = parse_u32("term", term)?;
        self.insert_deal(name.trim(), size, rate, term, anchor)
    }

    fn insert_deal(
        &mut self,
        name: &str,
        size: u64,
        rate: Decimal,
        term: u32,
        anchor: NaiveDate,
    ) -> Result<String, LedgerError> {
        let schedule = generate_schedule(size, rate, term, anchor)?;
        let id = format!("D{}", self.next_deal_seq);
        self.next_deal_seq += 1;

        let deal = Deal {
            id: id.clone(),
            name: name.to_owned(),
            size,
            rate,
            term,
        };
        log::info!("Deal created: {:?}", deal);
        self.deals.push(deal);
        self.payments.insert(id.clone(), schedule);
        Ok(id)
    }

    /// Replaces the deal's shares with the positive percentages supplied for
    /// known users. Entries for unknown users are ignored; totals are not
    /// checked against 100.
    pub fn assign_syndication(
        &mut self,
        deal_id: &str,
        percent_by_user: &HashMap<String, String>,
    ) -> Result<&Shares, LedgerError> {
        if self.deal(deal_id).is_none() {
            return Err(LedgerError::UnknownDeal(deal_id.to_owned()));
        }

        let mut shares = Shares::new();
        for user in &self.users {
            let Some(raw) = percent_by_user.get(user) else {
                continue;
            };
            if let Some(pct) = parse_percent(&format!("percent_{user}"), raw)? {
                shares.insert(user.clone(), pct);
            }
        }

        let total: u64 = shares.values().map(|&pct| u64::from(pct)).sum();
        if !shares.is_empty() && total != 100 {
            log::warn!("Syndication for {} totals {}%", deal_id, total);
        }
        log::info!("Syndication assigned for {}: {:?}", deal_id, shares);
        let slot = self.syndications.entry(deal_id.to_owned()).or_default();
        *slot = shares;
        Ok(&*slot)
    }

    fn payment_mut(
        &mut self,
        deal_id: &str,
        day_index: usize,
    ) -> Result<&mut PaymentEntry, LedgerError> {
        let schedule = self
            .payments
            .get_mut(deal_id)
            .ok_or_else(|| LedgerError::UnknownDeal(deal_id.to_owned()))?;
        let len = schedule.len();
        schedule.get_mut(day_index).ok_or_else(|| {
            LedgerError::invalid("day", format!("{day_index} is outside the {len}-day schedule"))
        })
    }

    /// Sets the free-text status of one scheduled payment.
    pub fn update_payment_status(
        &mut self,
        deal_id: &str,
        day_index: usize,
        status: &str,
    ) -> Result<(), LedgerError> {
        let entry = self.payment_mut(deal_id, day_index)?;
        entry.status = status.trim().to_owned();
        log::info!(
            "Payment {} day {} marked {:?}",
            deal_id,
            day_index + 1,
            entry.status
        );
        Ok(())
    }

    /// Overrides one payment's amount, keeping the originally scheduled amount.
    pub fn modify_payment(
        &mut self,
        deal_id: &str,
        day_index: usize,
        amount: &str,
        note: &str,
    ) -> Result<(), LedgerError> {
        let amount = to_cents(parse_decimal("amount", amount)?);
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid("amount", "must be at least one cent"));
        }
        let entry = self.payment_mut(deal_id, day_index)?;
        if entry.original_amount.is_none() {
            entry.original_amount = Some(entry.amount);
        }
        entry.amount = amount;
        entry.status = "modified".to_owned();
        let note = note.trim();
        if !note.is_empty() {
            entry.note = Some(note.to_owned());
        }
        log::info!(
            "Payment {} day {} modified to {}",
            deal_id,
            day_index + 1,
            entry.amount
        );
        Ok(())
    }

    fn summarize(&self, deal: &Deal) -> DealSummary {
        let schedule = self.payments(&deal.id).unwrap_or_default();
        let paid_count = schedule.iter().filter(|p| p.has_status("paid")).count();
        let progress = if schedule.is_empty() {
            0
        } else {
            let pct = (paid_count * 100 + schedule.len() / 2) / schedule.len();
            u32::try_from(pct).unwrap_or(100)
        };
        let shares = self
            .syndication(&deal.id)
            .map(|shares| {
                shares
                    .iter()
                    .map(|(user, &percent)| ShareView {
                        user: user.clone(),
                        percent,
                        amount: Decimal::from(deal.size).saturating_mul(Decimal::from(percent))
                            / dec!(100),
                    })
                    .collect()
            })
            .unwrap_or_default();

        DealSummary {
            id: deal.id.clone(),
            name: deal.name.clone(),
            size: deal.size,
            rate: deal.rate,
            term: deal.term,
            total_repayment: deal.total_repayment(),
            daily_amount: schedule
                .first()
                .map(|p| p.original_amount.unwrap_or(p.amount))
                .unwrap_or_default(),
            paid_count,
            progress,
            shares,
        }
    }

    pub fn metrics(&self) -> DashboardMetrics {
        let mut metrics = DashboardMetrics::default();
        for deal in &self.deals {
            metrics.total_funded = metrics.total_funded.saturating_add(deal.size);
            metrics.total_to_collect = metrics
                .total_to_collect
                .saturating_add(deal.total_repayment());
        }
        for entry in self.payments.values().flatten() {
            if entry.has_status("paid") {
                metrics.total_collected = metrics.total_collected.saturating_add(entry.amount);
            } else if entry.has_status("missed") {
                metrics.missed_payments += 1;
            }
        }
        metrics
    }

    /// Paid amounts per calendar day for the `days` days ending at `today`,
    /// oldest first. Days without collections report zero.
    pub fn daily_collections(&self, today: NaiveDate, days: u32) -> Vec<DailyCollection> {
        let mut totals: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for entry in self.payments.values().flatten() {
            if entry.has_status("paid") {
                let total = totals.entry(entry.date).or_default();
                *total = total.saturating_add(entry.amount);
            }
        }

        (0..u64::from(days))
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|date| DailyCollection {
                date,
                collected: totals.get(&date).copied().unwrap_or_default(),
            })
            .collect()
    }

    /// Each deal's principal as a percentage of everything funded.
    pub fn distribution(&self) -> Vec<DealDistribution> {
        let total_funded = self
            .deals
            .iter()
            .fold(Decimal::ZERO, |acc, d| acc.saturating_add(Decimal::from(d.size)));
        self.deals
            .iter()
            .map(|deal| {
                let percent = Decimal::from(deal.size)
                    .saturating_mul(dec!(100))
                    .checked_div(total_funded)
                    .unwrap_or_default();
                DealDistribution {
                    id: deal.id.clone(),
                    name: deal.name.clone(),
                    size: deal.size,
                    percent: to_cents(percent),
                }
            })
            .collect()
    }

    pub fn snapshot(&self) -> LedgerSnapshot<'_> {
        LedgerSnapshot {
            users: &self.users,
            deals: &self.deals,
            payments: &self.payments,
            syndications: &self.syndications,
            summaries: self.deals.iter().map(|d| self.summarize(d)).collect(),
            distribution: self.distribution(),
            metrics: self.metrics(),
        }
    }
}
