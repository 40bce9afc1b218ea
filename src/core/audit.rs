//! Periodic read-only audit
//!
//! This module provides the `AuditProcess`, which summarizes system state on a
//! fixed interval and flags unusually large transactions.
//!
//! An audit pass only reads through the [`PersistenceGateway`]. It may observe
//! state the engine is about to change, which is fine: the report is advisory.
//! A failed pass is logged and the next tick runs as usual.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::traits::PersistenceGateway;
use crate::types::{PaymentError, TransactionRecord};

const BANNER_WIDTH: usize = 60;

/// Audit configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    /// Time between passes
    pub interval: Duration,

    /// Transactions with an amount strictly above this are flagged
    pub suspicious_threshold: Decimal,

    /// How many of the newest transactions the report lists
    pub recent_limit: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            suspicious_threshold: Decimal::new(1_000_000, 2),
            recent_limit: 5,
        }
    }
}

/// Result of one audit pass
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub total_accounts: usize,
    pub active_accounts: usize,

    /// Sum of active account balances
    pub total_balance: Decimal,

    /// Number of records the pass looked at (bounded by the gateway)
    pub total_transactions: usize,

    /// Newest records, at most `recent_limit`
    pub recent: Vec<TransactionRecord>,

    /// Records above the threshold, newest first
    pub flagged: Vec<TransactionRecord>,

    pub suspicious_threshold: Decimal,
}

impl AuditReport {
    pub fn suspicious_activity(&self) -> bool {
        !self.flagged.is_empty()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(BANNER_WIDTH);

        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "AUDIT REPORT - {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;
        writeln!(f, "Total Accounts: {}", self.total_accounts)?;
        writeln!(f, "Active Accounts: {}", self.active_accounts)?;
        writeln!(f, "Total System Balance: ${:.2}", self.total_balance)?;
        writeln!(f)?;

        if self.recent.is_empty() {
            writeln!(f, "No transactions recorded.")?;
        } else {
            writeln!(f, "Total Transactions: {}", self.total_transactions)?;
            writeln!(f, "Recent Transactions (last {}):", self.recent.len())?;
            for record in &self.recent {
                writeln!(f, "  - {}", record.display_info())?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Security Check:")?;
        if self.suspicious_activity() {
            writeln!(f, "  Large transactions detected:")?;
            for record in &self.flagged {
                writeln!(
                    f,
                    "    - {}: ${:.2} (Account: {})",
                    record.kind, record.amount, record.account_number
                )?;
            }
        } else {
            writeln!(f, "  No suspicious activity detected.")?;
        }
        write!(f, "{}", rule)
    }
}

/// Read-only periodic auditor
#[derive(Clone)]
pub struct AuditProcess {
    gateway: Arc<dyn PersistenceGateway>,
    config: AuditConfig,
}

impl AuditProcess {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: AuditConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run a single audit pass
    ///
    /// # Errors
    ///
    /// Any gateway error; nothing is written either way.
    pub fn run_once(&self) -> Result<AuditReport, PaymentError> {
        let accounts = self.gateway.load_all_accounts()?;
        let (active_accounts, total_balance) = accounts
            .iter()
            .filter(|account| account.active)
            .try_fold((0, Decimal::ZERO), |(count, sum), account| {
                sum.checked_add(account.balance)
                    .map(|sum| (count + 1, sum))
                    .ok_or_else(|| {
                        PaymentError::arithmetic_overflow("audit total", &account.account_number)
                    })
            })?;

        let transactions = self.gateway.load_recent_transactions()?;
        let flagged = transactions
            .iter()
            .filter(|record| record.amount > self.config.suspicious_threshold)
            .cloned()
            .collect();
        let recent = transactions
            .iter()
            .take(self.config.recent_limit)
            .cloned()
            .collect();

        Ok(AuditReport {
            generated_at: Utc::now(),
            total_accounts: accounts.len(),
            active_accounts,
            total_balance,
            total_transactions: transactions.len(),
            recent,
            flagged,
            suspicious_threshold: self.config.suspicious_threshold,
        })
    }

    /// Run passes on the configured interval until `token` is cancelled
    ///
    /// The first pass runs immediately. Must be called from within a tokio runtime.
    pub fn spawn(self, token: CancellationToken) -> AuditHandle {
        let (sender, reports) = watch::channel(None);
        let task_token = token.clone();
        let handle = tokio::spawn(async move { self.run(task_token, sender).await });

        AuditHandle {
            token,
            handle,
            reports,
        }
    }

    async fn run(
        self,
        token: CancellationToken,
        sender: watch::Sender<Option<AuditReport>>,
    ) -> u64 {
        let period = self.config.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("Audit started with {:?} interval", period);

        let mut passes = 0;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            passes += 1;
            match self.run_once() {
                Ok(report) => {
                    log::info!("\n{}", report);
                    for record in &report.flagged {
                        log::warn!(
                            "Suspicious {} of {:.2} on account {}",
                            record.kind,
                            record.amount,
                            record.account_number
                        );
                    }
                    sender.send_replace(Some(report));
                }
                Err(error) => log::error!("Audit failed: {}", error),
            }
        }

        log::info!("Audit stopped after {} pass(es)", passes);
        passes
    }
}

/// Handle to a running audit task
pub struct AuditHandle {
    token: CancellationToken,
    handle: JoinHandle<u64>,
    reports: watch::Receiver<Option<AuditReport>>,
}

impl AuditHandle {
    /// The most recent successful report, if any
    pub fn latest(&self) -> Option<AuditReport> {
        self.reports.borrow().clone()
    }

    /// Receiver that is notified on every successful pass
    pub fn subscribe(&self) -> watch::Receiver<Option<AuditReport>> {
        self.reports.clone()
    }

    /// Cancel the task and wait for it; returns the number of passes run
    pub async fn stop(self) -> u64 {
        self.token.cancel();
        self.handle.await.unwrap_or_else(|error| {
            log::error!("Audit task ended abnormally: {}", error);
            0
        })
    }
}
