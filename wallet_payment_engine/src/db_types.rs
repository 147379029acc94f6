use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;
pub use wpg_common::{Money, DEFAULT_CURRENCY_CODE, MONEY_EPSILON};

/// Platform-wide commission percentage used when an owner account has no configured rate.
pub const DEFAULT_COMMISSION_RATE: f64 = 15.0;

/// Service tag on the one-time ledger entry that reconciles a legacy stored balance into the ledger.
pub const MIGRATION_SERVICE_NAME: &str = "Balance Migration";

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------    EntryDirection    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EntryDirection {
    Credit,
    Debit,
}

impl Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Credit => write!(f, "Credit"),
            EntryDirection::Debit => write!(f, "Debit"),
        }
    }
}

impl FromStr for EntryDirection {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit" => Ok(Self::Credit),
            "Debit" => Ok(Self::Debit),
            s => Err(ConversionError("entry direction", s.to_string())),
        }
    }
}

//--------------------------------------      LedgerEntry     --------------------------------------------------------
/// An immutable, signed record of value movement for one account.
///
/// Entries are never updated or deleted; the authoritative balance of an account is always
/// `sum(Credit) - sum(Debit)` over its entries. `resulting_balance` is a point-in-time snapshot kept for statements
/// and audits, and is informational only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub amount: Money,
    pub direction: EntryDirection,
    pub currency: String,
    /// What the movement was for, e.g. "Wallet Funding", "School Fees".
    pub service_name: String,
    /// Reference of the external transaction that caused this entry, if any.
    pub external_ref: Option<String>,
    /// Optional semester/session context for fee-type entries.
    pub period_tag: Option<String>,
    pub resulting_balance: Money,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The signed value of this entry as it contributes to the account balance.
    pub fn signed_amount(&self) -> Money {
        match self.direction {
            EntryDirection::Credit => self.amount,
            EntryDirection::Debit => -self.amount,
        }
    }
}

//--------------------------------------    NewLedgerEntry    --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub amount: Money,
    pub direction: EntryDirection,
    pub currency: String,
    pub service_name: String,
    pub external_ref: Option<String>,
    pub period_tag: Option<String>,
}

impl NewLedgerEntry {
    pub fn credit(account_id: i64, amount: Money, currency: &str, service_name: &str) -> Self {
        Self {
            account_id,
            amount,
            direction: EntryDirection::Credit,
            currency: currency.to_string(),
            service_name: service_name.to_string(),
            external_ref: None,
            period_tag: None,
        }
    }

    pub fn debit(account_id: i64, amount: Money, currency: &str, service_name: &str) -> Self {
        Self { direction: EntryDirection::Debit, ..Self::credit(account_id, amount, currency, service_name) }
    }

    pub fn with_external_ref<S: Into<String>>(mut self, external_ref: S) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    pub fn with_period_tag<S: Into<String>>(mut self, period_tag: S) -> Self {
        self.period_tag = Some(period_tag.into());
        self
    }
}

//--------------------------------------   TransactionStatus  --------------------------------------------------------
/// Lifecycle status shared by canonical gateway transactions and our own payment records.
///
/// Gateway events only ever report `Successful`, `Failed`, `Pending` or `Cancelled`; `Processing` exists for the
/// reconciliation window between first sighting of a reference and its terminal state. `Successful` and `Failed` are
/// terminal: a record never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Processing,
    Successful,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Successful | TransactionStatus::Failed)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Processing => "Processing",
            TransactionStatus::Successful => "Successful",
            TransactionStatus::Failed => "Failed",
            TransactionStatus::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Successful" => Ok(Self::Successful),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError("transaction status", s.to_string())),
        }
    }
}

//--------------------------------------      PaymentType     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentType {
    WalletFunding,
    SchoolFees,
    MarketplacePurchase,
    SubscriptionRenewal,
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentType::WalletFunding => "WalletFunding",
            PaymentType::SchoolFees => "SchoolFees",
            PaymentType::MarketplacePurchase => "MarketplacePurchase",
            PaymentType::SubscriptionRenewal => "SubscriptionRenewal",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WalletFunding" => Ok(Self::WalletFunding),
            "SchoolFees" => Ok(Self::SchoolFees),
            "MarketplacePurchase" => Ok(Self::MarketplacePurchase),
            "SubscriptionRenewal" => Ok(Self::SubscriptionRenewal),
            s => Err(ConversionError("payment type", s.to_string())),
        }
    }
}

//--------------------------------------     WalletAccount    --------------------------------------------------------
/// An account holding a wallet. Students, tutors and organizations all get one.
///
/// `cached_balance` is a denormalized convenience value and is **never** authoritative; it is re-derivable from the
/// ledger at any time and is resynchronized transactionally whenever the ledger is written or materialized. Until
/// `legacy_migrated` is set, `cached_balance` still holds the pre-ledger stored balance, and the first balance
/// materialization reconciles the difference into the ledger exactly once.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletAccount {
    pub id: i64,
    pub customer_id: String,
    pub currency: String,
    pub cached_balance: Money,
    pub legacy_migrated: bool,
    /// Owner-specific marketplace commission percentage. `None` falls back to [`DEFAULT_COMMISSION_RATE`].
    pub commission_rate: Option<f64>,
    /// True for the platform's own first-party account: its items keep the full gross as platform share.
    pub is_platform: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    pub fn effective_commission_rate(&self) -> f64 {
        self.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE)
    }
}

//--------------------------------------  ExternalTransaction --------------------------------------------------------
/// The canonical, transport-independent form of a gateway event, as handed to the reconciliation coordinator.
///
/// Produced identically by the webhook (push) and verification (pull) paths so that the coordinator never branches on
/// where an event came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTransaction {
    /// Client-supplied transaction reference; the primary idempotency key.
    pub reference: Option<String>,
    /// Gateway-assigned transaction id; the secondary idempotency key.
    pub gateway_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    pub raw_payload: Value,
}

impl ExternalTransaction {
    /// The best available identifier for logging.
    pub fn key(&self) -> &str {
        self.reference.as_deref().or(self.gateway_id.as_deref()).unwrap_or("<unidentified>")
    }
}

//--------------------------------------     PaymentRecord    --------------------------------------------------------
/// Our durable record of a processed (or attempted) external transaction. This record **is** the idempotency guard:
/// `reference` and `gateway_id` are unique, a record transitions to `Successful` or `Failed` exactly once, and every
/// later sighting of the same keys is a read, never a second ledger write.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub reference: String,
    pub gateway_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: TransactionStatus,
    pub payment_type: PaymentType,
    pub account_id: Option<i64>,
    /// Semester/session context for fee payments, captured at initiation.
    pub period_tag: Option<String>,
    /// Subscription being renewed, for renewal payments.
    pub subscription_id: Option<i64>,
    /// Serialized purchase details for marketplace payments, captured at initiation so that a webhook arriving first
    /// can still settle the purchase.
    pub purchase_json: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub verification_attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn purchase(&self) -> Option<NewPurchase> {
        self.purchase_json.as_deref().and_then(|json| serde_json::from_str(json).ok())
    }
}

//--------------------------------------   NewPaymentRecord   --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub reference: String,
    pub amount: Money,
    pub currency: String,
    pub payment_type: PaymentType,
    pub account_id: i64,
    pub period_tag: Option<String>,
    pub subscription_id: Option<i64>,
    pub purchase: Option<NewPurchase>,
}

impl NewPaymentRecord {
    pub fn new(reference: &str, amount: Money, currency: &str, payment_type: PaymentType, account_id: i64) -> Self {
        Self {
            reference: reference.to_string(),
            amount,
            currency: currency.to_string(),
            payment_type,
            account_id,
            period_tag: None,
            subscription_id: None,
            purchase: None,
        }
    }

    pub fn with_period_tag<S: Into<String>>(mut self, period_tag: S) -> Self {
        self.period_tag = Some(period_tag.into());
        self
    }

    pub fn with_subscription(mut self, subscription_id: i64) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    pub fn with_purchase(mut self, purchase: NewPurchase) -> Self {
        self.purchase = Some(purchase);
        self
    }
}

//--------------------------------------     RevenueSplit     --------------------------------------------------------
/// Commission split of a completed purchase. Rounding is applied once, to the platform share, so that
/// `platform_share + owner_share == gross_amount` holds exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub gross_amount: Money,
    pub commission_rate: f64,
    pub platform_share: Money,
    pub owner_share: Money,
}

impl RevenueSplit {
    pub fn calculate(gross_amount: Money, commission_rate: f64) -> Self {
        let platform_share = Money::from_minor_units_f64(gross_amount.value() as f64 * commission_rate / 100.0);
        let owner_share = gross_amount - platform_share;
        Self { gross_amount, commission_rate, platform_share, owner_share }
    }

    /// First-party items keep the full gross as platform share; no owner credit is ever written for them.
    pub fn platform_owned(gross_amount: Money) -> Self {
        Self { gross_amount, commission_rate: 100.0, platform_share: gross_amount, owner_share: Money::from(0) }
    }
}

//--------------------------------------    CommissionRecord  --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: i64,
    pub purchase_ref: String,
    pub owner_account_id: Option<i64>,
    pub gross_amount: Money,
    pub commission_rate: f64,
    pub platform_share: Money,
    pub owner_share: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      NewPurchase     --------------------------------------------------------
/// A marketplace purchase to be settled: either funded by a gateway transaction (inside a reconciliation) or spent
/// directly from an existing wallet balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchase {
    pub buyer_account_id: i64,
    /// `None` for first-party (platform-owned) catalog items.
    pub owner_account_id: Option<i64>,
    pub gross_amount: Money,
    pub currency: String,
    /// Human-readable description, used as the ledger `service_name`.
    pub item_description: String,
    /// Unique reference for this purchase; links the ledger entries and the commission record.
    pub reference: String,
}

//-------------------------------------- SubscriptionStatus   --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionStatus::Active => "Active",
            SubscriptionStatus::Expired => "Expired",
            SubscriptionStatus::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Expired" => Ok(Self::Expired),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError("subscription status", s.to_string())),
        }
    }
}

//--------------------------------------     Subscription     --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub account_id: i64,
    pub community_id: String,
    pub amount: Money,
    pub currency: String,
    pub period_days: i64,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    pub next_billing_date: DateTime<Utc>,
    pub notice_7d_sent: bool,
    pub notice_3d_sent: bool,
    pub notice_1d_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     NoticeWindow     --------------------------------------------------------
/// Staged expiration notice windows. Each window has its own "sent" flag on the subscription, so exactly one notice
/// goes out per window no matter how often the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeWindow {
    SevenDays,
    ThreeDays,
    OneDay,
}

impl NoticeWindow {
    pub const ALL: [NoticeWindow; 3] = [NoticeWindow::SevenDays, NoticeWindow::ThreeDays, NoticeWindow::OneDay];

    pub fn days(&self) -> i64 {
        match self {
            NoticeWindow::SevenDays => 7,
            NoticeWindow::ThreeDays => 3,
            NoticeWindow::OneDay => 1,
        }
    }

    /// Name of the flag column tracking this window.
    pub fn flag_column(&self) -> &'static str {
        match self {
            NoticeWindow::SevenDays => "notice_7d_sent",
            NoticeWindow::ThreeDays => "notice_3d_sent",
            NoticeWindow::OneDay => "notice_1d_sent",
        }
    }
}

impl Display for NoticeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} day(s)", self.days())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn revenue_split_is_exact_for_any_rate() {
        let split = RevenueSplit::calculate(Money::from(100_000), 15.0);
        assert_eq!(split.platform_share, Money::from(15_000));
        assert_eq!(split.owner_share, Money::from(85_000));
        assert_eq!(split.platform_share + split.owner_share, split.gross_amount);

        // An awkward rate: 12.5% of 10.01 is 1.25125 -> platform 1.25, owner 8.76
        let split = RevenueSplit::calculate(Money::from(1001), 12.5);
        assert_eq!(split.platform_share, Money::from(125));
        assert_eq!(split.owner_share, Money::from(876));
        assert_eq!(split.platform_share + split.owner_share, split.gross_amount);

        // Half-away-from-zero on the platform share: 10% of 0.05 is 0.5 minor units -> 0.01
        let split = RevenueSplit::calculate(Money::from(5), 10.0);
        assert_eq!(split.platform_share, Money::from(1));
        assert_eq!(split.owner_share, Money::from(4));
    }

    #[test]
    fn platform_owned_split_keeps_everything() {
        let split = RevenueSplit::platform_owned(Money::from_major(1000));
        assert_eq!(split.platform_share, Money::from_major(1000));
        assert_eq!(split.owner_share, Money::from(0));
    }

    #[test]
    fn signed_amount_follows_direction() {
        let mut entry = LedgerEntry {
            id: 1,
            account_id: 1,
            amount: Money::from(500),
            direction: EntryDirection::Credit,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            service_name: "Wallet Funding".to_string(),
            external_ref: None,
            period_tag: None,
            resulting_balance: Money::from(500),
            occurred_at: Utc::now(),
        };
        assert_eq!(entry.signed_amount(), Money::from(500));
        entry.direction = EntryDirection::Debit;
        assert_eq!(entry.signed_amount(), Money::from(-500));
    }

    #[test]
    fn db_enums_round_trip_through_strings() {
        for status in
            [TransactionStatus::Pending, TransactionStatus::Processing, TransactionStatus::Successful, TransactionStatus::Failed, TransactionStatus::Cancelled]
        {
            assert_eq!(status.to_string().parse::<TransactionStatus>().unwrap(), status);
        }
        for pt in [
            PaymentType::WalletFunding,
            PaymentType::SchoolFees,
            PaymentType::MarketplacePurchase,
            PaymentType::SubscriptionRenewal,
        ] {
            assert_eq!(pt.to_string().parse::<PaymentType>().unwrap(), pt);
        }
    }
}
