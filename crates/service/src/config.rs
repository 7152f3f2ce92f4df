//! Bank settings.
//!
//! Provisioning defaults and the fee schedule are plain values handed to the
//! service at construction. Nothing in the engine reads process globals.

use std::str::FromStr;

use anyhow::{Context, ensure};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kidbank_ledger::{AccountTerms, AccountType, FeeSchedule};

/// Terms new accounts are opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningSettings {
    pub checking_interest_rate: Decimal,
    pub savings_interest_rate: Decimal,
    pub college_savings_interest_rate: Decimal,
    pub penalty_interest_rate: Decimal,
    pub cd_penalty_rate: Decimal,
    /// `None` leaves savings unrestricted.
    pub savings_lockup_period_days: Option<u32>,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            checking_interest_rate: Decimal::ZERO,
            savings_interest_rate: Decimal::new(1, 2),
            college_savings_interest_rate: Decimal::new(1, 2),
            penalty_interest_rate: Decimal::new(2, 2),
            cd_penalty_rate: Decimal::new(1, 1),
            savings_lockup_period_days: Some(30),
        }
    }
}

impl ProvisioningSettings {
    pub fn terms_for(&self, account_type: AccountType) -> AccountTerms {
        let interest_rate = match account_type {
            AccountType::Checking => self.checking_interest_rate,
            AccountType::Savings => self.savings_interest_rate,
            AccountType::CollegeSavings => self.college_savings_interest_rate,
        };
        AccountTerms {
            interest_rate,
            penalty_interest_rate: self.penalty_interest_rate,
            cd_penalty_rate: self.cd_penalty_rate,
            lockup_period_days: self.savings_lockup_period_days,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankSettings {
    pub provisioning: ProvisioningSettings,
    pub fees: FeeSchedule,
}

impl BankSettings {
    /// Defaults overridden by `KIDBANK_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON settings document; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let settings: Self = serde_json::from_str(raw).context("invalid settings document")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut settings = Self::default();
        let p = &mut settings.provisioning;
        override_with(&lookup, "KIDBANK_CHECKING_INTEREST_RATE", &mut p.checking_interest_rate)?;
        override_with(&lookup, "KIDBANK_SAVINGS_INTEREST_RATE", &mut p.savings_interest_rate)?;
        override_with(
            &lookup,
            "KIDBANK_COLLEGE_SAVINGS_INTEREST_RATE",
            &mut p.college_savings_interest_rate,
        )?;
        override_with(&lookup, "KIDBANK_PENALTY_INTEREST_RATE", &mut p.penalty_interest_rate)?;
        override_with(&lookup, "KIDBANK_CD_PENALTY_RATE", &mut p.cd_penalty_rate)?;
        if let Some(raw) = lookup("KIDBANK_SAVINGS_LOCKUP_DAYS") {
            p.savings_lockup_period_days = match raw.trim() {
                "" | "none" | "0" => None,
                days => Some(
                    days.parse()
                        .with_context(|| format!("KIDBANK_SAVINGS_LOCKUP_DAYS: invalid value '{days}'"))?,
                ),
            };
        }

        let f = &mut settings.fees;
        override_with(&lookup, "KIDBANK_SERVICE_FEE_AMOUNT", &mut f.service_fee_amount)?;
        override_with(&lookup, "KIDBANK_SERVICE_FEE_IS_PERCENTAGE", &mut f.service_fee_is_percentage)?;
        override_with(&lookup, "KIDBANK_OVERDRAFT_FEE_AMOUNT", &mut f.overdraft_fee_amount)?;
        override_with(
            &lookup,
            "KIDBANK_OVERDRAFT_FEE_IS_PERCENTAGE",
            &mut f.overdraft_fee_is_percentage,
        )?;
        override_with(&lookup, "KIDBANK_OVERDRAFT_FEE_DAILY", &mut f.overdraft_fee_daily)?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let p = &self.provisioning;
        for (name, rate) in [
            ("checking interest rate", p.checking_interest_rate),
            ("savings interest rate", p.savings_interest_rate),
            ("college savings interest rate", p.college_savings_interest_rate),
            ("penalty interest rate", p.penalty_interest_rate),
            ("cd penalty rate", p.cd_penalty_rate),
            ("service fee", self.fees.service_fee_amount),
            ("overdraft fee", self.fees.overdraft_fee_amount),
        ] {
            ensure!(rate >= Decimal::ZERO, "{name} cannot be negative");
        }
        Ok(())
    }
}

fn override_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("{key}: invalid value '{raw}'"))?;
    }
    Ok(())
}
