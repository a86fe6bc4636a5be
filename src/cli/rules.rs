use std::path::Path;

use comfy_table::{Cell, Table};

use crate::cli::open_session;
use crate::db::{set_config, RULES_KEY};
use crate::error::{ReimburseError, Result};
use crate::fmt::{hours, money};
use crate::models::ReimbursementRule;
use crate::settings::RuleSettings;

fn print_rule(rule: &ReimbursementRule) {
    let mut table = Table::new();
    table.set_header(vec!["Allowance", "Hours", "Amount"]);
    table.add_row(vec![
        Cell::new("Dinner"),
        Cell::new(format!(">= {}", hours(rule.dinner_threshold))),
        Cell::new(money(rule.dinner_amount)),
    ]);
    table.add_row(vec![
        Cell::new("Night"),
        Cell::new(format!(">= {}", hours(rule.night_threshold))),
        Cell::new(money(rule.night_amount)),
    ]);
    table.add_row(vec![
        Cell::new("Taxi"),
        Cell::new(format!("> {}", hours(rule.taxi_threshold))),
        Cell::new("receipt"),
    ]);
    println!("Rules\n{table}");
}

pub fn show(config_path: &Path) -> Result<()> {
    let (session, _store) = open_session(config_path)?;
    print_rule(&session.rule());
    Ok(())
}

/// Changes applied on top of the rules in force.
#[derive(Debug, Default)]
pub struct RuleChanges {
    pub dinner_threshold: Option<f64>,
    pub dinner_amount: Option<f64>,
    pub night_threshold: Option<f64>,
    pub night_amount: Option<f64>,
    pub taxi_threshold: Option<f64>,
}

impl RuleChanges {
    pub fn apply(&self, rule: &ReimbursementRule) -> Result<ReimbursementRule> {
        let next = ReimbursementRule {
            dinner_threshold: self.dinner_threshold.unwrap_or(rule.dinner_threshold),
            dinner_amount: self.dinner_amount.unwrap_or(rule.dinner_amount),
            night_threshold: self.night_threshold.unwrap_or(rule.night_threshold),
            night_amount: self.night_amount.unwrap_or(rule.night_amount),
            taxi_threshold: self.taxi_threshold.unwrap_or(rule.taxi_threshold),
        };
        let values = [
            next.dinner_threshold,
            next.dinner_amount,
            next.night_threshold,
            next.night_amount,
            next.taxi_threshold,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ReimburseError::Config("rule values must be non-negative".to_string()));
        }
        if next.night_threshold < next.dinner_threshold {
            return Err(ReimburseError::Config(
                "night threshold must not be below the dinner threshold".to_string(),
            ));
        }
        Ok(next)
    }
}

pub fn set(config_path: &Path, changes: RuleChanges) -> Result<()> {
    let (session, store) = open_session(config_path)?;
    let next = changes.apply(&session.rule())?;
    let value = serde_json::to_value(RuleSettings::from_rule(&next))?;
    set_config(store.conn(), RULES_KEY, &value)?;
    println!("Saved rules to {}", session.config().db_path().display());
    print_rule(&next);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_unset_values() {
        let changes = RuleChanges {
            taxi_threshold: Some(10.5),
            ..RuleChanges::default()
        };
        let next = changes.apply(&ReimbursementRule::default()).unwrap();
        assert_eq!(next.taxi_threshold, 10.5);
        assert_eq!(next.dinner_amount, 18.0);
    }

    #[test]
    fn test_apply_rejects_inverted_thresholds() {
        let changes = RuleChanges {
            night_threshold: Some(9.0),
            ..RuleChanges::default()
        };
        assert!(changes.apply(&ReimbursementRule::default()).is_err());
        let negative = RuleChanges {
            dinner_amount: Some(-1.0),
            ..RuleChanges::default()
        };
        assert!(negative.apply(&ReimbursementRule::default()).is_err());
    }
}
