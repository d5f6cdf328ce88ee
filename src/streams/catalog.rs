//! The Visma.net Financials stream set
//!
//! Endpoint paths, key fields, and per-stream request customization for
//! every resource this extractor covers.

use super::{record_field, Catalog, CrossEnumeration, StreamSpec};
use crate::error::{Error, Result};
use crate::params::{Context, ParamScope, RequestParams, MODIFIED_SINCE_CONDITION_PARAM, MODIFIED_SINCE_PARAM};
use crate::partition::{PartitionSpec, FINANCIAL_YEAR_KEY, PERIOD_KEY};

/// Replication key shared by most streams
const LAST_MODIFIED: &str = "lastModifiedDateTime";

/// Related entities expanded on the branch endpoint
const BRANCH_EXPANSIONS: &[&str] = &[
    "expandAddress",
    "expandContact",
    "expandCurrency",
    "expandVatZone",
    "expandLedger",
    "expandIndustryCode",
    "expandDeliveryAddress",
    "expandDeliveryContact",
    "expandDefaultCountry",
    "expandBankSettings",
];

/// Build the full Visma.net stream catalog
pub fn visma_catalog() -> Catalog {
    let specs = vec![
        StreamSpec::new("accounts", "/v1/account", &["accountID"]).replicate_on(LAST_MODIFIED),
        StreamSpec::new("branches", "/v1/branch", &["branchId"])
            .replicate_on(LAST_MODIFIED)
            .with_params(branches_params)
            .with_child_context(branch_child_context),
        StreamSpec::new("budgets", "/v1/budget", &["financialYear"])
            .replicate_on(LAST_MODIFIED)
            .child_of("branches")
            .partitioned_by(PartitionSpec::FinancialYears)
            .crossed_with(CrossEnumeration {
                stream: "ledgers",
                value_field: "internalId",
                partition_key: "ledger",
            })
            .with_params(budgets_params),
        StreamSpec::new("departments", "/v1/department", &["departmentId"])
            .replicate_on(LAST_MODIFIED),
        StreamSpec::new(
            "general_ledger_transactions",
            "/v1/GeneralLedgerTransactions",
            &["batchNumber", "lineNumber"],
        )
        .replicate_on(LAST_MODIFIED)
        .child_of("branches")
        .partitioned_by(PartitionSpec::MonthlyPeriods)
        .with_params(general_ledger_params),
        StreamSpec::new("journal_transactions", "/v2/journaltransaction", &["batchNumber"])
            .replicate_on(LAST_MODIFIED)
            .partitioned_by(PartitionSpec::MonthlyPeriods)
            .with_params(journal_transaction_params),
        StreamSpec::new("ledgers", "/v1/ledger", &["internalId"]).replicate_on(LAST_MODIFIED),
        StreamSpec::new("projects", "/v1/project", &["projectID"]).replicate_on(LAST_MODIFIED),
        StreamSpec::new(
            "project_account_groups",
            "/v1/projectaccountgroup",
            &["accountGroupId"],
        )
        .replicate_on("accountGroupId"),
        StreamSpec::new("project_budgets", "/v1/projectbudget", &["projectID"])
            .replicate_on("projectID"),
        StreamSpec::new("subaccounts", "/v1/subaccount", &["subaccountId"])
            .replicate_on(LAST_MODIFIED),
        StreamSpec::new("suppliers", "/v1/supplier", &["internalId"]).replicate_on(LAST_MODIFIED),
    ];

    Catalog::from_specs(specs).expect("built-in catalog is valid")
}

// ============================================================================
// Parameter overrides
// ============================================================================

/// Branches are fetched in one unpaginated request with every related
/// entity expanded.
fn branches_params(params: &mut RequestParams, _scope: &ParamScope<'_>) -> Result<()> {
    params.clear();
    for flag in BRANCH_EXPANSIONS {
        params.set(*flag, "true");
    }
    Ok(())
}

/// Budgets are keyed by (branch, ledger, financial year); the endpoint has
/// no pagination or date filter.
fn budgets_params(params: &mut RequestParams, scope: &ParamScope<'_>) -> Result<()> {
    params.clear();
    params.set("branch", scope.require_context("branchNumber")?);
    params.set("ledger", scope.require_partition_value("ledger")?);
    params.set("financialYear", scope.require_partition_value(FINANCIAL_YEAR_KEY)?);
    Ok(())
}

/// General ledger transactions filter by ledger and a bounded period range
/// instead of the generic date filter.
fn general_ledger_params(params: &mut RequestParams, scope: &ParamScope<'_>) -> Result<()> {
    params.remove(MODIFIED_SINCE_PARAM);
    params.remove(MODIFIED_SINCE_CONDITION_PARAM);
    params.set("ledger", scope.require_context("ledgerId")?);
    let period = scope.require_partition_value(PERIOD_KEY)?;
    params.set("fromPeriod", period);
    params.set("toPeriod", period);
    Ok(())
}

/// Journal transactions filter by a single period id
fn journal_transaction_params(params: &mut RequestParams, scope: &ParamScope<'_>) -> Result<()> {
    params.remove(MODIFIED_SINCE_PARAM);
    params.remove(MODIFIED_SINCE_CONDITION_PARAM);
    params.set("periodId", scope.require_partition_value(PERIOD_KEY)?);
    Ok(())
}

// ============================================================================
// Child context projections
// ============================================================================

/// A branch record hands its number and ledger id to its children
fn branch_child_context(record: &crate::types::OutputRecord) -> Result<Context> {
    let number = record_field(record, "number")
        .ok_or_else(|| Error::extraction("branches", "record is missing 'number'"))?;
    let ledger_id = record_field(record, "ledger.id")
        .ok_or_else(|| Error::extraction("branches", "record is missing 'ledger.id'"))?;
    Ok(Context::from_pairs([
        ("branchNumber", number),
        ("ledgerId", ledger_id),
    ]))
}
