//! DataFrame search
//!
//! Criteria-based and expression-based row filtering over loaded datasets.
//! Both entry points are forgiving: an unknown column, a malformed
//! expression or a type mismatch yields an empty frame with the input
//! schema rather than an error, so interactive exploration never aborts.

use polars::prelude::*;
use tracing::warn;

/// A single column filter
#[derive(Debug, Clone, PartialEq)]
pub enum SearchCriterion {
    /// Inclusive numeric range
    Range { min: f64, max: f64 },
    /// Exact numeric match
    Equals(f64),
    /// Exact string match
    EqualsText(String),
}

/// Criteria and query search over DataFrames
pub struct DataSearcher;

impl DataSearcher {
    /// Filter rows matching every criterion (AND-composed). Any failure
    /// returns an empty frame with the input schema.
    pub fn search_by_criteria(df: &DataFrame, criteria: &[(String, SearchCriterion)]) -> DataFrame {
        match Self::try_search(df, criteria) {
            Ok(filtered) => filtered,
            Err(e) => {
                warn!(error = %e, "criteria search failed, returning empty frame");
                df.clear()
            }
        }
    }

    /// Filter rows matching a query expression of the form
    /// `<column> <op> <number>` with ops `> >= < <= == !=`, multiple clauses
    /// joined with `&`. Any parse or evaluation failure returns an empty
    /// frame with the input schema.
    pub fn query(df: &DataFrame, expr: &str) -> DataFrame {
        let criteria = match Self::parse_query(expr) {
            Some(criteria) => criteria,
            None => {
                warn!(expr, "unparseable query expression, returning empty frame");
                return df.clear();
            }
        };
        match Self::try_query(df, &criteria) {
            Ok(filtered) => filtered,
            Err(e) => {
                warn!(expr, error = %e, "query evaluation failed, returning empty frame");
                df.clear()
            }
        }
    }

    fn try_search(
        df: &DataFrame,
        criteria: &[(String, SearchCriterion)],
    ) -> PolarsResult<DataFrame> {
        let mut mask = vec![true; df.height()];
        for (column, criterion) in criteria {
            match criterion {
                SearchCriterion::Range { min, max } => {
                    let values = numeric_column(df, column)?;
                    for (keep, v) in mask.iter_mut().zip(values.iter()) {
                        *keep &= matches!(v, Some(v) if *v >= *min && *v <= *max);
                    }
                }
                SearchCriterion::Equals(target) => {
                    let values = numeric_column(df, column)?;
                    for (keep, v) in mask.iter_mut().zip(values.iter()) {
                        *keep &= matches!(v, Some(v) if *v == *target);
                    }
                }
                SearchCriterion::EqualsText(target) => {
                    let series = df.column(column)?.as_materialized_series().clone();
                    let strings = series.str()?;
                    for (keep, v) in mask.iter_mut().zip(strings.into_iter()) {
                        *keep &= v == Some(target.as_str());
                    }
                }
            }
        }
        df.filter(&BooleanChunked::from_slice("mask".into(), &mask))
    }

    fn try_query(df: &DataFrame, clauses: &[QueryClause]) -> PolarsResult<DataFrame> {
        let mut mask = vec![true; df.height()];
        for clause in clauses {
            let values = numeric_column(df, &clause.column)?;
            for (keep, v) in mask.iter_mut().zip(values.iter()) {
                let hit = match v {
                    Some(v) => match clause.op {
                        QueryOp::Gt => *v > clause.value,
                        QueryOp::Ge => *v >= clause.value,
                        QueryOp::Lt => *v < clause.value,
                        QueryOp::Le => *v <= clause.value,
                        QueryOp::Eq => *v == clause.value,
                        QueryOp::Ne => *v != clause.value,
                    },
                    None => false,
                };
                *keep &= hit;
            }
        }
        df.filter(&BooleanChunked::from_slice("mask".into(), &mask))
    }

    fn parse_query(expr: &str) -> Option<Vec<QueryClause>> {
        let mut clauses = Vec::new();
        for raw in expr.split('&') {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            if tokens.len() != 3 {
                return None;
            }
            let op = match tokens[1] {
                ">" => QueryOp::Gt,
                ">=" => QueryOp::Ge,
                "<" => QueryOp::Lt,
                "<=" => QueryOp::Le,
                "==" => QueryOp::Eq,
                "!=" => QueryOp::Ne,
                _ => return None,
            };
            let value: f64 = tokens[2].parse().ok()?;
            clauses.push(QueryClause {
                column: tokens[0].to_string(),
                op,
                value,
            });
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum QueryOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

#[derive(Debug, Clone)]
struct QueryClause {
    column: String,
    op: QueryOp,
    value: f64,
}

fn numeric_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}
