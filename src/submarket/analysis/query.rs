//! Structured analysis requests, evaluated locally over the report tables
//!
//! The analyst model only picks a plan. Rows never leave the process; the
//! plan runs here against the full tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::Path;

use super::chart::{render_chart, ChartData};
use super::{AnalysisResponse, AnalysisTables};
use crate::submarket::processors::table::{number, round2};
use crate::submarket::state::Record;

/// Rows returned by one table request at most
pub const MAX_TABLE_ROWS: usize = 50;

const DEFAULT_BINS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Keep rows whose `column` compares to `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: Comparison,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Count,
    Sum,
    Mean,
    Median,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Scatter,
    Histogram,
}

/// What the analyst model asks to compute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisPlan {
    Table {
        table: String,
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default)]
        filters: Vec<Filter>,
        #[serde(default)]
        sort: Option<SortKey>,
        #[serde(default)]
        limit: Option<usize>,
    },
    Aggregate {
        table: String,
        function: Aggregate,
        /// Optional for `count`, which then counts rows
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        filters: Vec<Filter>,
    },
    Chart {
        table: String,
        chart: ChartKind,
        x: String,
        /// Required for scatter charts
        #[serde(default)]
        y: Option<String>,
        #[serde(default)]
        bins: Option<usize>,
        #[serde(default)]
        filters: Vec<Filter>,
    },
    /// A direct answer that needs no computation
    String { value: String },
    Error { value: String },
}

impl AnalysisPlan {
    /// Run the plan. Bad requests come back as an error answer, never a panic.
    pub fn execute(&self, tables: &AnalysisTables, chart_dir: &Path) -> AnalysisResponse {
        self.evaluate(tables, chart_dir)
            .unwrap_or_else(AnalysisResponse::Error)
    }

    fn evaluate(
        &self,
        tables: &AnalysisTables,
        chart_dir: &Path,
    ) -> Result<AnalysisResponse, String> {
        match self {
            AnalysisPlan::Table {
                table,
                columns,
                filters,
                sort,
                limit,
            } => {
                let mut rows = select(tables, table, filters)?;
                check_columns(table, &rows, columns.iter())?;
                if let Some(key) = sort {
                    check_columns(table, &rows, [&key.column])?;
                    rows.sort_by(|a, b| {
                        let order = compare_cells(cell(a, &key.column), cell(b, &key.column));
                        if key.descending {
                            order.reverse()
                        } else {
                            order
                        }
                    });
                }
                let take = limit.unwrap_or(MAX_TABLE_ROWS).min(MAX_TABLE_ROWS);
                let projected = rows
                    .into_iter()
                    .take(take)
                    .map(|row| project(row, columns))
                    .collect();
                Ok(AnalysisResponse::Table(projected))
            }
            AnalysisPlan::Aggregate {
                table,
                function,
                column,
                filters,
            } => {
                let rows = select(tables, table, filters)?;
                let Some(column) = column else {
                    return match function {
                        Aggregate::Count => Ok(AnalysisResponse::Number(rows.len() as f64)),
                        _ => Err(format!("{:?} needs a column", function).to_lowercase()),
                    };
                };
                check_columns(table, &rows, [column])?;
                let mut values: Vec<f64> = rows.iter().filter_map(|r| number(r, column)).collect();
                if *function == Aggregate::Count {
                    return Ok(AnalysisResponse::Number(values.len() as f64));
                }
                if values.is_empty() {
                    return Err(format!("{}.{} has no numeric values", table, column));
                }
                values.sort_by(f64::total_cmp);
                let value = round2(aggregate(*function, &values));
                Ok(AnalysisResponse::Number(value))
            }
            AnalysisPlan::Chart {
                table,
                chart,
                x,
                y,
                bins,
                filters,
            } => {
                let rows = select(tables, table, filters)?;
                check_columns(table, &rows, [x].into_iter().chain(y.as_ref()))?;
                let data = match (chart, y) {
                    (ChartKind::Scatter, Some(y)) => ChartData::Scatter(
                        rows.iter()
                            .filter_map(|r| Some((number(r, x)?, number(r, y)?)))
                            .collect(),
                    ),
                    (ChartKind::Scatter, None) => {
                        return Err("a scatter chart needs both x and y".to_string())
                    }
                    (ChartKind::Histogram, _) => {
                        let values: Vec<f64> = rows.iter().filter_map(|r| number(r, x)).collect();
                        ChartData::histogram(&values, bins.unwrap_or(DEFAULT_BINS))
                    }
                };
                if data.is_empty() {
                    return Err(format!("{} has no numeric values to chart", table));
                }
                let path = render_chart(&data, chart_dir).map_err(|e| e.to_string())?;
                Ok(AnalysisResponse::Chart(path.display().to_string()))
            }
            AnalysisPlan::String { value } => Ok(AnalysisResponse::String(value.clone())),
            AnalysisPlan::Error { value } => Ok(AnalysisResponse::Error(value.clone())),
        }
    }
}

fn select(tables: &AnalysisTables, table: &str, filters: &[Filter]) -> Result<Vec<Record>, String> {
    let rows = tables
        .get(table)
        .ok_or_else(|| format!("unknown table '{}'", table))?;
    check_columns(table, rows, filters.iter().map(|f| &f.column))?;
    Ok(rows
        .iter()
        .filter(|row| filters.iter().all(|f| f.matches(row)))
        .cloned()
        .collect())
}

/// Column names are checked against the first row; processed tables share one schema
fn check_columns<'a>(
    table: &str,
    rows: &[Record],
    columns: impl IntoIterator<Item = &'a String>,
) -> Result<(), String> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    let missing = columns
        .into_iter()
        .find(|c| !first.contains_key(c.as_str()));
    match missing {
        Some(missing) => Err(format!("unknown column '{}' in table '{}'", missing, table)),
        None => Ok(()),
    }
}

fn project(row: Record, columns: &[String]) -> Record {
    if columns.is_empty() {
        return row;
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

impl Filter {
    fn matches(&self, row: &Record) -> bool {
        let cell = cell(row, &self.column);
        match (cell.as_f64(), self.value.as_f64()) {
            (Some(left), Some(right)) => {
                let order = left.total_cmp(&right);
                match self.op {
                    Comparison::Eq => order == Ordering::Equal,
                    Comparison::Ne => order != Ordering::Equal,
                    Comparison::Lt => order == Ordering::Less,
                    Comparison::Le => order != Ordering::Greater,
                    Comparison::Gt => order == Ordering::Greater,
                    Comparison::Ge => order != Ordering::Less,
                }
            }
            // Non-numeric cells only support equality
            _ => match self.op {
                Comparison::Eq => cell == &self.value,
                Comparison::Ne => cell != &self.value,
                _ => false,
            },
        }
    }
}

fn cell<'a>(row: &'a Record, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

/// Numbers before strings before nulls; nulls always sort last
fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.to_string().cmp(&b.to_string()),
        },
    }
}

/// `sorted` is ascending and non-empty
fn aggregate(function: Aggregate, sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match function {
        Aggregate::Count => n as f64,
        Aggregate::Sum => sorted.iter().sum(),
        Aggregate::Mean => sorted.iter().sum::<f64>() / n as f64,
        Aggregate::Median if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        Aggregate::Median => sorted[n / 2],
        Aggregate::Min => sorted[0],
        Aggregate::Max => sorted[n - 1],
    }
}
