use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};

use crate::config::ColumnNames;
use crate::errors::{Result, WhatIfError};
use crate::models::{round_to, CourseRanking, CourseRecord, FeatureImportance};

/// The strings pandas reads as NA by default.
const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Course rows with a finite engagement score, in file order.
#[derive(Debug, Clone)]
pub struct CourseDataset {
    pub feature_columns: Vec<String>,
    pub records: Vec<CourseRecord>,
}

/// The model's training features, used for population-mean imputation.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
    /// Non-numeric columns with their first unparseable cell (row, value).
    pub text_columns: HashMap<String, (usize, String)>,
}

fn csv_reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source)
}

fn parse_cell(row: usize, column: &str, raw: &str) -> Result<Option<f64>> {
    if MISSING_TOKENS.contains(&raw) {
        return Ok(None);
    }

    let value: f64 = raw.parse().map_err(|_| WhatIfError::InvalidData {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })?;

    Ok(if value.is_nan() { None } else { Some(value) })
}

fn require_column(headers: &csv::StringRecord, name: &str, table: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| WhatIfError::SchemaMismatch(format!("{table} has no column '{name}'")))
}

impl CourseDataset {
    pub fn load(path: &Path, columns: &ColumnNames) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let dataset = Self::from_reader(file, columns)?;
        info!(
            "Loaded {} courses across {} companies from {}",
            dataset.records.len(),
            dataset.companies().len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(source: R, columns: &ColumnNames) -> Result<Self> {
        let mut reader = csv_reader(source);
        let headers = reader.headers()?.clone();

        let company_idx = require_column(&headers, &columns.company, "course dataset")?;
        let course_idx = require_column(&headers, &columns.course, "course dataset")?;
        let score_idx = require_column(&headers, &columns.engagement_score, "course dataset")?;
        let users_idx = headers.iter().position(|h| h == columns.user_count);

        let reserved = [company_idx, course_idx, score_idx];
        let feature_idx: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(idx, name)| !name.is_empty() && !reserved.contains(idx))
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();

        let mut records = Vec::new();
        let mut dropped = 0usize;

        for (line, result) in reader.records().enumerate() {
            let row = result?;
            let row_number = line + 1;
            let cell = |idx: usize| row.get(idx).unwrap_or("");

            let score = parse_cell(row_number, &columns.engagement_score, cell(score_idx))?
                .filter(|score| score.is_finite());
            let Some(engagement_score) = score else {
                debug!(
                    "Dropping row {} ({} / {}): engagement score '{}' is not finite",
                    row_number,
                    cell(company_idx),
                    cell(course_idx),
                    cell(score_idx)
                );
                dropped += 1;
                continue;
            };

            let user_count = match users_idx {
                Some(idx) => parse_cell(row_number, &columns.user_count, cell(idx))?,
                None => None,
            };

            let cells = feature_idx
                .iter()
                .map(|(idx, name)| (name.clone(), cell(*idx).to_string()))
                .collect();

            records.push(CourseRecord {
                row: row_number,
                company: cell(company_idx).to_string(),
                course: cell(course_idx).to_string(),
                engagement_score,
                user_count,
                cells,
            });
        }

        if dropped > 0 {
            warn!("Dropped {dropped} course rows without a finite engagement score");
        }

        Ok(Self {
            feature_columns: feature_idx.into_iter().map(|(_, name)| name).collect(),
            records,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.feature_columns.iter().any(|column| column == name)
    }

    /// Distinct companies in first-appearance order.
    pub fn companies(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|record| record.company.as_str())
            .filter(|company| seen.insert(*company))
            .collect()
    }

    pub fn courses(&self, company: &str) -> Result<Vec<&str>> {
        let mut seen = HashSet::new();
        let courses: Vec<&str> = self
            .records
            .iter()
            .filter(|record| record.company == company)
            .map(|record| record.course.as_str())
            .filter(|course| seen.insert(*course))
            .collect();

        if courses.is_empty() {
            return Err(WhatIfError::company_not_found(company));
        }
        Ok(courses)
    }

    /// First row matching the company/course pair.
    pub fn find(&self, company: &str, course: &str) -> Result<&CourseRecord> {
        if !self.records.iter().any(|record| record.company == company) {
            return Err(WhatIfError::company_not_found(company));
        }

        self.records
            .iter()
            .find(|record| record.company == company && record.course == course)
            .ok_or_else(|| WhatIfError::course_not_found(company, course))
    }

    /// Company courses by rounded score, highest first. Only the row `find`
    /// would return for `selected` is flagged.
    pub fn company_ranking(
        &self,
        company: &str,
        selected: Option<&str>,
    ) -> Result<Vec<CourseRanking>> {
        match selected {
            Some(course) => self.find(company, course).map(|_| ())?,
            None => self.courses(company).map(|_| ())?,
        }

        let rows: Vec<&CourseRecord> = self
            .records
            .iter()
            .filter(|record| record.company == company)
            .collect();
        let selected_idx =
            selected.and_then(|course| rows.iter().position(|record| record.course == course));

        let mut ranking: Vec<CourseRanking> = rows
            .iter()
            .enumerate()
            .map(|(idx, record)| CourseRanking {
                course: record.course.clone(),
                display_score: round_to(record.engagement_score, 0),
                user_count: record.user_count,
                selected: Some(idx) == selected_idx,
            })
            .collect();

        ranking.sort_by(|a, b| {
            b.display_score
                .partial_cmp(&a.display_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(ranking)
    }
}

impl FeatureTable {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        info!(
            "Loaded reference feature table with {} rows and {} columns from {}",
            table.rows.len(),
            table.columns.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = csv_reader(source);
        let headers = reader.headers()?.clone();
        let kept: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(idx, name)| (idx, name.to_string()))
            .collect();

        let mut rows = Vec::new();
        let mut text_columns = HashMap::new();
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let mut row = Vec::with_capacity(kept.len());
            for (idx, name) in &kept {
                let raw = record.get(*idx).unwrap_or("");
                match parse_cell(line + 1, name, raw) {
                    Ok(value) => row.push(value),
                    Err(_) => {
                        text_columns
                            .entry(name.clone())
                            .or_insert_with(|| (line + 1, raw.to_string()));
                        row.push(None);
                    }
                }
            }
            rows.push(row);
        }

        if !text_columns.is_empty() {
            debug!(
                "Reference feature table has {} non-numeric columns",
                text_columns.len()
            );
        }

        let mut table = Self::new(kept.into_iter().map(|(_, name)| name).collect(), rows);
        table.text_columns = text_columns;
        Ok(table)
    }

    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> Self {
        Self {
            columns,
            rows,
            text_columns: HashMap::new(),
        }
    }

    /// Mean over the non-missing values of `column`; `Ok(None)` when every value is missing.
    pub fn column_mean(&self, column: &str) -> Result<Option<f64>> {
        let idx = self
            .columns
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| {
                WhatIfError::SchemaMismatch(format!(
                    "reference feature table has no column '{column}'"
                ))
            })?;

        if let Some((row, value)) = self.text_columns.get(column) {
            return Err(WhatIfError::InvalidData {
                row: *row,
                column: column.to_string(),
                value: value.clone(),
            });
        }

        let (sum, count) = self
            .rows
            .iter()
            .filter_map(|row| row[idx])
            .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

        Ok(if count == 0 { None } else { Some(sum / count as f64) })
    }
}

impl CourseRecord {
    /// Numeric value of a feature column; text that is not a number is `InvalidData`.
    pub fn feature(&self, column: &str) -> Result<Option<f64>> {
        let raw = self.cells.get(column).ok_or_else(|| {
            WhatIfError::SchemaMismatch(format!("course dataset has no column '{column}'"))
        })?;
        parse_cell(self.row, column, raw)
    }
}

pub fn load_feature_importance(path: &Path) -> Result<Vec<FeatureImportance>> {
    let file = std::fs::File::open(path)?;
    let table = feature_importance_from_reader(file)?;
    info!(
        "Loaded {} feature importance rows from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

pub fn feature_importance_from_reader<R: Read>(source: R) -> Result<Vec<FeatureImportance>> {
    let mut reader = csv_reader(source);
    let mut rows = Vec::new();
    for result in reader.deserialize::<FeatureImportance>() {
        rows.push(result?);
    }
    Ok(rows)
}
