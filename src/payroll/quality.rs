use thiserror::Error;
use tracing::{info, warn};

use super::record::PayrollRecord;

/// Why a batch was rejected. Only counts are kept, not the offending rows.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QualityError {
    #[error("Data quality check failed: NULL values found! ({0} rows with no employee_id or salary)")]
    NullValues(usize),

    #[error("Data quality check failed: Negative salaries found! ({0} rows)")]
    NegativeSalary(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityReport {
    pub rows_checked: usize,
}

/// Go/no-go gate run before the fact table is used downstream.
///
/// The null check runs first; a batch with both problems reports nulls.
pub fn check_quality(records: &[PayrollRecord]) -> Result<QualityReport, QualityError> {
    let nulls = records
        .iter()
        .filter(|r| r.employee_id.is_none() || !r.salary.is_some_and(f64::is_finite))
        .count();
    if nulls > 0 {
        warn!(nulls, rows = records.len(), "null check failed");
        return Err(QualityError::NullValues(nulls));
    }

    let negative = records
        .iter()
        .filter(|r| r.salary.is_some_and(|s| s < 0.0))
        .count();
    if negative > 0 {
        warn!(negative, rows = records.len(), "salary check failed");
        return Err(QualityError::NegativeSalary(negative));
    }

    info!(rows = records.len(), "data quality checks passed");
    Ok(QualityReport {
        rows_checked: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: i64, employee_id: Option<&str>, salary: Option<f64>) -> PayrollRecord {
        PayrollRecord {
            id,
            employee_id: employee_id.map(str::to_string),
            name: None,
            department: Some("A".into()),
            job_title: None,
            salary,
            payment_date: None,
        }
    }

    fn valid(n: i64) -> Vec<PayrollRecord> {
        (1..=n).map(|i| rec(i, Some("E"), Some(100.0))).collect()
    }

    #[test]
    fn test_clean_batch_passes() {
        assert_eq!(
            check_quality(&valid(50)),
            Ok(QualityReport { rows_checked: 50 })
        );
        assert_eq!(check_quality(&[]), Ok(QualityReport { rows_checked: 0 }));
    }

    #[test]
    fn test_single_null_employee_rejects_everything() {
        let mut batch = valid(1_000);
        batch.push(rec(1_001, None, Some(10.0)));
        assert_eq!(check_quality(&batch), Err(QualityError::NullValues(1)));
    }

    #[test]
    fn test_null_salary_rejects() {
        let mut batch = valid(3);
        batch[1].salary = None;
        batch[2].salary = None;
        assert_eq!(check_quality(&batch), Err(QualityError::NullValues(2)));
    }

    #[test]
    fn test_negative_salary_rejects() {
        let mut batch = valid(10);
        batch[4].salary = Some(-0.01);
        assert_eq!(check_quality(&batch), Err(QualityError::NegativeSalary(1)));
    }

    #[test]
    fn test_nulls_reported_before_negatives() {
        let batch = vec![rec(1, None, Some(5.0)), rec(2, Some("E"), Some(-5.0))];
        assert_eq!(check_quality(&batch), Err(QualityError::NullValues(1)));
    }

    #[test]
    fn test_nan_salary_counts_as_null() {
        let mut batch = valid(2);
        batch[1].salary = Some(f64::NAN);
        assert_eq!(check_quality(&batch), Err(QualityError::NullValues(1)));

        batch[1].salary = Some(f64::INFINITY);
        assert_eq!(check_quality(&batch), Err(QualityError::NullValues(1)));
    }

    #[test]
    fn test_zero_salary_is_fine() {
        let batch = vec![rec(1, Some("E"), Some(0.0))];
        assert!(check_quality(&batch).is_ok());
    }
}
