use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::record::PayrollRecord;

/// Derived row: total salary paid per department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentPayrollSummary {
    pub id: i64,
    pub department: Option<String>,
    pub total_salary: f64,
}

/// Group by department and sum salaries. Rows with no department form
/// their own group; missing salaries add nothing. Output is sorted by
/// department with identity keys assigned in that order.
pub fn aggregate_by_department(records: &[PayrollRecord]) -> Vec<DepartmentPayrollSummary> {
    let mut totals: BTreeMap<Option<&str>, f64> = BTreeMap::new();
    for r in records {
        *totals.entry(r.department.as_deref()).or_default() += r.salary.unwrap_or(0.0);
    }

    totals
        .into_iter()
        .enumerate()
        .map(|(i, (department, total_salary))| DepartmentPayrollSummary {
            id: i as i64 + 1,
            department: department.map(str::to_string),
            total_salary,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(dept: Option<&str>, salary: Option<f64>) -> PayrollRecord {
        PayrollRecord {
            id: 0,
            employee_id: Some("E".into()),
            name: None,
            department: dept.map(str::to_string),
            job_title: None,
            salary,
            payment_date: None,
        }
    }

    fn pairs(rows: &[DepartmentPayrollSummary]) -> Vec<(Option<&str>, f64)> {
        rows.iter()
            .map(|r| (r.department.as_deref(), r.total_salary))
            .collect()
    }

    #[test]
    fn test_sums_per_department() {
        let rows = aggregate_by_department(&[
            rec(Some("A"), Some(10.0)),
            rec(Some("A"), Some(20.0)),
            rec(Some("B"), Some(5.0)),
        ]);
        assert_eq!(pairs(&rows), vec![(Some("A"), 30.0), (Some("B"), 5.0)]);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].id, 2);
    }

    #[test]
    fn test_one_row_per_distinct_department() {
        let input: Vec<PayrollRecord> = (0..100)
            .map(|i| rec(Some(["X", "Y", "Z"][i % 3]), Some(1.0)))
            .collect();
        let rows = aggregate_by_department(&input);
        assert_eq!(rows.len(), 3);
        let total: f64 = rows.iter().map(|r| r.total_salary).sum();
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_missing_department_and_salary() {
        let rows = aggregate_by_department(&[
            rec(None, Some(7.0)),
            rec(Some("A"), None),
            rec(None, Some(3.0)),
        ]);
        assert_eq!(pairs(&rows), vec![(None, 10.0), (Some("A"), 0.0)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate_by_department(&[]).is_empty());
    }
}
