// src/payroll/record.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::{fs::File, path::Path};
use tracing::debug;

/// Cell values read as missing, on top of the empty cell.
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_na(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || NA_TOKENS.contains(&s)
}

fn na_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let cell: Option<String> = Option::deserialize(d)?;
    Ok(cell.filter(|s| !is_na(s)))
}

/// NA tokens and non-finite values are missing; any other non-number is an error.
fn na_salary<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let Some(cell) = Option::<String>::deserialize(d)? else {
        return Ok(None);
    };
    if is_na(&cell) {
        return Ok(None);
    }
    match cell.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(de::Error::custom(format!("salary `{}` is not a number", cell))),
    }
}

/// One row of the payroll CSV as it arrives, before any typing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPayrollRow {
    #[serde(deserialize_with = "na_string")]
    pub employee_id: Option<String>,
    #[serde(deserialize_with = "na_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "na_string")]
    pub department: Option<String>,
    #[serde(deserialize_with = "na_string")]
    pub job_title: Option<String>,
    #[serde(deserialize_with = "na_salary")]
    pub salary: Option<f64>,
    #[serde(deserialize_with = "na_string")]
    pub payment_date: Option<String>,
}

/// Fact-table row. `id` is the identity key, 1-based in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRecord {
    pub id: i64,
    pub employee_id: Option<String>,
    pub name: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub salary: Option<f64>,
    pub payment_date: Option<NaiveDate>,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a payment date, tolerating a trailing time component.
pub fn parse_payment_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split([' ', 'T']).next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Extract: read every row of a headed payroll CSV. Empty cells become `None`.
pub fn read_payroll_csv(path: &Path) -> Result<Vec<RawPayrollRow>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let row: RawPayrollRow =
            result.with_context(|| format!("parsing row {} of {}", i + 1, path.display()))?;
        rows.push(row);
    }
    debug!(rows = rows.len(), file = %path.display(), "extracted payroll rows");
    Ok(rows)
}

/// Transform: type the payment dates and assign identity keys.
/// An unparseable (non-empty) date fails the whole batch.
pub fn transform(rows: Vec<RawPayrollRow>) -> Result<Vec<PayrollRecord>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let payment_date = match raw.payment_date.as_deref() {
                None => None,
                Some(s) if s.trim().is_empty() => None,
                Some(s) => match parse_payment_date(s) {
                    Some(d) => Some(d),
                    None => bail!("row {}: unparseable payment_date `{}`", i + 1, s),
                },
            };
            Ok(PayrollRecord {
                id: i as i64 + 1,
                employee_id: raw.employee_id,
                name: raw.name,
                department: raw.department,
                job_title: raw.job_title,
                salary: raw.salary,
                payment_date,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_payment_date_formats() {
        let want = NaiveDate::from_ymd_opt(2021, 6, 30).unwrap();
        assert_eq!(parse_payment_date("2021-06-30"), Some(want));
        assert_eq!(parse_payment_date("06/30/2021"), Some(want));
        assert_eq!(parse_payment_date("2021/06/30"), Some(want));
        assert_eq!(parse_payment_date("2021-06-30 00:00:00"), Some(want));
        assert_eq!(parse_payment_date("30th June"), None);
    }

    #[test]
    fn test_read_and_transform() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            "employee_id,name,department,job_title,salary,payment_date\n\
             E1,Ann,POLICE,OFFICER,85000.5,2021-06-30\n\
             ,Bob,FIRE,CHIEF,,\n\
             E3,Cy,PARKS,GARDENER,n/a,06/15/2020\n"
        )?;

        let raw = read_payroll_csv(tmp.path())?;
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[1].employee_id, None);
        assert_eq!(raw[1].salary, None);
        assert_eq!(raw[2].salary, None);

        let records = transform(raw)?;
        assert_eq!(records[0].id, 1);
        assert_eq!(records[2].id, 3);
        assert_eq!(records[0].salary, Some(85000.5));
        assert_eq!(records[1].payment_date, None);
        assert_eq!(
            records[2].payment_date,
            NaiveDate::from_ymd_opt(2020, 6, 15)
        );
        Ok(())
    }

    #[test]
    fn test_na_tokens_and_non_finite_are_missing() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            "employee_id,name,department,job_title,salary,payment_date
             NA,Ann,POLICE,OFFICER,NaN,2021-06-30
             E2,null,N/A,CHIEF,inf,NULL
             E3,Cy,PARKS,GARDENER,-nan,
"
        )?;

        let raw = read_payroll_csv(tmp.path())?;
        assert_eq!(raw[0].employee_id, None);
        assert!(raw.iter().all(|r| r.salary.is_none()));
        assert_eq!(raw[1].name, None);
        assert_eq!(raw[1].department, None);
        assert_eq!(raw[1].payment_date, None);
        assert_eq!(raw[1].job_title.as_deref(), Some("CHIEF"));
        Ok(())
    }

    #[test]
    fn test_non_numeric_salary_fails_extract() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            "employee_id,name,department,job_title,salary,payment_date
             E1,Ann,POLICE,OFFICER,100,2021-06-30
             E2,Bob,FIRE,CHIEF,abc,2021-06-30
"
        )?;

        let err = read_payroll_csv(tmp.path()).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("parsing row 2"), "{}", msg);
        assert!(msg.contains("abc"), "{}", msg);
        Ok(())
    }

    #[test]
    fn test_bad_date_rejects_batch() {
        let rows = vec![RawPayrollRow {
            employee_id: Some("E1".into()),
            name: None,
            department: None,
            job_title: None,
            salary: Some(1.0),
            payment_date: Some("yesterday".into()),
        }];
        let err = transform(rows).unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }
}
