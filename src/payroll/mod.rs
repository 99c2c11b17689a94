pub mod access;
pub mod aggregate;
pub mod quality;
pub mod record;
pub mod schema;

pub use access::AccessGrant;
pub use aggregate::{aggregate_by_department, DepartmentPayrollSummary};
pub use quality::{check_quality, QualityError, QualityReport};
pub use record::{read_payroll_csv, transform, PayrollRecord, RawPayrollRow};
pub use schema::{
    commit_parquet, create_table_sql, payroll_batch, stage_parquet, summary_batch, write_parquet,
};
