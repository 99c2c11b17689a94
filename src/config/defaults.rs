// src/config/defaults.rs
//
// The file lists the pipeline ran with before it took a config file.

use super::types::{
    ErrorPolicy, LoadStage, LoadTask, PayrollConfig, TargetTable, UploadStage, UploadTask,
};

pub const DEFAULT_BUCKET: &str = "caps-bucket";
pub const DEFAULT_DATASET: &str = "caps_staging";
pub const DEFAULT_CREDENTIALS_FILE: &str = "service_account_key.json";
pub const CREDENTIALS_ENV: &str = "SERVICE_ACCOUNT_KEY_PATH";
pub const RAW_PREFIX: &str = "Raw_Data";
pub const DEFAULT_LOCAL_ROOT: &str = ".payroll-etl";

static RAW_FILES: &[(&str, &str)] = &[
    ("Raw_AgencyMaster.csv", "Raw_DataSet/Raw_AgencyMaster.csv"),
    ("Raw_EmpMaster.csv", "Raw_DataSet/Raw_EmpMaster.csv"),
    ("Raw_nycpayroll_2020.csv", "Raw_DataSet/Raw_nycpayroll_2020.csv"),
    ("Raw_nycpayroll_2021.csv", "Raw_DataSet/Raw_nycpayroll_2021.csv"),
    ("Raw_TitleMaster.csv", "Raw_DataSet/Raw_TitleMaster.csv"),
];

static CLEAN_FILES: &[(&str, &str)] = &[
    ("AGENCYMaster_clean.csv", "Clean_DataSet/AGENCYMaster_clean.csv"),
    ("EMPLOYEEMaster_clean.csv", "Clean_DataSet/EMPLOYEEMaster_clean.csv"),
    ("NYCPayroll_2020_clean.csv", "Clean_DataSet/NYCPayroll_2020_clean.csv"),
    ("NYCPayroll_2021_clean.csv", "Clean_DataSet/NYCPayroll_2021_clean.csv"),
    ("TITLEMaster_clean.csv", "Clean_DataSet/TITLEMaster_clean.csv"),
];

static LOADS: &[(&str, TargetTable)] = &[
    ("gs://caps-bucket/AGENCYMaster_clean.csv", TargetTable::Agency),
    ("gs://caps-bucket/EMPLOYEEMaster_clean.csv", TargetTable::Employee),
    ("gs://caps-bucket/NYCPayroll_2020_clean.csv", TargetTable::Payroll2020),
    ("gs://caps-bucket/NYCPayroll_2021_clean.csv", TargetTable::Payroll2021),
    ("gs://caps-bucket/TITLEMaster_clean.csv", TargetTable::Title),
];

pub fn raw_stage() -> UploadStage {
    UploadStage {
        policy: ErrorPolicy::IsolateAndContinue,
        prefix: Some(RAW_PREFIX.to_string()),
        tasks: RAW_FILES
            .iter()
            .map(|(name, path)| UploadTask::new(name, *path))
            .collect(),
    }
}

pub fn clean_stage() -> UploadStage {
    UploadStage {
        policy: ErrorPolicy::IsolateAndContinue,
        prefix: None,
        tasks: CLEAN_FILES
            .iter()
            .map(|(name, path)| UploadTask::new(name, *path))
            .collect(),
    }
}

pub fn load_stage() -> LoadStage {
    LoadStage {
        policy: ErrorPolicy::FailFast,
        dataset: DEFAULT_DATASET.to_string(),
        location: None,
        tasks: LOADS
            .iter()
            .map(|(uri, table)| LoadTask::new(uri, *table))
            .collect(),
    }
}

pub fn payroll() -> PayrollConfig {
    PayrollConfig {
        source: "payroll_data.csv".into(),
        output_dir: "payroll_out".into(),
    }
}
