use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier regex"));

/// A login role with read-only access to every table in one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub user: String,
    pub database: String,
    pub schema: String,
}

impl Default for AccessGrant {
    fn default() -> Self {
        Self {
            user: "public_user".to_string(),
            database: "nyc_payroll".to_string(),
            schema: "public".to_string(),
        }
    }
}

impl AccessGrant {
    /// Render the grant script. `password` is embedded as a SQL string literal.
    pub fn to_sql(&self, password: &str) -> Result<String> {
        for (what, ident) in [
            ("user", &self.user),
            ("database", &self.database),
            ("schema", &self.schema),
        ] {
            if !IDENT_RE.is_match(ident) {
                bail!("{} `{}` is not a plain lowercase identifier", what, ident);
            }
        }
        if password.is_empty() {
            bail!("password must not be empty");
        }

        Ok(format!(
            "CREATE USER {user} WITH PASSWORD '{password}';\n\
             GRANT CONNECT ON DATABASE {db} TO {user};\n\
             GRANT USAGE ON SCHEMA {schema} TO {user};\n\
             GRANT SELECT ON ALL TABLES IN SCHEMA {schema} TO {user};\n",
            user = self.user,
            password = password.replace('\'', "''"),
            db = self.database,
            schema = self.schema,
        ))
    }
}
