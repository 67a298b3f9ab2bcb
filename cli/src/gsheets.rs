use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::Secrets;
use slank_core::sheets::{QuotaExceeded, SheetBackend};
use slank_core::table::{Table, empty_schema};

const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Refresh the bearer token this long before its reported expiry.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self, now: Instant) -> bool {
        now + TOKEN_SLACK >= self.expires_at
    }
}

/// Sheets v4 REST backend authenticated with a service account.
///
/// The async reqwest client is bridged to the sync `SheetBackend` trait
/// through a stored runtime handle, so callers must not sit on a runtime
/// worker thread.
pub struct GoogleSheetsBackend {
    client: reqwest::Client,
    rt: tokio::runtime::Handle,
    secrets: Secrets,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsBackend {
    pub fn new(secrets: Secrets) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("slank-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            rt: tokio::runtime::Handle::current(),
            secrets,
            token: Mutex::new(None),
        }
    }

    fn signed_assertion(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_secs();
        let claims = JwtClaims {
            iss: &self.secrets.client_email,
            scope: SCOPE,
            aud: &self.secrets.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.secrets.private_key_id.clone());
        let key = EncodingKey::from_rsa_pem(self.secrets.private_key.as_bytes())
            .context("Invalid service-account private key (expected PKCS#8 PEM)")?;
        jsonwebtoken::encode(&header, &claims, &key).context("Failed to sign JWT assertion")
    }

    async fn access_token(&self) -> Result<String> {
        {
            let cached = self
                .token
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(token) = cached.as_ref() {
                if !token.is_expired(Instant::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let assertion = self.signed_assertion()?;
        let resp = self
            .client
            .post(&self.secrets.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach the token endpoint")?;

        if !resp.status().is_success() {
            bail!("Token exchange failed with HTTP {}", resp.status());
        }
        let token: TokenResponse = resp
            .json()
            .await
            .context("Failed to parse token response")?;

        let access_token = token.access_token.clone();
        let mut cached = self
            .token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    async fn fetch_async(&self, sheet: &str) -> Result<Table> {
        let token = self.access_token().await?;
        let url = format!(
            "{SHEETS_URL}/{}/values/{sheet}",
            self.secrets.spreadsheet_id
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to reach the Sheets API")?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(QuotaExceeded.into());
        }
        if !resp.status().is_success() {
            bail!("Fetching sheet '{sheet}' failed with HTTP {}", resp.status());
        }
        let data: ValuesResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse values for sheet '{sheet}'"))?;
        Ok(rows_to_table(sheet, data.values))
    }

    async fn replace_async(&self, sheet: &str, table: &Table) -> Result<()> {
        let token = self.access_token().await?;
        let base = format!(
            "{SHEETS_URL}/{}/values/{sheet}",
            self.secrets.spreadsheet_id
        );

        let resp = self
            .client
            .post(format!("{base}:clear"))
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Failed to reach the Sheets API")?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(QuotaExceeded.into());
        }
        if !resp.status().is_success() {
            bail!("Clearing sheet '{sheet}' failed with HTTP {}", resp.status());
        }

        let body = serde_json::json!({
            "range": sheet,
            "majorDimension": "ROWS",
            "values": table_to_values(table),
        });
        let resp = self
            .client
            .put(&base)
            .bearer_auth(&token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await
            .context("Failed to reach the Sheets API")?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(QuotaExceeded.into());
        }
        if !resp.status().is_success() {
            bail!("Updating sheet '{sheet}' failed with HTTP {}", resp.status());
        }
        Ok(())
    }
}

impl SheetBackend for GoogleSheetsBackend {
    fn fetch(&self, sheet: &str) -> Result<Table> {
        self.rt.block_on(self.fetch_async(sheet))
    }

    fn replace(&self, sheet: &str, table: &Table) -> Result<()> {
        self.rt.block_on(self.replace_async(sheet, table))
    }
}

/// Convert the API's row-major values into a `Table`. The first row is the
/// header; ragged rows are padded or truncated to the header width. An empty
/// response falls back to the sheet's predefined schema.
fn rows_to_table(sheet: &str, values: Vec<Vec<serde_json::Value>>) -> Table {
    let mut iter = values.into_iter();
    let Some(header) = iter.next() else {
        return empty_schema(sheet);
    };
    let columns: Vec<String> = header.into_iter().map(cell_to_string).collect();
    let width = columns.len();

    let mut table = Table::new(&columns.iter().map(String::as_str).collect::<Vec<_>>());
    for row in iter {
        let mut cells: Vec<String> = row.into_iter().map(cell_to_string).collect();
        cells.resize(width, String::new());
        cells.truncate(width);
        // Width is enforced above, so this cannot fail.
        let _ = table.push_row(cells);
    }
    table
}

fn table_to_values(table: &Table) -> Vec<Vec<String>> {
    let mut values = Vec::with_capacity(table.len() + 1);
    values.push(table.columns().to_vec());
    values.extend(table.rows().iter().cloned());
    values
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
