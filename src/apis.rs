pub mod fda;
pub mod fsis;

use crate::config::ProviderSettings;
use crate::constants::{FDA_PROVIDER, FSIS_PROVIDER};
use crate::error::{RecallError, Result};
use crate::normalize::dates::parse_date_value;
use crate::normalize::fields::RecordView;
use crate::types::RecallProvider;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub use fda::FdaProvider;
pub use fsis::FsisProvider;

/// Shared client: per-request timeout, identifying User-Agent, compressed bodies
pub fn build_http_client(settings: &ProviderSettings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
        .user_agent(settings.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Instantiate the enabled providers in configured order
pub fn build_providers(settings: &ProviderSettings) -> Result<Vec<Arc<dyn RecallProvider>>> {
    let client = build_http_client(settings)?;
    settings
        .enabled
        .iter()
        .map(|name| -> Result<Arc<dyn RecallProvider>> {
            match name.as_str() {
                FDA_PROVIDER => Ok(Arc::new(FdaProvider::new(client.clone(), &settings.fda_url))),
                FSIS_PROVIDER => Ok(Arc::new(FsisProvider::new(client.clone(), &settings.fsis_url))),
                other => Err(RecallError::Config(format!("Unknown provider '{other}'"))),
            }
        })
        .collect()
}

/// First candidate field holding a parseable date, else now
pub(crate) fn record_date(view: &RecordView<'_>, keys: &[&str]) -> DateTime<Utc> {
    keys.iter()
        .filter_map(|k| view.get(k))
        .find_map(parse_date_value)
        .unwrap_or_else(Utc::now)
}

/// Text of the first present field, strings or string arrays alike
pub(crate) fn record_text(view: &RecordView<'_>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        view.text(k)
            .or_else(|| view.str_list(k).map(|items| items.join(", ")))
    })
}
