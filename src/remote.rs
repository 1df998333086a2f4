use crate::dashboard::{Dashboard, DashboardSnapshot};
use crate::error::{DashboardError, Result};
use crate::ingestion::{parse_gviz_response, parse_proxy_response};
use crate::schema::{DashboardConfig, RawTable};
use log::{info, warn};
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

const SHEETS_BASE_URL: &str = "https://docs.google.com/spreadsheets/d";
const CORS_PROXY_URL: &str = "https://api.allorigins.win/get";
const MIN_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Query endpoint of a spreadsheet, answering with a gviz JSONP envelope.
pub fn gviz_url(sheet_id: &str) -> String {
    format!("{}/{}/gviz/tq?tqx=out:json", SHEETS_BASE_URL, sheet_id)
}

/// Fetches the ledger table, first directly and then through a CORS proxy.
#[derive(Clone)]
pub struct SheetClient {
    client: Client,
    sheet_url: String,
    proxy_url: String,
}

impl SheetClient {
    pub fn new(sheet_id: &str) -> Self {
        Self {
            client: Client::new(),
            sheet_url: gviz_url(sheet_id),
            proxy_url: CORS_PROXY_URL.to_string(),
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let sheet_id = config
            .sheet_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                DashboardError::InvalidConfig("sheet_id is required to fetch the ledger".to_string())
            })?;
        Ok(Self::new(sheet_id))
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = proxy_url.into();
        self
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    /// Proxy request URL carrying the sheet URL as its `url` query parameter.
    pub fn proxied_url(&self) -> Result<Url> {
        Url::parse_with_params(&self.proxy_url, &[("url", self.sheet_url.as_str())])
            .map_err(|e| DashboardError::InvalidConfig(format!("invalid proxy URL: {}", e)))
    }

    pub async fn fetch_table(&self) -> Result<RawTable> {
        match self.fetch_direct().await {
            Ok(table) => Ok(table),
            Err(e) => {
                warn!("Direct sheet fetch failed ({}), retrying through proxy", e);
                self.fetch_via_proxy().await
            }
        }
    }

    async fn fetch_direct(&self) -> Result<RawTable> {
        let res = self.client.get(&self.sheet_url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(DashboardError::SourceError(format!(
                "sheet request failed with status {}",
                status
            )));
        }

        let text = res.text().await?;
        parse_gviz_response(&text)
    }

    async fn fetch_via_proxy(&self) -> Result<RawTable> {
        let res = self.client.get(self.proxied_url()?).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(DashboardError::SourceError(format!(
                "proxy request failed with status {}",
                status
            )));
        }

        let body = res.text().await?;
        parse_proxy_response(&body)
    }
}

/// One refresh cycle. The lock is released while the request is in flight,
/// so filter changes are not blocked by the network.
pub async fn refresh(
    client: &SheetClient,
    dashboard: &Mutex<Dashboard>,
) -> Result<Arc<DashboardSnapshot>> {
    let ticket = dashboard.lock().await.begin_refresh();
    let fetched = client.fetch_table().await;
    dashboard.lock().await.complete_refresh(ticket, fetched)
}

/// Periods shorter than one second are raised to one second.
pub fn refresh_period(period: Duration) -> Duration {
    period.max(MIN_REFRESH_PERIOD)
}

/// Refreshes immediately and then every `period`, forever. Errors are logged
/// and the dashboard keeps its last good snapshot.
pub async fn auto_refresh(client: SheetClient, dashboard: Arc<Mutex<Dashboard>>, period: Duration) {
    let mut ticker = interval(refresh_period(period));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match refresh(&client, &dashboard).await {
            Ok(snapshot) => info!(
                "Dashboard refreshed: {} transactions, {} alerts",
                snapshot.transactions.len(),
                snapshot.alerts.len()
            ),
            Err(e) => warn!("Scheduled refresh failed: {}", e),
        }
    }
}
