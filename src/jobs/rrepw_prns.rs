//! NPWD → RREPW: PRN status changes recorded in NPWD are pushed to RREPW.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{NpwdPrn, ODataPage, PrnStatus, RrepwStatusUpdate};
use super::{fetch_failed, incomplete_fetch, odata_timestamp, DEFAULT_MAX_PAGES};
use crate::error::{SyncError, SyncResult};
use crate::http::{path_segment, ApiClient, ApiRequest, Outcome};
use crate::sync::{run_batch, BatchContext, BatchLimits, FetchWindow, JobReport, SyncJob};

pub const JOB_NAME: &str = "update-rrepw-prns";

pub struct UpdateRrepwPrns {
    npwd: Arc<ApiClient>,
    rrepw: Arc<ApiClient>,
    limits: BatchLimits,
    max_pages: usize,
}

impl UpdateRrepwPrns {
    pub fn new(npwd: Arc<ApiClient>, rrepw: Arc<ApiClient>, limits: BatchLimits) -> Self {
        Self {
            npwd,
            rrepw,
            limits,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Fail the run rather than follow more than `max_pages` next links.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn fetch_changed(&self, window: FetchWindow, ctx: &BatchContext) -> SyncResult<Vec<NpwdPrn>> {
        let filter = format!(
            "StatusDate ge {} and StatusDate lt {}",
            odata_timestamp(window.from),
            odata_timestamp(window.to)
        );
        let mut req = ApiRequest::get("/odata/PRNs").query("$filter", filter);
        let mut prns = Vec::new();

        for page_no in 1..=self.max_pages {
            let page = match self.npwd.execute::<ODataPage<NpwdPrn>>(req, ctx).await? {
                Outcome::Success(Some(page)) => page,
                Outcome::Success(None) if page_no == 1 => return Ok(prns),
                Outcome::Success(None) => {
                    return Err(incomplete_fetch(
                        &self.npwd,
                        format!("page {page_no} had no readable body"),
                    ))
                }
                Outcome::Skipped { status } => return Err(fetch_failed(&self.npwd, status)),
            };
            prns.extend(page.value);

            let Some(link) = page.next_link else {
                return Ok(prns);
            };
            req = match self.npwd.relative_path(&link) {
                Some(path) => ApiRequest::get(path),
                None => {
                    return Err(SyncError::Internal(format!(
                        "NPWD next link points outside the NPWD base URL: {link}"
                    )))
                }
            };
        }

        Err(incomplete_fetch(
            &self.npwd,
            format!("page limit of {} reached with more pages pending", self.max_pages),
        ))
    }
}

async fn push_status(rrepw: Arc<ApiClient>, prn: NpwdPrn, ctx: BatchContext) -> SyncResult<Outcome<()>> {
    let Some(status) = PrnStatus::from_npwd_code(&prn.evidence_status_code) else {
        warn!(
            job = %ctx.job(),
            "Skipping PRN {} with unmapped status {}",
            prn.evidence_no, prn.evidence_status_code
        );
        return Ok(Outcome::Skipped { status: None });
    };

    let update = RrepwStatusUpdate {
        status,
        status_updated_at: prn.status_date,
        source: "npwd",
    };
    let req = ApiRequest::post(format!(
        "/v1/packaging-recycling-notes/{}/status",
        path_segment(&prn.evidence_no)
    ))
    .json(&update)?
    .for_item(prn.evidence_no.as_str());

    rrepw.push(req, &ctx).await
}

#[async_trait]
impl SyncJob for UpdateRrepwPrns {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn run_window(&self, window: FetchWindow, ctx: &BatchContext) -> SyncResult<JobReport> {
        let prns = self.fetch_changed(window, ctx).await?;
        let fetched = prns.len();
        info!("Fetched {fetched} changed PRNs from NPWD");

        let rrepw = self.rrepw.clone();
        let batch = run_batch(prns, ctx, self.limits, move |prn, ctx| {
            push_status(rrepw.clone(), prn, ctx)
        })
        .await?;

        Ok(JobReport { fetched, batch })
    }
}
