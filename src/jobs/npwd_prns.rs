//! RREPW → NPWD: PRNs accepted, rejected or cancelled in RREPW are written
//! back to NPWD.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::models::{NpwdPrnUpdate, PrnStatus, RrepwPage, RrepwPrn};
use super::{fetch_failed, incomplete_fetch, DEFAULT_MAX_PAGES};
use crate::error::SyncResult;
use crate::http::{ApiClient, ApiRequest, Outcome};
use crate::sync::cursor::encode_timestamp;
use crate::sync::{run_batch, BatchContext, BatchLimits, FetchWindow, JobReport, SyncJob};

pub const JOB_NAME: &str = "update-npwd-prns";

const PAGE_SIZE: usize = 100;

/// Statuses NPWD needs to hear about.
const SYNCED_STATUSES: [PrnStatus; 4] = [
    PrnStatus::Accepted,
    PrnStatus::Rejected,
    PrnStatus::Cancelled,
    PrnStatus::AwaitingCancellation,
];

pub struct UpdateNpwdPrns {
    rrepw: Arc<ApiClient>,
    npwd: Arc<ApiClient>,
    limits: BatchLimits,
    max_pages: usize,
}

impl UpdateNpwdPrns {
    pub fn new(rrepw: Arc<ApiClient>, npwd: Arc<ApiClient>, limits: BatchLimits) -> Self {
        Self {
            rrepw,
            npwd,
            limits,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Fail the run rather than read more than `max_pages` pages.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn fetch_changed(&self, window: FetchWindow, ctx: &BatchContext) -> SyncResult<Vec<RrepwPrn>> {
        let statuses = SYNCED_STATUSES
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let mut prns = Vec::new();

        for page_no in 1..=self.max_pages {
            let req = ApiRequest::get("/v1/packaging-recycling-notes")
                .query("statuses", statuses.as_str())
                .query("dateFrom", encode_timestamp(window.from))
                .query("dateTo", encode_timestamp(window.to))
                .query("page", page_no.to_string())
                .query("pageSize", PAGE_SIZE.to_string());

            let page = match self.rrepw.execute::<RrepwPage<RrepwPrn>>(req, ctx).await? {
                Outcome::Success(Some(page)) => page,
                Outcome::Success(None) if page_no == 1 => return Ok(prns),
                Outcome::Success(None) => {
                    return Err(incomplete_fetch(
                        &self.rrepw,
                        format!("page {page_no} had no readable body"),
                    ))
                }
                Outcome::Skipped { status } => return Err(fetch_failed(&self.rrepw, status)),
            };
            prns.extend(page.items);
            if !page.has_more {
                return Ok(prns);
            }
        }

        Err(incomplete_fetch(
            &self.rrepw,
            format!("page limit of {} reached with more pages pending", self.max_pages),
        ))
    }
}

#[async_trait]
impl SyncJob for UpdateNpwdPrns {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn run_window(&self, window: FetchWindow, ctx: &BatchContext) -> SyncResult<JobReport> {
        let prns = self.fetch_changed(window, ctx).await?;
        let fetched = prns.len();
        info!("Fetched {fetched} changed PRNs from RREPW");

        let npwd = self.npwd.clone();
        let batch = run_batch(prns, ctx, self.limits, move |prn, ctx| {
            let npwd = npwd.clone();
            async move {
                let req = ApiRequest::patch("/odata/PRNs")
                    .json(&[NpwdPrnUpdate::from(&prn)])?
                    .for_item(prn.prn_number.as_str());
                npwd.push(req, &ctx).await
            }
        })
        .await?;

        Ok(JobReport { fetched, batch })
    }
}
