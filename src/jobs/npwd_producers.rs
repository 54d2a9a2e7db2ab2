//! Waste organisations → NPWD: registered organisations become NPWD
//! producers.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::fetch_failed;
use super::models::{NpwdProducer, Organisation};
use crate::error::SyncResult;
use crate::http::{ApiClient, ApiRequest, Outcome};
use crate::sync::cursor::encode_timestamp;
use crate::sync::{run_batch, BatchContext, BatchLimits, FetchWindow, JobReport, SyncJob};

pub const JOB_NAME: &str = "update-npwd-producers";

pub struct UpdateNpwdProducers {
    organisations: Arc<ApiClient>,
    npwd: Arc<ApiClient>,
    limits: BatchLimits,
}

impl UpdateNpwdProducers {
    pub fn new(organisations: Arc<ApiClient>, npwd: Arc<ApiClient>, limits: BatchLimits) -> Self {
        Self {
            organisations,
            npwd,
            limits,
        }
    }
}

#[async_trait]
impl SyncJob for UpdateNpwdProducers {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn run_window(&self, window: FetchWindow, ctx: &BatchContext) -> SyncResult<JobReport> {
        let req = ApiRequest::get("/v1/organisations")
            .query("updatedFrom", encode_timestamp(window.from))
            .query("updatedTo", encode_timestamp(window.to));

        let organisations = match self.organisations.execute::<Vec<Organisation>>(req, ctx).await? {
            Outcome::Success(body) => body.unwrap_or_default(),
            Outcome::Skipped { status } => return Err(fetch_failed(&self.organisations, status)),
        };
        let fetched = organisations.len();
        info!("Fetched {fetched} changed organisations");

        let npwd = self.npwd.clone();
        let batch = run_batch(organisations, ctx, self.limits, move |org, ctx| {
            let npwd = npwd.clone();
            async move {
                let req = ApiRequest::patch("/odata/Producers")
                    .json(&[NpwdProducer::from(&org)])?
                    .for_item(org.id.as_str());
                npwd.push(req, &ctx).await
            }
        })
        .await?;

        Ok(JobReport { fetched, batch })
    }
}
