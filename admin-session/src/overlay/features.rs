use crate::failure::Failure;
use crate::gateway::RequestGateway;
use crate::overlay::{BulkSource, OverlayRecord};
use crate::types::{ApiResponse, FeatureRecord, TogglePatch};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

//--------------------------------------------------------------------------------------------------
// Per-institution feature assignments
//--------------------------------------------------------------------------------------------------

impl OverlayRecord for FeatureRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[derive(Serialize)]
struct BulkAssignment<'a> {
    features: &'a [TogglePatch],
}

/// `GET` and bulk `PUT` of one institution's feature toggles.
#[derive(Clone, Debug)]
pub struct FeatureAssignments {
    gateway: RequestGateway,
    institution_id: String,
}

impl FeatureAssignments {
    pub fn new(gateway: RequestGateway, institution_id: impl Into<String>) -> Self {
        Self {
            gateway,
            institution_id: institution_id.into(),
        }
    }

    pub fn path(&self) -> String {
        format!(
            "/institutions/{}/features",
            urlencoding::encode(&self.institution_id)
        )
    }
}

#[async_trait]
impl BulkSource<FeatureRecord> for FeatureAssignments {
    async fn fetch(&self) -> Result<Vec<FeatureRecord>, Failure> {
        let response: ApiResponse<Vec<FeatureRecord>> = self.gateway.get(&self.path()).await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn submit(&self, patches: &[TogglePatch]) -> Result<(), Failure> {
        let _: ApiResponse<Value> = self
            .gateway
            .put(&self.path(), &BulkAssignment { features: patches })
            .await?;
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
