// common/src/models/campaign.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A saved ad or campaign draft, stored in the `saved_campaigns` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCampaign {
    pub id: Uuid,
    /// Owning identity
    pub user_id: Uuid,
    pub name: String,
    pub ad_data: Option<Value>,
    pub campaign_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Campaign fields supplied by the caller; owner and timestamps are assigned on insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_data: Option<Value>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl NewCampaign {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ad_data: None,
            campaign_data: None,
            kind: kind.into(),
        }
    }

    pub fn with_ad_data(mut self, ad_data: Value) -> Self {
        self.ad_data = Some(ad_data);
        self
    }

    pub fn with_campaign_data(mut self, campaign_data: Value) -> Self {
        self.campaign_data = Some(campaign_data);
        self
    }

    /// Materialize the stored row
    pub fn into_saved(self, id: Uuid, owner: Uuid, now: DateTime<Utc>) -> SavedCampaign {
        SavedCampaign {
            id,
            user_id: owner,
            name: self.name,
            ad_data: self.ad_data,
            campaign_data: self.campaign_data,
            created_at: now,
            updated_at: now,
            kind: self.kind,
        }
    }
}
