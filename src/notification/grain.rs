use serde::Serialize;

use crate::constants::GRAIN_PAYLOAD_TYPE;
use crate::constants::GRAIN_TYPE_EVENT;
use crate::utils::time::timestamp_string;
use crate::ChangeRecord;
use crate::Rational;
use crate::ResourceKind;

/// Delivery envelope for one or more change records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grain {
    pub grain_type: String,
    /// Query service instance
    pub source_id: String,
    /// Subscription
    pub flow_id: String,
    pub origin_timestamp: String,
    pub sync_timestamp: String,
    pub creation_timestamp: String,
    pub rate: Rational,
    pub duration: Rational,
    pub grain: GrainPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrainPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    pub topic: String,
    pub data: Vec<ChangeRecord>,
}

impl Grain {
    /// Event grain stamped with the current time. Event grains have zero
    /// rate and duration.
    pub fn event(
        source_id: &str,
        subscription_id: &str,
        kind: ResourceKind,
        data: Vec<ChangeRecord>,
    ) -> Self {
        let now = timestamp_string();
        Self {
            grain_type: GRAIN_TYPE_EVENT.to_string(),
            source_id: source_id.to_string(),
            flow_id: subscription_id.to_string(),
            origin_timestamp: now.clone(),
            sync_timestamp: now.clone(),
            creation_timestamp: now,
            rate: Rational::ZERO,
            duration: Rational::ZERO,
            grain: GrainPayload {
                payload_type: GRAIN_PAYLOAD_TYPE.to_string(),
                topic: kind.topic().to_string(),
                data,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.grain.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grain.data.is_empty()
    }
}
