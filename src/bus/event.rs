use serde::Serialize;

use crate::Identified;
use crate::Resource;
use crate::ResourceKind;

/// One resource transition. `pre` is absent on creation, `post` on deletion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre: Option<Resource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Resource>,
}

impl ChangeRecord {
    pub fn new(
        pre: Option<Resource>,
        post: Option<Resource>,
    ) -> Self {
        let path = post
            .as_ref()
            .or(pre.as_ref())
            .map(|r| r.id().to_string())
            .unwrap_or_default();
        Self { path, pre, post }
    }

    /// Record that re-states a resource without change, used for snapshots.
    pub fn unchanged(resource: Resource) -> Self {
        Self::new(Some(resource.clone()), Some(resource))
    }
}

/// A topic-tagged change, published once per store mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ResourceKind,
    pub data: Vec<ChangeRecord>,
}

impl ChangeEvent {
    pub fn single(
        kind: ResourceKind,
        record: ChangeRecord,
    ) -> Self {
        Self {
            kind,
            data: vec![record],
        }
    }

    pub fn topic(&self) -> &'static str {
        self.kind.topic()
    }
}
