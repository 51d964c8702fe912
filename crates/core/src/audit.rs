use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::event::{DataElement, EventDataValue, ProgramStageInstance};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditType {
    Create,
    Update,
    Delete,
}

impl AuditType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// One change to an event data value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataValueAudit {
    pub audit_id: String,
    pub audit_type: AuditType,
    pub data_element_uid: String,
    pub event_uid: String,
    pub value: Option<String>,
    pub modified_by: Option<String>,
    pub provided_elsewhere: bool,
    pub occurred_at: DateTime<Utc>,
}

impl DataValueAudit {
    pub fn new(
        data_value: &EventDataValue,
        data_element: &DataElement,
        event: &ProgramStageInstance,
        audit_type: AuditType,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4().to_string(),
            audit_type,
            data_element_uid: data_element.uid.clone(),
            event_uid: event.uid.clone(),
            value: data_value.value.clone(),
            modified_by: data_value.stored_by.clone(),
            provided_elsewhere: data_value.provided_elsewhere,
            occurred_at: Utc::now(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, audit: DataValueAudit);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    audits: Arc<Mutex<Vec<DataValueAudit>>>,
}

impl InMemoryAuditSink {
    pub fn audits(&self) -> Vec<DataValueAudit> {
        match self.audits.lock() {
            Ok(audits) => audits.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, audit: DataValueAudit) {
        match self.audits.lock() {
            Ok(mut audits) => audits.push(audit),
            Err(poisoned) => poisoned.into_inner().push(audit),
        }
    }
}

/// Writes audits to the log instead of storing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, audit: DataValueAudit) {
        info!(
            event_name = "event.data_value.audit",
            audit_id = %audit.audit_id,
            audit_type = audit.audit_type.as_str(),
            event_uid = %audit.event_uid,
            data_element = %audit.data_element_uid,
            modified_by = audit.modified_by.as_deref().unwrap_or("unknown"),
            provided_elsewhere = audit.provided_elsewhere,
            "event data value changed"
        );
    }
}
