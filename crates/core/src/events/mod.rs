//! Event data-value persistence: validation, audit trail and file-resource
//! bookkeeping around storing an event's values.

pub mod validation;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::approvals::CurrentUserProvider;
use crate::audit::{AuditSink, AuditType, DataValueAudit};
use crate::domain::event::{DataElement, EventDataValue, FileResource, ProgramStageInstance};
use crate::errors::ApplicationError;

pub use validation::{data_value_is_valid, VALUE_MAX_LENGTH};

#[derive(Debug, Error)]
pub enum EventDataValueError {
    #[error("{0}")]
    Validation(String),
    #[error("given data element ({0}) does not exist")]
    NotFound(String),
    #[error(transparent)]
    Persistence(#[from] ApplicationError),
}

#[async_trait]
pub trait DataElementLookup: Send + Sync {
    async fn data_element(&self, uid: &str) -> Result<Option<DataElement>, ApplicationError>;
}

#[async_trait]
pub trait FileResourceStore: Send + Sync {
    async fn file_resource(&self, uid: &str) -> Result<Option<FileResource>, ApplicationError>;
    async fn update_file_resource(&self, resource: &FileResource) -> Result<(), ApplicationError>;
    async fn delete_file_resource(&self, uid: &str) -> Result<(), ApplicationError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn event(&self, uid: &str) -> Result<Option<ProgramStageInstance>, ApplicationError>;
    async fn update_event(&self, event: &ProgramStageInstance) -> Result<(), ApplicationError>;
}

/// Value sets for [`EventDataValueService::persist_data_values`].
#[derive(Clone, Debug, Default)]
pub struct DataValueChanges {
    pub new: Vec<EventDataValue>,
    pub updated: Vec<EventDataValue>,
    pub removed: Vec<EventDataValue>,
}

pub struct EventDataValueService<D, F, E> {
    data_elements: D,
    file_resources: F,
    events: E,
    audit: Arc<dyn AuditSink>,
    users: Arc<dyn CurrentUserProvider>,
}

impl<D, F, E> EventDataValueService<D, F, E>
where
    D: DataElementLookup,
    F: FileResourceStore,
    E: EventStore,
{
    pub fn new(
        data_elements: D,
        file_resources: F,
        events: E,
        audit: Arc<dyn AuditSink>,
        users: Arc<dyn CurrentUserProvider>,
    ) -> Self {
        Self { data_elements, file_resources, events, audit, users }
    }

    /// Validates and stores a single value. Values without content are ignored.
    pub async fn save_event_data_value(
        &self,
        event: &mut ProgramStageInstance,
        mut data_value: EventDataValue,
    ) -> Result<(), EventDataValueError> {
        let Some(value) = data_value.value.as_deref().filter(|value| !value.is_empty()) else {
            debug!(
                event_name = "event.data_value.skipped",
                event_uid = %event.uid,
                data_element = %data_value.data_element,
                "empty event data value not stored"
            );
            return Ok(());
        };

        if data_value.data_element.is_empty() {
            return Err(EventDataValueError::Validation("Data element is null or empty".to_owned()));
        }

        let data_element = self
            .data_elements
            .data_element(&data_value.data_element)
            .await?
            .ok_or_else(|| EventDataValueError::NotFound(data_value.data_element.clone()))?;

        if let Some(key) = data_value_is_valid(value, data_element.value_type) {
            return Err(EventDataValueError::Validation(format!("Value is not valid: {key}")));
        }

        if data_value.stored_by.as_deref().map_or(true, str::is_empty) {
            data_value.stored_by = Some(self.users.current_user().username);
        }

        if data_element.is_file_type() {
            self.assign_file_resource(&data_value, &data_element).await?;
        }

        data_value.last_updated = Utc::now();
        event.event_data_values.insert(data_value.data_element.clone(), data_value.clone());
        self.audit.emit(DataValueAudit::new(&data_value, &data_element, event, AuditType::Create));
        self.events.update_event(event).await?;

        info!(
            event_name = "event.data_value.saved",
            event_uid = %event.uid,
            data_element = %data_element.uid,
            "event data value stored"
        );
        Ok(())
    }

    /// Replaces the event's values with `new` and `updated`.
    ///
    /// With `single_value`, stored values absent from all three sets are kept.
    /// Every value must reference an entry of `data_elements`.
    pub async fn persist_data_values(
        &self,
        changes: DataValueChanges,
        data_elements: &HashMap<String, DataElement>,
        event: &mut ProgramStageInstance,
        single_value: bool,
    ) -> Result<(), EventDataValueError> {
        let DataValueChanges { new, updated, removed } = changes;

        let element_for = |value: &EventDataValue| {
            data_elements
                .get(&value.data_element)
                .ok_or_else(|| EventDataValueError::NotFound(value.data_element.clone()))
        };
        for value in new.iter().chain(&updated).chain(&removed) {
            element_for(value)?;
        }

        let mut values: BTreeMap<String, EventDataValue> = BTreeMap::new();
        for value in updated.iter().chain(&new) {
            values.insert(value.data_element.clone(), value.clone());
        }

        if single_value {
            let changed: HashSet<&str> = new
                .iter()
                .chain(&updated)
                .chain(&removed)
                .map(|value| value.data_element.as_str())
                .collect();
            for (uid, value) in &event.event_data_values {
                if !changed.contains(uid.as_str()) {
                    values.insert(uid.clone(), value.clone());
                }
            }
        }

        event.event_data_values = values;

        for (set, audit_type) in
            [(&new, AuditType::Create), (&updated, AuditType::Update), (&removed, AuditType::Delete)]
        {
            for value in set {
                let element = element_for(value)?;
                self.audit.emit(DataValueAudit::new(value, element, event, audit_type));
            }
        }

        for value in &removed {
            self.delete_file_resource(value, element_for(value)?).await?;
        }
        for value in &updated {
            self.replace_file_resource(value, element_for(value)?).await?;
        }
        for value in &new {
            self.assign_file_resource(value, element_for(value)?).await?;
        }

        self.events.update_event(event).await?;

        info!(
            event_name = "event.data_values.persisted",
            event_uid = %event.uid,
            created = new.len(),
            updated = updated.len(),
            removed = removed.len(),
            single_value,
            "event data values persisted"
        );
        Ok(())
    }

    async fn fetch_file_resource(
        &self,
        data_value: &EventDataValue,
        data_element: &DataElement,
    ) -> Result<Option<FileResource>, ApplicationError> {
        if !data_element.is_file_type() {
            return Ok(None);
        }

        match data_value.value.as_deref() {
            Some(uid) => self.file_resources.file_resource(uid).await,
            None => Ok(None),
        }
    }

    async fn assign_file_resource(
        &self,
        data_value: &EventDataValue,
        data_element: &DataElement,
    ) -> Result<(), ApplicationError> {
        if let Some(mut resource) = self.fetch_file_resource(data_value, data_element).await? {
            resource.assigned = true;
            self.file_resources.update_file_resource(&resource).await?;
        }
        Ok(())
    }

    async fn replace_file_resource(
        &self,
        data_value: &EventDataValue,
        data_element: &DataElement,
    ) -> Result<(), ApplicationError> {
        let Some(previous) = data_value.audit_value.as_deref() else {
            return Ok(());
        };
        if data_value.value.as_deref() == Some(previous) {
            return Ok(());
        }

        let Some(mut resource) = self.fetch_file_resource(data_value, data_element).await? else {
            return Ok(());
        };

        self.file_resources.delete_file_resource(previous).await?;
        resource.assigned = true;
        self.file_resources.update_file_resource(&resource).await
    }

    async fn delete_file_resource(
        &self,
        data_value: &EventDataValue,
        data_element: &DataElement,
    ) -> Result<(), ApplicationError> {
        if let Some(resource) = self.fetch_file_resource(data_value, data_element).await? {
            self.file_resources.delete_file_resource(&resource.uid).await?;
        }
        Ok(())
    }
}
