//! Event log rows: conversion between [`LedgerEvent`] and the `events` table.

use qf_settlement::{EventKind, LedgerEvent};
use serde::Serialize;

use crate::errors::{Result, ServiceError};

/// A raw event record as stored in / read from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRecord {
    pub seq: i64,
    pub event_type: String,
    pub project_id: i64,
    pub payload: String,
    pub ledger_timestamp: i64,
    pub created_at: i64,
}

impl EventRecord {
    /// Build the row for the event at position `seq` in the log.
    pub fn from_event(seq: usize, event: &LedgerEvent) -> Result<Self> {
        Ok(Self {
            seq: seq as i64,
            event_type: event.kind().as_str().to_string(),
            project_id: event.project_id().0 as i64,
            payload: serde_json::to_string(event)?,
            ledger_timestamp: event.timestamp() as i64,
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    pub fn decode(&self) -> Result<LedgerEvent> {
        let event: LedgerEvent = serde_json::from_str(&self.payload)?;
        if EventKind::parse(&self.event_type) != Some(event.kind()) {
            return Err(ServiceError::EventParse(format!(
                "event {} is tagged {} but holds {}",
                self.seq,
                self.event_type,
                event.kind().as_str()
            )));
        }
        Ok(event)
    }
}

/// API representation of a stored event.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub seq: i64,
    pub event_type: String,
    pub project_id: i64,
    pub ledger_timestamp: i64,
    pub created_at: i64,
    pub event: LedgerEvent,
}

impl TryFrom<EventRecord> for EventView {
    type Error = ServiceError;

    fn try_from(record: EventRecord) -> Result<Self> {
        let event = record.decode()?;
        Ok(Self {
            seq: record.seq,
            event_type: record.event_type,
            project_id: record.project_id,
            ledger_timestamp: record.ledger_timestamp,
            created_at: record.created_at,
            event,
        })
    }
}
