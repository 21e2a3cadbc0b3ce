//! Per-service status records for a single workflow run.

use crate::matching::mentioned_services;
use crate::workflow::{DEFAULT_ICON, StatusKind, Tone, Workflow};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Status of one tracked service.
#[derive(Debug, Clone)]
pub struct ServiceRecord<W: Workflow> {
    pub service: String,
    pub status: W::Status,
    pub details: String,
    pub icon: &'static str,
    pub fields: W::Fields,
}

impl<W: Workflow> ServiceRecord<W> {
    fn pending(service: String) -> Self {
        let status = W::Status::PENDING;
        Self {
            service,
            status,
            details: W::WAITING.to_string(),
            icon: status.icon().unwrap_or(DEFAULT_ICON),
            fields: W::Fields::default(),
        }
    }
}

/// Display-neutral row produced for the renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub icon: &'static str,
    pub service: String,
    pub status: &'static str,
    pub label: &'static str,
    pub tone: Tone,
    pub details: String,
    pub extra: Vec<String>,
}

/// Aggregate counts reduced from a tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub counters: BTreeMap<&'static str, u64>,
}

impl Summary {
    /// Number of services in the given status (machine name).
    pub fn count(&self, status: &str) -> usize {
        self.by_status.get(status).copied().unwrap_or(0)
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

/// Service name → status record, in the order the services were given.
///
/// The set of keys is fixed at construction: updates for unknown services are
/// ignored and nothing is ever removed.
#[derive(Debug, Clone)]
pub struct Tracker<W: Workflow> {
    records: Vec<ServiceRecord<W>>,
}

impl<W: Workflow> Tracker<W> {
    /// Creates a tracker with every service pending. Duplicate names collapse.
    pub fn new<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut records: Vec<ServiceRecord<W>> = Vec::new();
        for service in services {
            let service = service.into();
            if !records.iter().any(|r| r.service == service) {
                records.push(ServiceRecord::pending(service));
            }
        }
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, service: &str) -> Option<&ServiceRecord<W>> {
        self.records.iter().find(|r| r.service == service)
    }

    pub fn status(&self, service: &str) -> Option<W::Status> {
        self.get(service).map(|r| r.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceRecord<W>> {
        self.records.iter()
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.service.as_str())
    }

    /// Sets status and details. Returns false for unknown services and for
    /// transitions the status vocabulary rejects.
    pub fn update(&mut self, service: &str, status: W::Status, details: impl Into<String>) -> bool {
        self.update_with(service, status, details, W::Patch::default())
    }

    /// Sets status and details and merges `patch` into the extra fields.
    pub fn update_with(
        &mut self,
        service: &str,
        status: W::Status,
        details: impl Into<String>,
        patch: W::Patch,
    ) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.service == service) else {
            return false;
        };
        if !record.status.allows(status) {
            debug!(
                workflow = W::KIND,
                service,
                from = record.status.as_str(),
                to = status.as_str(),
                "Ignoring late transition out of terminal status"
            );
            return false;
        }
        record.status = status;
        record.details = details.into();
        record.icon = status.icon().unwrap_or(DEFAULT_ICON);
        W::merge(&mut record.fields, patch);
        true
    }

    /// Merges `patch` without touching status or details.
    pub fn patch(&mut self, service: &str, patch: W::Patch) -> bool {
        match self.records.iter_mut().find(|r| r.service == service) {
            Some(record) => {
                W::merge(&mut record.fields, patch);
                true
            }
            None => false,
        }
    }

    /// First service, in order, that is not settled yet.
    pub fn active_service(&self) -> Option<&str> {
        self.records
            .iter()
            .find(|r| !r.status.is_settled())
            .map(|r| r.service.as_str())
    }

    /// Services named in a lower-cased line.
    pub fn mentioned(&self, line_lower: &str) -> Vec<String> {
        mentioned_services(line_lower, self.service_names())
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// First service named in a lower-cased line.
    pub fn named_service(&self, line_lower: &str) -> Option<String> {
        self.mentioned(line_lower).into_iter().next()
    }

    /// The service a line is about: the named one, else the active one.
    pub fn resolve_service(&self, line_lower: &str) -> Option<String> {
        self.named_service(line_lower)
            .or_else(|| self.active_service().map(str::to_string))
    }

    /// Read-only copy for rendering.
    pub fn snapshot(&self) -> Vec<ServiceRecord<W>> {
        self.records.clone()
    }

    pub fn rows(&self) -> Vec<StatusRow> {
        self.records
            .iter()
            .map(|r| StatusRow {
                icon: r.icon,
                service: r.service.clone(),
                status: r.status.as_str(),
                label: r.status.label(),
                tone: r.status.tone(),
                details: r.details.clone(),
                extra: W::cells(&r.fields),
            })
            .collect()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.records.len(),
            ..Summary::default()
        };
        for record in &self.records {
            *summary.by_status.entry(record.status.as_str()).or_default() += 1;
            for (name, value) in W::counters(&record.fields) {
                *summary.counters.entry(name).or_default() += value;
            }
        }
        summary
    }
}
