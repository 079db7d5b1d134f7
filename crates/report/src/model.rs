//! Monitored-asset records as the report handler consumes them.
//!
//! These are read-side snapshots: plain owned values the persistence
//! collaborator assembles per project, with sub-entities already joined in
//! (ports under their address, incidents under their domain).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use perimeter_core::ProjectId;

/// A monitored domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub address: String,
    pub alias: Option<String>,
}

/// An open port observed on an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub protocol: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
}

/// A monitored IP address and its observed ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAsset {
    pub address: String,
    pub ports: Vec<Port>,
}

/// A technology fingerprint attached to a domain or address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub target: String,
    pub plugin: String,
    pub value: String,
}

/// A detected defacement incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defacement {
    pub domain: String,
    pub url: String,
    pub source: String,
}

/// A phishing page impersonating a monitored domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhishingCapture {
    pub domain: String,
    pub target: String,
    pub source: String,
}

/// A takedown request and its current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Takedown {
    pub url: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
}

/// A source where project data was found leaked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakSource {
    pub name: String,
    pub kind: String,
    pub notes: Option<String>,
}

/// Everything the report needs about one project, fetched in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub name: String,
    pub domains: Vec<Domain>,
    pub ips: Vec<IpAsset>,
    pub fingerprints: Vec<Fingerprint>,
    pub defacements: Vec<Defacement>,
    pub phishing: Vec<PhishingCapture>,
    pub takedowns: Vec<Takedown>,
    pub leaks: Vec<LeakSource>,
}

impl ProjectSnapshot {
    /// An empty snapshot for a named project.
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            domains: Vec::new(),
            ips: Vec::new(),
            fingerprints: Vec::new(),
            defacements: Vec::new(),
            phishing: Vec::new(),
            takedowns: Vec::new(),
            leaks: Vec::new(),
        }
    }
}
