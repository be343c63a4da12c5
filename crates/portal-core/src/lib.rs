//! Self-Service Portal Core
//!
//! External self-service portal in front of a ServiceNow-style ITSM platform.
//!
//! ## Features
//! - Catalog item field metadata mapped to a renderable form schema
//! - Client-side validation with conditional field visibility
//! - Cascading record creation (incident, request + item, simulated)
//! - Local request ledger with bounded FIFO retention
//! - Mock or upstream-backed data service chosen once at startup
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────────────────┐   ┌───────────────┐
//! │ fields::     │──▶│ form::      │──▶│ orchestrator::         │──▶│ ledger::      │
//! │ map_fields   │   │ FormSession │   │ SubmissionOrchestrator │   │ RequestLedger │
//! └──────┬───────┘   └─────────────┘   └───────────┬────────────┘   └───────────────┘
//!        │                                         │
//!        ▼                                         ▼
//! ┌────────────────────────────────────────────────────────────────┐
//! │ upstream::ItsmClient   (ServiceNowClient, Basic-Auth, reqwest) │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod fields;
pub mod form;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod service;
pub mod upstream;
pub mod wire;

pub use config::{Credentials, PortalConfig};
pub use error::{PortalError, Result};
pub use fields::{map_fields, FieldDescriptor, FieldKind, FormSchema, RawField};
pub use form::{validate, FormSession, FormValues};
pub use ledger::{RequestLedger, RequestStatus, StoredRequest};
pub use orchestrator::{StrategyTag, SubmissionOrchestrator, SubmissionOutcome};
pub use service::{DataService, MockDataService, RealDataService, ServiceKind};
pub use upstream::{ItsmClient, ServiceNowClient, Table};
