//! `perimeter-report` — the surface report handler service.
//!
//! Reference implementation of the [`perimeter_events::CommandService`]
//! contract: on a `report_generate` command it gathers the monitored assets
//! of a project from the persistence collaborator, renders them through a
//! placeholder template into a markdown document, and returns that document
//! as the command's output artifact.

pub mod model;
pub mod service;
pub mod store;
pub mod template;

pub use model::ProjectSnapshot;
pub use service::{REPORT_COMMAND, ReportService, report_file_name};
pub use store::{InMemoryProjectStore, ProjectStore, StoreError};
pub use template::{NO_DATA, ReportTemplate, TemplateError, markdown_table};
