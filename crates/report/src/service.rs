//! The report-generation handler service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use perimeter_events::{CommandRequest, CommandService};

use crate::model::ProjectSnapshot;
use crate::store::ProjectStore;
use crate::template::{ReportTemplate, TemplateError, markdown_table};

/// Command name this service accepts.
pub const REPORT_COMMAND: &str = "report_generate";

/// Derive the deterministic download name for a finished report.
///
/// Whitespace runs in the project's display name collapse to a single
/// underscore; the presentation layer attaches this to the artifact.
pub fn report_file_name(project_name: &str) -> String {
    let collapsed = project_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("report_{collapsed}.md")
}

/// Generates the surface report for a project.
///
/// The payload is opaque to this service; the project scope on the request
/// selects what to report on. Faults from the collaborators (unknown
/// project, unreadable template) surface as the command's failure message.
pub struct ReportService {
    store: Arc<dyn ProjectStore>,
    template: ReportTemplate,
}

impl ReportService {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self::with_template(store, ReportTemplate::standard())
    }

    pub fn with_template(store: Arc<dyn ProjectStore>, template: ReportTemplate) -> Self {
        Self { store, template }
    }

    fn build_report(&self, project: &ProjectSnapshot) -> Result<String, TemplateError> {
        let stats = [
            ("Domains", project.domains.len()),
            ("Addresses", project.ips.len()),
            ("Defacements", project.defacements.len()),
            ("Phishing", project.phishing.len()),
            ("Takedowns", project.takedowns.len()),
            ("Leak sources", project.leaks.len()),
        ]
        .iter()
        .map(|(label, count)| format!("- **{label}:** {count}"))
        .collect::<Vec<_>>()
        .join("\n");

        let domains = markdown_table(
            &["Domain", "Alias"],
            &project
                .domains
                .iter()
                .map(|d| vec![d.address.clone(), d.alias.clone().unwrap_or_else(|| "-".to_string())])
                .collect::<Vec<_>>(),
        );

        let ips = markdown_table(
            &["Address", "Open Ports"],
            &project
                .ips
                .iter()
                .map(|ip| vec![ip.address.clone(), ip.ports.len().to_string()])
                .collect::<Vec<_>>(),
        );

        let services = markdown_table(
            &["Address", "Port", "Protocol", "Service", "Version"],
            &project
                .ips
                .iter()
                .flat_map(|ip| {
                    ip.ports.iter().map(|port| {
                        vec![
                            ip.address.clone(),
                            port.number.to_string(),
                            dash(&port.protocol),
                            dash(&port.service),
                            dash(&port.version),
                        ]
                    })
                })
                .collect::<Vec<_>>(),
        );

        let fingerprints = markdown_table(
            &["Target", "Plugin", "Value"],
            &project
                .fingerprints
                .iter()
                .map(|f| vec![f.target.clone(), f.plugin.clone(), f.value.clone()])
                .collect::<Vec<_>>(),
        );

        let defacements = markdown_table(
            &["Domain", "URL", "Source"],
            &project
                .defacements
                .iter()
                .map(|d| vec![d.domain.clone(), d.url.clone(), d.source.clone()])
                .collect::<Vec<_>>(),
        );

        let phishing = markdown_table(
            &["Domain", "Target", "Source"],
            &project
                .phishing
                .iter()
                .map(|p| vec![p.domain.clone(), p.target.clone(), p.source.clone()])
                .collect::<Vec<_>>(),
        );

        let takedowns = markdown_table(
            &["URL", "Status", "Requested"],
            &project
                .takedowns
                .iter()
                .map(|t| {
                    vec![
                        t.url.clone(),
                        t.status.clone(),
                        t.requested_at.format("%Y-%m-%d").to_string(),
                    ]
                })
                .collect::<Vec<_>>(),
        );

        let leaks = markdown_table(
            &["Name", "Kind", "Notes"],
            &project
                .leaks
                .iter()
                .map(|l| vec![l.name.clone(), l.kind.clone(), dash(&l.notes)])
                .collect::<Vec<_>>(),
        );

        let values: HashMap<&str, String> = HashMap::from([
            ("PROJECT_NAME", project.name.clone()),
            ("GENERATED_AT", Utc::now().format("%Y-%m-%d").to_string()),
            ("SUMMARY_STATS", stats),
            ("DOMAIN_TABLE", domains),
            ("IP_TABLE", ips),
            ("SERVICE_TABLE", services),
            ("FINGERPRINT_TABLE", fingerprints),
            ("DEFACEMENT_TABLE", defacements),
            ("PHISHING_TABLE", phishing),
            ("TAKEDOWN_TABLE", takedowns),
            ("LEAK_TABLE", leaks),
        ]);

        self.template.render(&values)
    }
}

fn dash(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

impl CommandService for ReportService {
    fn name(&self) -> &str {
        "report"
    }

    fn handles(&self, command: &str) -> bool {
        command == REPORT_COMMAND
    }

    fn execute(&self, request: &CommandRequest) -> anyhow::Result<String> {
        tracing::info!(project = %request.project_id, "generating surface report");

        let project = self.store.fetch(request.project_id)?;
        let report = self.build_report(&project)?;

        tracing::info!(
            project = %request.project_id,
            bytes = report.len(),
            "surface report rendered"
        );
        Ok(report)
    }
}
