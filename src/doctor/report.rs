//! Tables printed by the doctor

use super::{AccessStatus, AccessSummary, CrdSummary, Diagnosis, NamespaceSummary};
use comfy_table::{presets::NOTHING, Attribute, Cell, Color, Table};

/// How reports are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub color: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { color: true }
    }
}

impl RenderOptions {
    fn table(&self, titles: &[&str]) -> Table {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        if self.color {
            table.enforce_styling();
        } else {
            table.force_no_tty();
        }
        table.set_header(
            titles
                .iter()
                .map(|t| Cell::new(t).add_attribute(Attribute::Bold))
                .collect::<Vec<Cell>>(),
        );
        table
    }

    fn paint(&self, text: &str, color: Color) -> Cell {
        let cell = Cell::new(text);
        if self.color {
            cell.fg(color)
        } else {
            cell
        }
    }

    fn status_cell(&self, status: AccessStatus) -> Cell {
        let color = match status {
            AccessStatus::Allowed => Color::Green,
            AccessStatus::Mixed => Color::Yellow,
            AccessStatus::Denied | AccessStatus::Missing | AccessStatus::Undefined => Color::Red,
        };
        self.paint(&status.to_string(), color)
    }

    fn presence_cell(&self, present: bool, found: &str) -> Cell {
        if present {
            self.paint(found, Color::Green)
        } else {
            self.paint("Missing", Color::Red)
        }
    }

    pub fn access_table(&self, summary: &AccessSummary) -> Table {
        let mut table = self.table(&["NAMESPACE", "GROUP", "RESOURCE", "READ STATUS", "WRITE STATUS"]);
        for status in &summary.statuses {
            let namespace = if status.resource.namespace.is_empty() {
                "*"
            } else {
                status.resource.namespace.as_str()
            };
            table.add_row(vec![
                Cell::new(namespace),
                Cell::new(&status.resource.display_group),
                Cell::new(&status.resource.resource),
                self.status_cell(status.read),
                self.status_cell(status.write),
            ]);
        }
        table
    }

    pub fn namespace_table(&self, summary: &NamespaceSummary) -> Table {
        let mut table = self.table(&["NAMESPACE", "STATUS"]);
        for (namespace, present) in &summary.namespaces {
            table.add_row(vec![Cell::new(namespace), self.presence_cell(*present, "OK")]);
        }
        table
    }

    pub fn crd_table(&self, summary: &CrdSummary) -> Table {
        let mut table = self.table(&["CUSTOM RESOURCE", "DEPLOYMENT"]);
        for (crd, present) in &summary.crds {
            table.add_row(vec![Cell::new(crd), self.presence_cell(*present, "Deployed")]);
        }
        table
    }

    /// Full doctor output, ending with the overall verdict
    pub fn diagnosis(&self, diagnosis: &Diagnosis) -> String {
        let mut out = String::new();
        match diagnosis {
            Diagnosis::MissingNamespaces(namespaces) => {
                out.push_str(&self.namespace_table(namespaces).to_string());
                out.push('\n');
            }
            Diagnosis::Access { namespaces, access } => {
                out.push_str(&self.namespace_table(namespaces).to_string());
                out.push_str("\n\n");
                out.push_str(&self.access_table(access).to_string());
                out.push('\n');
            }
        }
        out.push_str(&self.verdict(diagnosis.is_healthy()));
        out
    }

    pub fn verdict(&self, healthy: bool) -> String {
        if healthy {
            "\nInstallation is OK\n".to_string()
        } else {
            "\nInstallation is incomplete, see the table above for details\n".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctor::{ServerResource, Status};

    fn no_color() -> RenderOptions {
        RenderOptions { color: false }
    }

    #[test]
    fn access_rows_in_input_order() {
        let summary = AccessSummary {
            statuses: vec![
                Status {
                    resource: ServerResource::core("default", "configmaps"),
                    read: AccessStatus::Allowed,
                    write: AccessStatus::Allowed,
                },
                Status {
                    resource: ServerResource::custom("default", "build.projectriff.io", "functions"),
                    read: AccessStatus::Denied,
                    write: AccessStatus::Mixed,
                },
            ],
        };
        let rendered = no_color().access_table(&summary).to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].contains("READ STATUS"));
        assert!(lines[1].contains("core") && lines[1].contains("configmaps"));
        assert!(lines[2].contains("functions") && lines[2].contains("Denied") && lines[2].contains("Mixed"));
        assert!(!rendered.contains('\u{1b}'));
    }

    #[test]
    fn missing_namespaces_are_marked() {
        let summary = NamespaceSummary {
            namespaces: vec![("riff-system".to_string(), false)],
        };
        let rendered = no_color().diagnosis(&Diagnosis::MissingNamespaces(summary));
        assert!(rendered.contains("riff-system"));
        assert!(rendered.contains("Missing"));
        assert!(rendered.contains("incomplete"));
        assert!(!rendered.contains("RESOURCE"));
    }

    #[test]
    fn crd_table_headers() {
        let summary = CrdSummary {
            crds: vec![("streams.streaming.projectriff.io".to_string(), true)],
        };
        let rendered = no_color().crd_table(&summary).to_string();
        assert!(rendered.contains("CUSTOM RESOURCE"));
        assert!(rendered.contains("Deployed"));
    }

    #[test]
    fn colored_output_uses_escape_codes() {
        let summary = NamespaceSummary {
            namespaces: vec![("riff-system".to_string(), true)],
        };
        let rendered = RenderOptions::default().namespace_table(&summary).to_string();
        assert!(rendered.contains('\u{1b}'));
        assert!(RenderOptions::default().verdict(true).contains("Installation is OK"));
    }
}
