use super::{Report, ReportSink};
use crate::error::ReportError;
use std::io::Write;

/// Header row; matches the field order of `PermissionRecord`
pub const COLUMNS: &[&str] = &[
    "resource_name",
    "resource_id",
    "branch",
    "identity_descriptor",
    "identity_display_name",
    "identity_kind",
    "permission",
    "access",
    "allow_mask",
    "deny_mask",
    "effective_allow_mask",
    "effective_deny_mask",
    "source_scope",
    "is_direct",
    "member_of",
];

/// One row per record, always with a header
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(inner),
        }
    }

    pub fn into_inner(self) -> Result<W, ReportError> {
        self.writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}

impl<W: Write> ReportSink for CsvSink<W> {
    fn write(&mut self, report: &Report<'_>) -> Result<(), ReportError> {
        self.writer.write_record(COLUMNS)?;
        for record in report.records {
            self.writer.serialize(record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::scope::Resource;
    use crate::permissions::{
        Access, AccessControlEntry, Identity, PermissionRecord, RunSummary, ScopeKind,
    };

    fn render(records: &[PermissionRecord]) -> String {
        let summary = RunSummary::default();
        let report = Report {
            organization: "https://dev.azure.com/contoso",
            project: "Fabrikam",
            summary: &summary,
            records,
        };
        let mut sink = CsvSink::new(Vec::new());
        sink.write(&report).unwrap();
        String::from_utf8(sink.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_report_has_header() {
        let output = render(&[]);
        assert_eq!(output.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn test_row_layout() {
        let resource = Resource::repository("p", "r-1", "web");
        let alice = Identity::user("user:alice", "alice");
        let mut ace = AccessControlEntry::new("user:alice", 6, 0);
        ace.effective_allow = Some(14);
        let with_effective = PermissionRecord::direct(
            &resource,
            &alice,
            "Read",
            Access::Allow,
            &ace,
            ScopeKind::Repository,
            true,
        );
        let without_effective = PermissionRecord::direct(
            &resource,
            &alice,
            "Contribute",
            Access::Allow,
            &AccessControlEntry::new("user:alice", 6, 0),
            ScopeKind::Repository,
            true,
        );

        let output = render(&[with_effective, without_effective]);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "web,r-1,,user:alice,alice,User,Read,Allow,6,0,14,,Repository,true,"
        );
        assert_eq!(
            lines[2],
            "web,r-1,,user:alice,alice,User,Contribute,Allow,6,0,,,Repository,true,"
        );
    }
}
