use anyhow::Result;
use gitsync::{Caller, StatusReport, SyncEngine, WorkspaceId};

pub async fn run(engine: &SyncEngine, caller: &Caller, workspace: &WorkspaceId) -> Result<()> {
    let report = engine.status(caller, workspace).await?;
    print!("{}", render(workspace, &report));
    Ok(())
}

fn render(workspace: &WorkspaceId, report: &StatusReport) -> String {
    if !report.connected {
        return format!("{workspace} is not connected.\n");
    }

    let mut out = String::new();
    let field = |v: Option<&str>| v.unwrap_or("-").to_owned();

    out.push_str(&format!(
        "Repository:  {}/{}\n",
        field(report.owner.as_deref()),
        field(report.repo.as_deref())
    ));
    out.push_str(&format!("Branch:      {}\n", field(report.branch.as_deref())));
    if let Some(url) = &report.repo_url {
        out.push_str(&format!("URL:         {url}\n"));
    }
    out.push_str(&format!(
        "Tracked:     {}\n",
        report
            .head_tracked
            .as_ref()
            .map_or("(never synced)".to_owned(), |h| h.short().to_owned())
    ));
    if let Some(head) = &report.head_remote {
        out.push_str(&format!("Remote:      {}\n", head.short()));
    }

    match (report.up_to_date, report.behind_by) {
        (Some(true), _) => out.push_str("State:       up to date\n"),
        (Some(false), Some(n)) => out.push_str(&format!("State:       {n} commit(s) behind\n")),
        (Some(false), None) => out.push_str("State:       out of date\n"),
        (None, _) => {}
    }
    if let Some(private) = report.private {
        out.push_str(&format!(
            "Visibility:  {}\n",
            if private { "private" } else { "public" }
        ));
    }
    if let Some(error) = &report.error {
        out.push_str(&format!("Error:       {error}\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsync::ObjectId;

    fn ws() -> WorkspaceId {
        WorkspaceId::new("notes")
    }

    #[test]
    fn disconnected_is_one_line() {
        assert_eq!(
            render(&ws(), &StatusReport::disconnected()),
            "notes is not connected.\n"
        );
    }

    #[test]
    fn behind_report_names_count() {
        let report = StatusReport {
            connected: true,
            owner: Some("octo".into()),
            repo: Some("notes".into()),
            branch: Some("main".into()),
            head_tracked: Some(ObjectId::parse(&"a".repeat(40)).unwrap()),
            head_remote: Some(ObjectId::parse(&"b".repeat(40)).unwrap()),
            up_to_date: Some(false),
            behind_by: Some(2),
            private: Some(true),
            ..StatusReport::default()
        };

        let text = render(&ws(), &report);
        assert!(text.contains("Repository:  octo/notes"));
        assert!(text.contains("Tracked:     aaaaaaa"));
        assert!(text.contains("2 commit(s) behind"));
        assert!(text.contains("private"));
    }

    #[test]
    fn degraded_report_shows_error() {
        let report = StatusReport {
            connected: true,
            branch: Some("main".into()),
            error: Some("remote unreachable: network error".into()),
            ..StatusReport::default()
        };

        let text = render(&ws(), &report);
        assert!(text.contains("Tracked:     (never synced)"));
        assert!(text.contains("Error:       remote unreachable"));
        assert!(!text.contains("State:"));
    }
}
