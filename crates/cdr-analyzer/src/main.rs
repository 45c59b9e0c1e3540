mod bootstrap;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;

use cdr_core::models::{AnalysisRequest, DateRange};
use cdr_core::settings::Settings;
use cdr_runtime::session::{Session, SessionEvent};
use cdr_runtime::worker::{Completion, Worker};
use cdr_ui::app::{App, AppOptions};
use cdr_ui::chart_export::export_chart;
use cdr_ui::results_view::result_lines;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(
        &settings.log_level,
        settings.log_file.as_ref(),
        &settings.view,
    )?;

    tracing::info!("CDR Analyzer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Analysis: {}, Top-N: {}, Theme: {}",
        settings.view,
        settings.analysis,
        settings.top_n,
        settings.theme
    );

    let (client, rx, handle) = Worker::start();
    let session = Session::new(client, settings.column_overrides());

    match settings.view.as_str() {
        "report" => {
            let result = run_report(session, rx, &settings).await;
            handle.abort();
            for line in result? {
                println!("{}", line);
            }
        }

        _ => {
            let mut app = App::new(
                session,
                AppOptions {
                    theme: settings.theme.clone(),
                    kind: settings.report_kind(),
                    top_n: settings.top_n(),
                    start: settings.start,
                    end: settings.end,
                },
            );
            if let Some(file) = &settings.file {
                app.open(file);
            }

            // The loop exits on 'q' / Ctrl+C inside the TUI. We also listen for
            // Ctrl+C at the OS level so that signals received while the
            // terminal is in raw mode are handled cleanly.
            tokio::select! {
                result = app.run(rx) => {
                    handle.abort();
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received; shutting down worker");
                    handle.abort();
                }
            }
        }
    }

    Ok(())
}

/// Load, map, analyse and export without a terminal UI.
///
/// Returns the lines to print: the report title followed by one
/// `key: N calls` line per row.
async fn run_report(
    mut session: Session,
    mut rx: mpsc::Receiver<Completion>,
    settings: &Settings,
) -> Result<Vec<String>> {
    let path = settings
        .file
        .as_ref()
        .context("the report view needs a FILE argument")?;

    session.request_load(path)?;
    wait_for(&mut session, &mut rx).await?;
    session.confirm_mapping()?;

    let data = session.data_range();
    let start = settings
        .start
        .or(data.map(|r| r.start()))
        .context("no parseable dates in the file")?;
    let end = settings
        .end
        .or(data.map(|r| r.end()))
        .context("no parseable dates in the file")?;

    session.request_analysis(AnalysisRequest {
        range: DateRange::new(start, end)?,
        kind: settings.report_kind(),
        top_n: settings.top_n(),
    })?;
    wait_for(&mut session, &mut rx).await?;

    let report = session
        .report()
        .cloned()
        .context("the analysis produced no report")?;

    let mut lines = vec![report.title()];
    lines.extend(result_lines(&report));

    if let Some(target) = &settings.export_table {
        session.export_table(target)?;
        tracing::info!("Table written to {}", target.display());
    }
    if let Some(target) = &settings.export_chart {
        export_chart(&report, target)?;
    }

    Ok(lines)
}

/// Apply completions until the outstanding job finishes.
async fn wait_for(session: &mut Session, rx: &mut mpsc::Receiver<Completion>) -> Result<()> {
    while let Some(completion) = rx.recv().await {
        match session.apply(completion) {
            Some(SessionEvent::Failed) => {
                let status = session.status();
                match status.hint {
                    Some(hint) => bail!("{}\n{}", status.message, hint),
                    None => bail!("{}", status.message),
                }
            }
            Some(_) => return Ok(()),
            None => continue,
        }
    }
    bail!("the background worker stopped unexpectedly")
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CSV: &str = "Call Date,Call Time,B Party Number,Main City\n\
                       2024-03-01,08:00:00,0803,Lagos\n\
                       2024-03-01,09:30:00,0805,Lagos\n\
                       2024-03-02,10:00:00,0803,Abuja\n\
                       2024-03-05,11:00:00,0803,Lagos\n";

    fn write_csv(dir: &TempDir) -> String {
        let path = dir.path().join("calls.csv");
        std::fs::write(&path, CSV).unwrap();
        path.to_string_lossy().into_owned()
    }

    async fn report(args: &[&str]) -> Result<Vec<String>> {
        let mut full = vec!["cdr-analyzer", "--view", "report"];
        full.extend_from_slice(args);
        let settings = Settings::try_load_from(full).unwrap();
        let (client, rx, handle) = Worker::start();
        let session = Session::new(client, settings.column_overrides());
        let result = run_report(session, rx, &settings).await;
        handle.abort();
        result
    }

    #[tokio::test]
    async fn test_report_location_default_range() {
        let dir = TempDir::new().unwrap();
        let file = write_csv(&dir);
        let lines = report(&[&file]).await.unwrap();
        assert_eq!(
            lines,
            vec!["Top 10 Common Locations", "Lagos: 3 calls", "Abuja: 1 call"]
        );
    }

    #[tokio::test]
    async fn test_report_numbers_with_range_and_top_n() {
        let dir = TempDir::new().unwrap();
        let file = write_csv(&dir);
        let lines = report(&[
            &file,
            "--analysis",
            "numbers",
            "--start",
            "2024-03-01",
            "--end",
            "2024-03-02",
            "--top-n",
            "1",
        ])
        .await
        .unwrap();
        assert_eq!(lines, vec!["Top 1 Most Called Numbers", "0803: 2 calls"]);
    }

    #[tokio::test]
    async fn test_report_date_volume_exports_csv() {
        let dir = TempDir::new().unwrap();
        let file = write_csv(&dir);
        let out = dir.path().join("volume.csv");
        let lines = report(&[
            &file,
            "--analysis",
            "date",
            "--export-table",
            out.to_str().unwrap(),
        ])
        .await
        .unwrap();
        assert_eq!(lines[1], "2024-03-01: 2 calls");
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "Date,Call Count\n2024-03-01,2\n2024-03-02,1\n2024-03-05,1\n"
        );
    }

    #[tokio::test]
    async fn test_report_empty_range_fails() {
        let dir = TempDir::new().unwrap();
        let file = write_csv(&dir);
        let err = report(&[&file, "--start", "2025-01-01", "--end", "2025-01-31"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("2025-01-01"), "{err}");
    }

    #[tokio::test]
    async fn test_report_column_override() {
        let dir = TempDir::new().unwrap();
        let file = write_csv(&dir);
        // Group "locations" by the called number column instead.
        let lines = report(&[&file, "--main-loc-col", "B Party Number"])
            .await
            .unwrap();
        assert_eq!(lines[1], "0803: 3 calls");
    }

    #[tokio::test]
    async fn test_report_without_file_fails() {
        assert!(report(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_report_missing_file_fails() {
        let err = report(&["/nonexistent/calls.csv"]).await.unwrap_err();
        assert!(err.to_string().starts_with("File not found"), "{err}");
    }

    #[tokio::test]
    async fn test_report_empty_range_carries_hint() {
        let dir = TempDir::new().unwrap();
        let file = write_csv(&dir);
        let err = report(&[&file, "--start", "2024-04-01"]).await;
        // The default end (2024-03-05) is before the start.
        assert!(err.is_err());

        let err = report(&[&file, "--start", "2024-03-03", "--end", "2024-03-04"])
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("Pick a range inside the available dates."),
            "{err}"
        );
    }
}
