use anyhow::{Context, Result};
use rsgrowth::collect::backend::ImageryBackend;
use rsgrowth::collect::global_variables::GROWTH_ANALYSIS_TYPE;
use rsgrowth::geo_core::AnalysisWindow;
use rsgrowth::{AnalysisError, GrowthAnalyzer};
use tracing::{error, info, warn};

use crate::registry::{PlotRecord, PlotRegistry};
use crate::store::{AnalysisRecord, ResultStore};

/// Tally of one worker run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Plots returned by the registry
    pub processed: usize,
    pub stored: usize,
    /// Results already present for the plot and scene date
    pub duplicates: usize,
    pub no_imagery: usize,
    pub missing_geometry: usize,
    pub failed: usize,
}

/// What happened to a single plot
#[derive(Debug)]
enum PlotOutcome {
    Stored,
    DryRun,
    Duplicate,
    NoImagery,
    MissingGeometry,
}

/// Analyse every registered plot once and store new results.
///
/// Only a registry failure aborts the run; any per-plot failure is logged,
/// counted and the next plot is processed.
pub fn run_once<R, S, B>(
    registry: &R,
    store: &mut S,
    analyzer: &GrowthAnalyzer<'_, B>,
    window: AnalysisWindow,
    dry_run: bool,
) -> Result<RunReport>
where
    R: PlotRegistry + ?Sized,
    S: ResultStore + ?Sized,
    B: ImageryBackend + ?Sized,
{
    let plots = registry.fetch_plots().context("Failed to fetch plots")?;
    info!(plots = plots.len(), start = %window.start, end = %window.end, "starting growth run");

    let mut report = RunReport::default();
    for plot in &plots {
        report.processed += 1;
        info!(plot = plot.label(), id = %plot.id, "processing plot");

        match process_plot(plot, store, analyzer, window, dry_run) {
            Ok(PlotOutcome::Stored) => {
                report.stored += 1;
                info!(plot = plot.label(), "stored");
            }
            Ok(PlotOutcome::DryRun) => info!(plot = plot.label(), "dry run, result not stored"),
            Ok(PlotOutcome::Duplicate) => {
                report.duplicates += 1;
                info!(plot = plot.label(), "result already stored, skipping");
            }
            Ok(PlotOutcome::NoImagery) => {
                report.no_imagery += 1;
                warn!(plot = plot.label(), "no imagery, skipping");
            }
            Ok(PlotOutcome::MissingGeometry) => {
                report.missing_geometry += 1;
                warn!(plot = plot.label(), "no geometry, skipping");
            }
            Err(e) => {
                report.failed += 1;
                error!(plot = plot.label(), "analysis failed (skipped): {:#}", e);
            }
        }
    }

    info!(?report, "growth run finished");
    Ok(report)
}

fn process_plot<S, B>(
    plot: &PlotRecord,
    store: &mut S,
    analyzer: &GrowthAnalyzer<'_, B>,
    window: AnalysisWindow,
    dry_run: bool,
) -> Result<PlotOutcome>
where
    S: ResultStore + ?Sized,
    B: ImageryBackend + ?Sized,
{
    if !plot.has_geometry() {
        return Ok(PlotOutcome::MissingGeometry);
    }
    let input = plot.to_input()?;

    let start = window.start.format("%Y-%m-%d").to_string();
    let end = window.end.format("%Y-%m-%d").to_string();
    let result = match analyzer.analyze(&input, &start, &end) {
        Ok(result) => result,
        Err(AnalysisError::NoImagery { .. }) => return Ok(PlotOutcome::NoImagery),
        Err(e) => return Err(e.into()),
    };
    info!(
        plot = plot.label(),
        sensor = %result.sensor,
        date = %result.analysis_date,
        "analysis complete"
    );

    if store.exists(&plot.id, GROWTH_ANALYSIS_TYPE, result.analysis_date)? {
        return Ok(PlotOutcome::Duplicate);
    }
    if dry_run {
        return Ok(PlotOutcome::DryRun);
    }

    let record = AnalysisRecord::new(plot, GROWTH_ANALYSIS_TYPE, &result)?;
    store
        .insert(record)
        .with_context(|| format!("Failed to store result of plot {}", plot.id))?;
    Ok(PlotOutcome::Stored)
}
