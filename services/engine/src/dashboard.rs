//! Dashboard context: grain selection and the aggregate snapshot.
//!
//! Owned by the session and passed the currently filtered rows on each render.

use std::borrow::Borrow;

use serde::Serialize;
use tracing::debug;

use crate::aggregate::{
    build_time_series, group_counts, group_counts_stacked, top_n, CategoryCount, Grain,
    StackedCount, TimeSeries,
};
use crate::matrix::{build_completion_matrix, MatrixTable};
use crate::record::{Field, Record};

/// Everything the presentation layer draws for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub grain: Grain,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub time_series: TimeSeries,
    pub time_range: Option<String>,
    pub cumulative: TimeSeries,
    pub status: Vec<CategoryCount>,
    pub disciplines: Vec<StackedCount>,
    pub responsibles: Vec<StackedCount>,
    pub matrix: MatrixTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    grain: Grain,
    levels_enabled: bool,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            grain: Grain::Daily,
            levels_enabled: false,
        }
    }

    pub fn grain(&self) -> Grain {
        self.grain
    }

    pub fn levels_enabled(&self) -> bool {
        self.levels_enabled
    }

    /// Daily is always selectable; coarser grains need loaded data.
    pub fn is_selectable(&self, grain: Grain) -> bool {
        grain == Grain::Daily || self.levels_enabled
    }

    /// Returns false, leaving the grain unchanged, when `grain` is disabled.
    pub fn set_grain(&mut self, grain: Grain) -> bool {
        if !self.is_selectable(grain) {
            debug!(%grain, "grain not selectable");
            return false;
        }
        self.grain = grain;
        true
    }

    /// Disabling the coarser grains falls back to daily.
    pub fn set_levels_enabled(&mut self, enabled: bool) {
        self.levels_enabled = enabled;
        if !enabled {
            self.grain = Grain::Daily;
        }
    }

    /// Chart title for the grain-aware series.
    pub fn series_title(&self) -> String {
        format!("{} - {} Count", Field::Actual, self.grain.title())
    }

    pub fn render<R: Borrow<Record>>(
        &self,
        filtered: &[R],
        total_rows: usize,
        resp_top_n: usize,
    ) -> DashboardSnapshot {
        let time_series = build_time_series(filtered, Field::Actual, self.grain);
        let cumulative = build_time_series(filtered, Field::Actual, Grain::Daily).cumulative();
        let time_range = time_series.range_summary();

        DashboardSnapshot {
            grain: self.grain,
            total_rows,
            filtered_rows: filtered.len(),
            time_series,
            time_range,
            cumulative,
            status: group_counts(filtered, Field::Status),
            disciplines: group_counts_stacked(filtered, Field::CertDisc),
            responsibles: top_n(group_counts_stacked(filtered, Field::RespId), resp_top_n),
            matrix: build_completion_matrix(filtered),
        }
    }
}
