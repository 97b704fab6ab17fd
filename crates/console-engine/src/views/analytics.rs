//! Analytics and reports

use super::ViewContext;
use crate::error::Result;
use crate::export::{ExportArtifact, ExportFormat, ExportTable};
use crate::table::Column;
use chrono::{DateTime, SecondsFormat, Utc};
use console_core::DateRange;
use console_core::types::{Analytics, GrowthPoint, RevenuePoint, Topic, TopicPopularity};
use std::sync::Arc;
use tracing::{debug, info};

fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn growth_columns() -> Vec<Column<GrowthPoint>> {
    vec![
        Column::new("date", "Date", |p: &GrowthPoint| iso(p.date)),
        Column::new("students_total", "Students Total", |p: &GrowthPoint| p.students_total),
    ]
}

fn topic_columns() -> Vec<Column<TopicPopularity>> {
    vec![
        Column::new("topic", "Topic", |t: &TopicPopularity| t.topic.label()),
        Column::new("count", "Count", |t: &TopicPopularity| t.count),
    ]
}

fn revenue_columns() -> Vec<Column<RevenuePoint>> {
    vec![
        Column::new("date", "Date", |p: &RevenuePoint| iso(p.date)),
        Column::new("revenue_inr", "Revenue INR", |p: &RevenuePoint| p.revenue_inr),
    ]
}

/// One analytics series laid out as a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsDataset {
    /// File stem of its export
    pub stem: &'static str,
    /// Report title
    pub title: &'static str,
    /// Header and body cells
    pub table: ExportTable,
}

/// Analytics view; reads only the shared date range
#[derive(Debug)]
pub struct AnalyticsView {
    ctx: ViewContext,
    date_range: DateRange,
    topic_filter: Option<Topic>,
    data: Option<Arc<Analytics>>,
}

impl AnalyticsView {
    /// View over the shell's date range
    pub const fn new(ctx: ViewContext, date_range: DateRange) -> Self {
        Self {
            ctx,
            date_range,
            topic_filter: None,
            data: None,
        }
    }

    /// Shared date range
    pub const fn date_range(&self) -> DateRange {
        self.date_range
    }

    /// Replace the date range; loaded data is dropped when it changes
    pub fn set_date_range(&mut self, range: DateRange) {
        if range != self.date_range {
            self.date_range = range;
            self.data = None;
        }
    }

    /// Current topic filter
    pub const fn topic_filter(&self) -> Option<Topic> {
        self.topic_filter
    }

    /// Show one topic in the popularity chart, `None` for all
    pub const fn set_topic_filter(&mut self, topic: Option<Topic>) {
        self.topic_filter = topic;
    }

    /// Fetch the datasets for the date range
    ///
    /// # Errors
    ///
    /// Returns the classified remote failure.
    pub async fn load(&mut self) -> Result<Arc<Analytics>> {
        let data = Arc::new(self.ctx.admin.analytics(&self.date_range).await?);
        debug!(
            growth = data.growth.len(),
            topics = data.topic_popularity.len(),
            revenue = data.revenue_trend.len(),
            "Analytics loaded"
        );
        self.data = Some(Arc::clone(&data));
        Ok(data)
    }

    /// Loaded datasets
    pub fn data(&self) -> Option<&Analytics> {
        self.data.as_deref()
    }

    /// Topic popularity after the topic filter
    pub fn filtered_topics(&self) -> Vec<&TopicPopularity> {
        self.data
            .as_deref()
            .map(|data| {
                data.topic_popularity
                    .iter()
                    .filter(|t| self.topic_filter.is_none_or(|topic| t.topic == topic))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn datasets(&self, filter_topics: bool) -> Vec<AnalyticsDataset> {
        let Some(data) = self.data.as_deref() else {
            return Vec::new();
        };
        let topics: Vec<&TopicPopularity> = if filter_topics {
            self.filtered_topics()
        } else {
            data.topic_popularity.iter().collect()
        };
        let growth: Vec<&GrowthPoint> = data.growth.iter().collect();
        let revenue: Vec<&RevenuePoint> = data.revenue_trend.iter().collect();

        vec![
            AnalyticsDataset {
                stem: "growth",
                title: "Student Growth",
                table: ExportTable::build(&growth, &growth_columns()),
            },
            AnalyticsDataset {
                stem: "topic_popularity",
                title: "Topic Popularity",
                table: ExportTable::build(&topics, &topic_columns()),
            },
            AnalyticsDataset {
                stem: "revenue_trend",
                title: "Revenue Trend",
                table: ExportTable::build(&revenue, &revenue_columns()),
            },
        ]
    }

    /// Datasets as displayed, topic filter applied
    pub fn display_datasets(&self) -> Vec<AnalyticsDataset> {
        self.datasets(true)
    }

    /// Export the three datasets as separate files
    ///
    /// Topic popularity is exported in full regardless of the topic filter.
    /// Loads the datasets first when nothing is loaded.
    ///
    /// # Errors
    ///
    /// Returns the remote failure of the load, or an export error.
    pub async fn exports(&mut self, format: ExportFormat) -> Result<Vec<ExportArtifact>> {
        if self.data.is_none() {
            self.load().await?;
        }
        let layout = self.ctx.pdf_layout();
        let artifacts = self
            .datasets(false)
            .iter()
            .map(|d| ExportArtifact::render(format, &d.table, d.stem, d.title, layout))
            .collect::<Result<Vec<_>>>()?;
        info!(%format, files = artifacts.len(), "Analytics exported");
        Ok(artifacts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::views::test_support;
    use pretty_assertions::assert_eq;

    fn view() -> (AnalyticsView, console_service::MockBackend) {
        let now = Utc::now();
        let (ctx, backend) = test_support::context(now);
        (AnalyticsView::new(ctx, DateRange::last_days(now, 30)), backend)
    }

    #[tokio::test]
    async fn test_load_and_topic_filter() {
        let (mut view, _backend) = view();
        assert!(view.filtered_topics().is_empty());

        let data = view.load().await.unwrap();
        assert_eq!(data.growth.len(), 31);
        assert_eq!(view.filtered_topics().len(), Topic::ALL.len());

        view.set_topic_filter(Some(Topic::Graphs));
        let topics = view.filtered_topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].topic, Topic::Graphs);
        assert_eq!(view.display_datasets()[1].table.len(), 1);
    }

    #[tokio::test]
    async fn test_date_range_change_drops_data() {
        let (mut view, _backend) = view();
        view.load().await.unwrap();

        let same = view.date_range();
        view.set_date_range(same);
        assert!(view.data().is_some());

        view.set_date_range(DateRange::last_days(Utc::now(), 7));
        assert!(view.data().is_none());
    }

    #[tokio::test]
    async fn test_exports_three_files_with_full_topics() {
        let (mut view, backend) = view();
        view.set_topic_filter(Some(Topic::Dp));

        let artifacts = view.exports(ExportFormat::Csv).await.unwrap();
        assert_eq!(backend.admin.call_count("analytics"), 1);

        let names: Vec<&str> = artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["growth.csv", "topic_popularity.csv", "revenue_trend.csv"]);

        let growth = String::from_utf8(artifacts[0].bytes.clone()).unwrap();
        assert!(growth.starts_with("Date,Students Total\n\""));
        assert!(growth.lines().nth(1).unwrap().contains('T'));

        let topics = String::from_utf8(artifacts[1].bytes.clone()).unwrap();
        assert_eq!(topics.lines().count(), Topic::ALL.len() + 1);

        let revenue = String::from_utf8(artifacts[2].bytes.clone()).unwrap();
        assert!(revenue.starts_with("Date,Revenue INR"));
    }
}
