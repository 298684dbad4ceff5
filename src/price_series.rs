use chrono::{DateTime, Utc};

/// One hourly bar as delivered by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume_from: Option<f64>,
    pub volume_to: Option<f64>,
}

impl PricePoint {
    /// True when any price or volume field was null or blank at the source.
    pub fn has_missing_field(&self) -> bool {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume_from,
            self.volume_to,
        ]
        .iter()
        .any(Option::is_none)
    }
}

/// Points ordered by strictly increasing timestamp.
///
/// Points are only added through [`PriceSeries::prepend_page`], which sorts and
/// deduplicates each page, so no two points ever share a timestamp. Gaps are
/// allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    #[cfg(test)]
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        sort_and_dedup(&mut points);
        Self { points }
    }

    /// Stitches an older page in front of the accumulated series.
    ///
    /// Points at or after the current first timestamp are dropped, since the
    /// stitched range already holds those hours. Returns how many points were
    /// actually added.
    pub fn prepend_page(&mut self, mut page: Vec<PricePoint>) -> usize {
        sort_and_dedup(&mut page);
        if let Some(first) = self.first_timestamp() {
            page.retain(|p| p.timestamp < first);
        }
        let added = page.len();
        page.append(&mut self.points);
        self.points = page;
        added
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn closes(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.close).collect()
    }
}

fn sort_and_dedup(points: &mut Vec<PricePoint>) {
    // stable sort keeps the first occurrence of a duplicated hour
    points.sort_by_key(|p| p.timestamp);
    points.dedup_by_key(|p| p.timestamp);
}
