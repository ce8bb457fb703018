use std::fmt::Display;

use serde::Serialize;

pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub light: String,
    pub count: u64,
}

/// The most congested lights, highest count first. Equal counts are ordered by
/// light identifier so the report is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankedReport {
    pub entries: Vec<RankedEntry>,
    pub distinct_lights: usize,
    pub total_vehicles: u64,
}

impl RankedReport {
    pub fn from_totals<'a, I>(totals: I, top_n: usize) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a u64)>,
    {
        let mut entries = totals
            .into_iter()
            .map(|(light, count)| RankedEntry {
                light: light.clone(),
                count: *count,
            })
            .collect::<Vec<_>>();

        let distinct_lights = entries.len();
        let total_vehicles = entries.iter().map(|e| e.count).fold(0, u64::saturating_add);

        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.light.cmp(&b.light)));
        entries.truncate(top_n);

        Self {
            entries,
            distinct_lights,
            total_vehicles,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Display for RankedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{} -> {} cars", entry.light, entry.count)?;
        }
        Ok(())
    }
}
