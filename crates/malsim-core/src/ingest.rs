//! Loading, validation and aggregation of simulator datasets.

use crate::error::{SimError, SimResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Global time-series dataset written by the simulator.
pub const GLOBAL_STATS_FILE: &str = "global_stats.csv";

/// Per-house time-series dataset written by the simulator.
pub const HOUSE_STATS_FILE: &str = "house_infected.csv";

pub const DAY: &str = "day";
pub const SUSCEPTIBLE_HUMANS: &str = "S";
pub const INFECTED_HUMANS: &str = "I";
pub const RECOVERED_HUMANS: &str = "R";
pub const EXPOSED_MOSQUITOES: &str = "E_mos";
pub const INFECTED_MOSQUITOES: &str = "I_mos";
pub const HOUSE_ID: &str = "houseID";
pub const HOUSE_INFECTED_HUMANS: &str = "infectedHumans";

/// Columns the global dataset must carry.
pub const GLOBAL_COLUMNS: [&str; 6] = [
    DAY,
    SUSCEPTIBLE_HUMANS,
    INFECTED_HUMANS,
    RECOVERED_HUMANS,
    EXPOSED_MOSQUITOES,
    INFECTED_MOSQUITOES,
];

/// Columns the per-house dataset must carry.
pub const HOUSE_COLUMNS: [&str; 3] = [DAY, HOUSE_ID, HOUSE_INFECTED_HUMANS];

/// A parsed numeric table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataset {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl RawDataset {
    /// Parse comma-separated text with a header row.
    pub fn parse(name: &str, text: &str) -> SimResult<Self> {
        let malformed = |reason: String| SimError::MalformedOutput {
            file: name.to_string(),
            reason,
        };

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let Some((_, header)) = lines.next() else {
            return Err(SimError::EmptyOutput {
                file: name.to_string(),
            });
        };
        let columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();

        let mut rows = Vec::new();
        for (line_no, line) in lines {
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != columns.len() {
                return Err(malformed(format!(
                    "line {line_no} has {} fields, header has {}",
                    fields.len(),
                    columns.len()
                )));
            }
            let row = fields
                .iter()
                .map(|f| {
                    let field = f.trim();
                    match field.parse::<f64>() {
                        Ok(value) if value.is_finite() => Ok(value),
                        Ok(_) => Err(malformed(format!(
                            "line {line_no}: `{field}` is not a finite number"
                        ))),
                        Err(_) => Err(malformed(format!(
                            "line {line_no}: `{field}` is not a number"
                        ))),
                    }
                })
                .collect::<SimResult<Vec<f64>>>()?;
            rows.push(row);
        }

        Ok(Self {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of column `name`, in row order.
    pub fn column(&self, name: &str) -> SimResult<Vec<f64>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SimError::MalformedOutput {
                file: self.name.clone(),
                reason: format!("missing column `{name}`"),
            })?;
        Ok(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Fail unless every column in `required` is present.
    pub fn require_columns(&self, required: &[&str]) -> SimResult<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|r| !self.columns.iter().any(|c| c == r))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SimError::MalformedOutput {
                file: self.name.clone(),
                reason: format!("missing column(s): {}", missing.join(", ")),
            })
        }
    }
}

/// Mean infected humans per house on one day.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRow {
    pub day: i64,
    pub average_infected_humans: f64,
}

/// Both datasets of one run, validated.
#[derive(Debug, Clone)]
pub struct IngestedResults {
    pub global: RawDataset,
    pub houses: RawDataset,
}

/// Load and validate the two datasets from `dir`.
pub async fn ingest(dir: &Path) -> SimResult<IngestedResults> {
    let global_path = dir.join(GLOBAL_STATS_FILE);
    let house_path = dir.join(HOUSE_STATS_FILE);

    let mut missing = Vec::new();
    if !tokio::fs::try_exists(&global_path).await? {
        missing.push(GLOBAL_STATS_FILE.to_string());
    }
    if !tokio::fs::try_exists(&house_path).await? {
        missing.push(HOUSE_STATS_FILE.to_string());
    }
    if !missing.is_empty() {
        return Err(SimError::MissingOutput { files: missing });
    }

    let global = load(&global_path, GLOBAL_STATS_FILE, &GLOBAL_COLUMNS).await?;
    let houses = load(&house_path, HOUSE_STATS_FILE, &HOUSE_COLUMNS).await?;
    Ok(IngestedResults { global, houses })
}

async fn load(path: &Path, name: &str, required: &[&str]) -> SimResult<RawDataset> {
    let text = tokio::fs::read_to_string(path).await?;
    let dataset = RawDataset::parse(name, &text)?;
    if dataset.is_empty() {
        return Err(SimError::EmptyOutput {
            file: name.to_string(),
        });
    }
    dataset.require_columns(required)?;
    Ok(dataset)
}

/// Average `infectedHumans` per `day`, in ascending day order.
pub fn aggregate_house_infections(houses: &RawDataset) -> SimResult<Vec<AggregatedRow>> {
    if houses.is_empty() {
        return Err(SimError::EmptyOutput {
            file: houses.name().to_string(),
        });
    }

    let days = houses.column(DAY)?;
    let infected = houses.column(HOUSE_INFECTED_HUMANS)?;

    let mut groups: BTreeMap<i64, (f64, u64)> = BTreeMap::new();
    for (day, count) in days.into_iter().zip(infected) {
        if day.fract() != 0.0 {
            return Err(SimError::MalformedOutput {
                file: houses.name().to_string(),
                reason: format!("day `{day}` is not an integer"),
            });
        }
        let entry = groups.entry(day as i64).or_insert((0.0, 0));
        entry.0 += count;
        entry.1 += 1;
    }

    Ok(groups
        .into_iter()
        .map(|(day, (sum, n))| AggregatedRow {
            day,
            average_infected_humans: sum / n as f64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUSES: &str = "day,houseID,infectedHumans\n1,0,2\n1,1,4\n2,0,1\n";

    #[test]
    fn test_parse_named_columns() {
        let ds = RawDataset::parse("h.csv", HOUSES).unwrap();
        assert_eq!(ds.columns(), &["day", "houseID", "infectedHumans"]);
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.column("infectedHumans").unwrap(), vec![2.0, 4.0, 1.0]);
    }

    #[test]
    fn test_aggregation_groups_by_day() {
        let ds = RawDataset::parse("h.csv", HOUSES).unwrap();
        let rows = aggregate_house_infections(&ds).unwrap();
        assert_eq!(
            rows,
            vec![
                AggregatedRow {
                    day: 1,
                    average_infected_humans: 3.0
                },
                AggregatedRow {
                    day: 2,
                    average_infected_humans: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_aggregation_sorts_unordered_days() {
        let ds = RawDataset::parse(
            "h.csv",
            "day,houseID,infectedHumans\n3,0,6\n1,0,1\n3,1,0\n2,0,5\n",
        )
        .unwrap();
        let days: Vec<i64> = aggregate_house_infections(&ds)
            .unwrap()
            .iter()
            .map(|r| r.day)
            .collect();
        assert_eq!(days, vec![1, 2, 3]);
    }

    #[test]
    fn test_header_only_table_is_empty() {
        let ds = RawDataset::parse("h.csv", "day,houseID,infectedHumans\n").unwrap();
        assert!(ds.is_empty());
        let err = aggregate_house_infections(&ds).unwrap_err();
        assert!(matches!(err, SimError::EmptyOutput { .. }));
    }

    #[test]
    fn test_blank_file_is_empty_output() {
        let err = RawDataset::parse("g.csv", "\n\n").unwrap_err();
        assert!(matches!(err, SimError::EmptyOutput { .. }));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let err = RawDataset::parse("h.csv", "day,houseID,infectedHumans\n1,0\n").unwrap_err();
        match err {
            SimError::MalformedOutput { file, reason } => {
                assert_eq!(file, "h.csv");
                assert!(reason.contains("line 2"));
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_field_is_malformed() {
        let err = RawDataset::parse("h.csv", "day,houseID,infectedHumans\n1,0,lots\n").unwrap_err();
        assert!(err.to_string().contains("`lots` is not a number"));
    }

    #[test]
    fn test_non_finite_field_is_malformed() {
        for field in ["NaN", "inf", "-inf"] {
            let text = format!("day,houseID,infectedHumans\n1,0,{field}\n");
            let err = RawDataset::parse("h.csv", &text).unwrap_err();
            match err {
                SimError::MalformedOutput { reason, .. } => {
                    assert!(reason.contains("line 2"));
                    assert!(reason.contains("not a finite number"), "{reason}");
                }
                other => panic!("expected MalformedOutput for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_column_reported() {
        let ds = RawDataset::parse("g.csv", "day,S,I\n1,2,3\n").unwrap();
        let err = ds.require_columns(&GLOBAL_COLUMNS).unwrap_err();
        assert!(err.to_string().contains("R, E_mos, I_mos"));
    }

    #[tokio::test]
    async fn test_ingest_reports_all_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = ingest(dir.path()).await.unwrap_err();
        match err {
            SimError::MissingOutput { files } => {
                assert_eq!(files, vec![GLOBAL_STATS_FILE, HOUSE_STATS_FILE])
            }
            other => panic!("expected MissingOutput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ingest_reports_one_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HOUSE_STATS_FILE), HOUSES).unwrap();
        let err = ingest(dir.path()).await.unwrap_err();
        match err {
            SimError::MissingOutput { files } => assert_eq!(files, vec![GLOBAL_STATS_FILE]),
            other => panic!("expected MissingOutput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ingest_empty_house_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(GLOBAL_STATS_FILE),
            "day,S,I,R,E_mos,I_mos\n1,90,10,0,3,4\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(HOUSE_STATS_FILE), "day,houseID,infectedHumans\n").unwrap();
        let err = ingest(dir.path()).await.unwrap_err();
        match err {
            SimError::EmptyOutput { file } => assert_eq!(file, HOUSE_STATS_FILE),
            other => panic!("expected EmptyOutput, got {other:?}"),
        }
    }
}
