//! Projection of simulation results into library-neutral chart data.

use crate::error::SimResult;
use crate::ingest::{
    AggregatedRow, RawDataset, DAY, EXPOSED_MOSQUITOES, INFECTED_HUMANS, INFECTED_MOSQUITOES,
    RECOVERED_HUMANS, SUSCEPTIBLE_HUMANS,
};
use serde::Serialize;

pub const POPULATION_TITLE: &str = "Population Dynamics";
pub const INFECTION_TITLE: &str = "Average House Infection Rate";

/// Population categories in the order they are charted.
pub const POPULATION_SERIES: [(&str, &str); 5] = [
    (SUSCEPTIBLE_HUMANS, "Susceptible Humans"),
    (INFECTED_HUMANS, "Infected Humans"),
    (RECOVERED_HUMANS, "Recovered Humans"),
    (EXPOSED_MOSQUITOES, "Exposed Mosquitoes"),
    (INFECTED_MOSQUITOES, "Infected Mosquitoes"),
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Line,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub kind: SeriesKind,
    pub label: String,
}

impl ChartSeries {
    pub fn line(label: &str, x_values: Vec<f64>, y_values: Vec<f64>) -> Self {
        Self {
            x_values,
            y_values,
            kind: SeriesKind::Line,
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartEnvelope {
    pub series: Vec<ChartSeries>,
    pub title: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
}

/// The two charts returned for a successful run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Plots {
    pub population: ChartEnvelope,
    pub infection: ChartEnvelope,
}

/// Build the population and infection charts. Input order is preserved.
pub fn project(global: &RawDataset, aggregated: &[AggregatedRow]) -> SimResult<Plots> {
    let days = global.column(DAY)?;

    let series = POPULATION_SERIES
        .iter()
        .map(|(column, label)| -> SimResult<ChartSeries> {
            Ok(ChartSeries::line(label, days.clone(), global.column(column)?))
        })
        .collect::<SimResult<Vec<_>>>()?;

    let population = ChartEnvelope {
        series,
        title: POPULATION_TITLE.to_string(),
        x_axis_label: "Day".to_string(),
        y_axis_label: "Count".to_string(),
    };

    let infection = ChartEnvelope {
        series: vec![ChartSeries::line(
            "Average Infected per House",
            aggregated.iter().map(|r| r.day as f64).collect(),
            aggregated.iter().map(|r| r.average_infected_humans).collect(),
        )],
        title: INFECTION_TITLE.to_string(),
        x_axis_label: "Day".to_string(),
        y_axis_label: "Average Infected Humans".to_string(),
    };

    Ok(Plots {
        population,
        infection,
    })
}
