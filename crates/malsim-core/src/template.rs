//! Simulation template loading and parameter injection.
//!
//! The template is version-locked to the markers below: each substitution
//! must find its marker with the expected default literal, otherwise
//! parameterization fails with [`SimError::TemplateMismatch`] instead of
//! silently producing a simulator that ignores the request.

use crate::error::{SimError, SimResult};
use crate::request::SimulationRequest;
use regex::{NoExpand, Regex};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A `#define NAME <literal>` line the template is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub name: &'static str,
    pub default_literal: &'static str,
}

impl Marker {
    const fn new(name: &'static str, default_literal: &'static str) -> Self {
        Self {
            name,
            default_literal,
        }
    }

    fn expression(&self) -> String {
        format!(
            r"(?m)^[ \t]*#define[ \t]+{}[ \t]+{}[ \t]*$",
            regex::escape(self.name),
            regex::escape(self.default_literal)
        )
    }

    fn define(&self, value: &str) -> String {
        format!("#define {:<17} {}", self.name, value)
    }
}

pub const NUM_HUMANS: Marker = Marker::new("NUM_HUMANS", "20000");
pub const NUM_MOSQUITOES: Marker = Marker::new("NUM_MOSQUITOES", "20000");
pub const NUM_HOUSES: Marker = Marker::new("NUM_HOUSES", "100");
pub const DAYS: Marker = Marker::new("DAYS", "50");
pub const HOURLY_BITING_PROB: Marker = Marker::new(
    "HOURLY_BITING_PROB",
    "(DAILY_BITING_PROB / (double)HOURS_PER_DAY)",
);
pub const DAILY_BITING_PROB: Marker = Marker::new("DAILY_BITING_PROB", "0.3");
pub const MOSQ_MORTALITY: Marker = Marker::new("MOSQ_MORTALITY", "0.1");
pub const ITN_COVERAGE: Marker = Marker::new("ITN_COVERAGE", "0.1");
pub const ITN_EFFICACY: Marker = Marker::new("ITN_EFFICACY", "0.7");
pub const TREATMENT_RATE: Marker = Marker::new("TREATMENT_RATE", "0.1");

/// Every marker the template carries.
pub const MARKERS: [Marker; 10] = [
    NUM_HUMANS,
    NUM_MOSQUITOES,
    NUM_HOUSES,
    DAYS,
    HOURLY_BITING_PROB,
    DAILY_BITING_PROB,
    MOSQ_MORTALITY,
    ITN_COVERAGE,
    ITN_EFFICACY,
    TREATMENT_RATE,
];

type PatternTable = HashMap<&'static str, Regex>;

/// Marker patterns, compiled once per process.
fn pattern(marker: &Marker) -> SimResult<&'static Regex> {
    static PATTERNS: OnceLock<Result<PatternTable, regex::Error>> = OnceLock::new();
    let table = PATTERNS
        .get_or_init(|| {
            MARKERS
                .iter()
                .map(|m| Regex::new(&m.expression()).map(|re| (m.name, re)))
                .collect()
        })
        .as_ref()
        .map_err(|e| SimError::Unexpected(format!("invalid marker pattern: {e}")))?;
    table.get(marker.name).ok_or_else(|| {
        SimError::Unexpected(format!("no pattern registered for marker {}", marker.name))
    })
}

/// Runtime-assignable replacement for the hourly biting probability constant.
const HOURLY_BITING_PROB_VARIABLE: &str =
    "double HOURLY_BITING_PROB = DAILY_BITING_PROB / (double)HOURS_PER_DAY;";

/// Read-only simulation source template.
#[derive(Debug, Clone)]
pub struct SimulationTemplate {
    path: PathBuf,
    text: String,
    digest: String,
}

impl SimulationTemplate {
    /// Wrap template text that did not come from disk.
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let digest = compute_digest(&text);
        Self {
            path: path.into(),
            text,
            digest,
        }
    }

    /// Load the template from its fixed location.
    pub async fn load(path: &Path) -> SimResult<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            SimError::Unexpected(format!(
                "failed to read simulation template {}: {e}",
                path.display()
            ))
        })?;
        Ok(Self::from_text(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// SHA-256 of the template text, hex encoded.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Request-scoped simulation source with all markers substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizedSource {
    text: String,
}

impl ParameterizedSource {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Options that extend the base substitution set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterizeOptions {
    /// Derive biting and mortality rates from the request temperature.
    pub adjust_rates_for_temperature: bool,
}

/// Substitute request values into a copy of `template`.
pub fn parameterize(
    template: &SimulationTemplate,
    request: &SimulationRequest,
    options: ParameterizeOptions,
) -> SimResult<ParameterizedSource> {
    let mut text = template.text().to_string();

    replace_define(&mut text, &NUM_HUMANS, &request.human_population.to_string())?;
    replace_define(
        &mut text,
        &NUM_MOSQUITOES,
        &request.mosquito_population.to_string(),
    )?;
    replace_define(&mut text, &NUM_HOUSES, &request.houses.to_string())?;
    replace_define(&mut text, &DAYS, &request.days.to_string())?;
    replace_marker(&mut text, &HOURLY_BITING_PROB, HOURLY_BITING_PROB_VARIABLE)?;

    if options.adjust_rates_for_temperature {
        let rates = TemperatureRates::at(request.temperature);
        replace_define(&mut text, &DAILY_BITING_PROB, &format!("{:.2}", rates.daily_biting))?;
        replace_define(&mut text, &MOSQ_MORTALITY, &format!("{:.2}", rates.mortality))?;
    }

    if let Some(iv) = request.interventions() {
        replace_define(&mut text, &ITN_COVERAGE, &format!("{:.2}", iv.itn_coverage))?;
        replace_define(&mut text, &ITN_EFFICACY, &format!("{:.2}", iv.itn_efficacy))?;
        replace_define(&mut text, &TREATMENT_RATE, &format!("{:.2}", iv.treatment_rate))?;
    }

    Ok(ParameterizedSource { text })
}

/// Mosquito rates adjusted for ambient temperature around a 25 °C baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRates {
    pub daily_biting: f64,
    pub mortality: f64,
}

impl TemperatureRates {
    pub fn at(temperature: f64) -> Self {
        let delta = temperature - 25.0;
        Self {
            daily_biting: (0.3 * (1.0 + delta * 0.05)).clamp(0.0, 1.0),
            mortality: (0.1 * (1.0 - delta * 0.03)).clamp(0.0, 1.0),
        }
    }
}

fn replace_define(text: &mut String, marker: &Marker, value: &str) -> SimResult<()> {
    replace_marker(text, marker, &marker.define(value))
}

fn replace_marker(text: &mut String, marker: &Marker, replacement: &str) -> SimResult<()> {
    let pattern = pattern(marker)?;
    if !pattern.is_match(text.as_str()) {
        return Err(SimError::TemplateMismatch {
            marker: format!("#define {} {}", marker.name, marker.default_literal),
        });
    }
    *text = pattern
        .replacen(text.as_str(), 1, NoExpand(replacement))
        .into_owned();
    Ok(())
}

fn compute_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// The template shipped with the crate, for tests and tooling.
pub fn bundled_template() -> &'static SimulationTemplate {
    static BUNDLED: OnceLock<SimulationTemplate> = OnceLock::new();
    BUNDLED.get_or_init(|| {
        SimulationTemplate::from_text(
            crate::config::DEFAULT_TEMPLATE_PATH,
            include_str!("../assets/simulation.c"),
        )
    })
}
