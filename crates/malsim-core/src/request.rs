//! Inbound simulation request and its validation.

use crate::config::RequestLimits;
use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Optional intervention settings.
///
/// Fields left out fall back to [`Interventions::default`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Interventions {
    /// Fraction of humans sleeping under an insecticide-treated net.
    pub itn_coverage: f64,

    /// Probability a net blocks a bite.
    pub itn_efficacy: f64,

    /// Fraction of new infections that receive treatment.
    pub treatment_rate: f64,
}

impl Default for Interventions {
    fn default() -> Self {
        Self {
            itn_coverage: 0.0,
            itn_efficacy: 0.7,
            treatment_rate: 0.0,
        }
    }
}

/// Wire shape of intervention fields, all optional and flattened into the request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct InterventionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    itn_coverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    itn_efficacy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    treatment_rate: Option<f64>,
}

impl InterventionFields {
    fn resolve(self) -> Option<Interventions> {
        if self.itn_coverage.is_none() && self.itn_efficacy.is_none() && self.treatment_rate.is_none()
        {
            return None;
        }
        let defaults = Interventions::default();
        Some(Interventions {
            itn_coverage: self.itn_coverage.unwrap_or(defaults.itn_coverage),
            itn_efficacy: self.itn_efficacy.unwrap_or(defaults.itn_efficacy),
            treatment_rate: self.treatment_rate.unwrap_or(defaults.treatment_rate),
        })
    }
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub human_population: u64,
    pub mosquito_population: u64,
    #[serde(alias = "numHouses")]
    pub houses: u64,
    #[serde(alias = "numDays")]
    pub days: u64,
    pub temperature: f64,
    #[serde(flatten)]
    interventions: InterventionFields,
}

impl SimulationRequest {
    pub fn new(
        human_population: u64,
        mosquito_population: u64,
        houses: u64,
        days: u64,
        temperature: f64,
    ) -> Self {
        Self {
            human_population,
            mosquito_population,
            houses,
            days,
            temperature,
            interventions: InterventionFields::default(),
        }
    }

    /// Attach intervention settings.
    pub fn with_interventions(mut self, interventions: Interventions) -> Self {
        self.interventions = InterventionFields {
            itn_coverage: Some(interventions.itn_coverage),
            itn_efficacy: Some(interventions.itn_efficacy),
            treatment_rate: Some(interventions.treatment_rate),
        };
        self
    }

    /// Intervention settings, if the caller supplied any.
    pub fn interventions(&self) -> Option<Interventions> {
        self.interventions.resolve()
    }

    /// Check every field against `limits`.
    pub fn validate(&self, limits: &RequestLimits) -> SimResult<()> {
        check_count("humanPopulation", self.human_population, limits.max_humans)?;
        check_count(
            "mosquitoPopulation",
            self.mosquito_population,
            limits.max_mosquitoes,
        )?;
        check_count("houses", self.houses, limits.max_houses)?;
        check_count("days", self.days, limits.max_days)?;

        if !self.temperature.is_finite() {
            return Err(invalid("temperature must be a finite number"));
        }
        if self.temperature < limits.min_temperature || self.temperature > limits.max_temperature
        {
            return Err(invalid(format!(
                "temperature must be between {} and {}, got {}",
                limits.min_temperature, limits.max_temperature, self.temperature
            )));
        }

        if let Some(iv) = self.interventions() {
            check_fraction("itnCoverage", iv.itn_coverage)?;
            check_fraction("itnEfficacy", iv.itn_efficacy)?;
            check_fraction("treatmentRate", iv.treatment_rate)?;
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SimError {
    SimError::Unexpected(format!("invalid request: {}", message.into()))
}

fn check_count(field: &str, value: u64, max: u64) -> SimResult<()> {
    if value == 0 {
        return Err(invalid(format!("{field} must be positive")));
    }
    if value > max {
        return Err(invalid(format!("{field} must be at most {max}, got {value}")));
    }
    Ok(())
}

fn check_fraction(field: &str, value: f64) -> SimResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{field} must be between 0 and 1, got {value}")));
    }
    Ok(())
}
