use colored::Colorize;
use log::debug;
use refine_engine::{
    ConsumptionEstimate, DataLoader, EvaluationMode, RefineEngine, SimulationSummary,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::plan::Scenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub iterations: usize,
    pub closed_form: Option<f64>,
    pub simulated: Option<SimulationSummary>,
    pub reference: Option<f64>,
    /// Relative deviation of the checked value from its benchmark.
    pub deviation: Option<f64>,
    pub consumption: Option<ConsumptionEstimate>,
    pub passed: bool,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl ScenarioResult {
    pub fn simulated_mean(&self) -> Option<f64> {
        self.simulated.as_ref().map(|summary| summary.mean)
    }
}

pub struct RefineTester<'a, L: DataLoader> {
    engine: &'a RefineEngine<L>,
    tolerance: f64,
    enforce: bool,
    verbose: bool,
}

impl<'a, L: DataLoader> RefineTester<'a, L> {
    pub const fn new(engine: &'a RefineEngine<L>, tolerance: f64, enforce: bool, verbose: bool) -> Self {
        Self {
            engine,
            tolerance,
            enforce,
            verbose,
        }
    }

    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        seeds: &[u64],
        mode: EvaluationMode,
    ) -> Vec<ScenarioResult> {
        seeds
            .iter()
            .map(|&seed| {
                if self.verbose {
                    println!(
                        "🧪 Evaluating {} (seed {seed})",
                        scenario.name.bright_white()
                    );
                }
                self.run_single_scenario(scenario, seed, mode)
            })
            .collect()
    }

    fn run_single_scenario(
        &self,
        scenario: &Scenario,
        seed: u64,
        mode: EvaluationMode,
    ) -> ScenarioResult {
        let start_time = Instant::now();
        let mut result = ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            iterations: mode.iterations().unwrap_or(0),
            closed_form: None,
            simulated: None,
            reference: scenario.reference,
            deviation: None,
            consumption: None,
            passed: true,
            failures: Vec::new(),
            duration: Duration::ZERO,
        };

        match self.engine.evaluate(&scenario.mechanic, mode, seed) {
            Ok(evaluation) => {
                match self.engine.consumption(&evaluation) {
                    Ok(consumption) => result.consumption = consumption,
                    Err(err) => result.failures.push(err.to_string()),
                }
                result.closed_form = evaluation.closed_form;
                result.simulated = evaluation.simulated;
            }
            Err(err) => result.failures.push(err.to_string()),
        }

        let checked = result.simulated_mean().or(result.closed_form);
        let benchmark = result.reference.or(if result.simulated.is_some() {
            result.closed_form
        } else {
            None
        });
        if let (Some(value), Some(benchmark)) = (checked, benchmark)
            && benchmark > 0.0
        {
            let deviation = (value - benchmark) / benchmark;
            result.deviation = Some(deviation);
            debug!("{} seed {seed}: deviation {deviation:+.4}", scenario.name);
            if self.enforce && deviation.abs() > self.tolerance {
                result.failures.push(format!(
                    "mean {value:.4} deviates {:+.2}% from benchmark {benchmark:.4} (tolerance {:.2}%)",
                    deviation * 100.0,
                    self.tolerance * 100.0
                ));
            }
        }

        result.passed = result.failures.is_empty();
        result.duration = start_time.elapsed();

        if self.verbose {
            if result.passed {
                println!("  ✅ {} ({:?})", scenario.name, result.duration);
            } else {
                for failure in &result.failures {
                    println!("  ❌ {}: {}", scenario.name, failure.clone().red());
                }
            }
        }

        result
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::plan::{PlanOptions, build_scenarios};
    use refine_engine::{EmbeddedData, Mechanic, ModifierChoice};

    fn engine() -> RefineEngine<EmbeddedData> {
        RefineEngine::embedded().unwrap()
    }

    #[test]
    fn closed_form_matches_reference_table() {
        let engine = engine();
        let options = PlanOptions {
            levels: vec![11, 25],
            ..PlanOptions::default()
        };
        let tester = RefineTester::new(&engine, 0.001, true, false);
        for scenario in build_scenarios(&engine, &options).unwrap() {
            let results = tester.run_scenario(&scenario, &[1], EvaluationMode::ClosedForm);
            assert!(results[0].passed, "{:?}", results[0].failures);
            assert!(results[0].deviation.unwrap().abs() < 1e-3);
        }
    }

    #[test]
    fn acceptance_flags_out_of_tolerance_means() {
        let engine = engine();
        let scenario = Scenario {
            name: "skewed".to_string(),
            mechanic: Mechanic::single(11, ModifierChoice::NONE),
            reference: Some(50.0),
        };
        let tester = RefineTester::new(&engine, 0.05, true, false);
        let result = &tester.run_scenario(&scenario, &[3], EvaluationMode::MonteCarlo { iterations: 200 })[0];
        assert!(!result.passed);
        assert_eq!(result.failures.len(), 1);

        let relaxed = RefineTester::new(&engine, 0.05, false, false);
        assert!(relaxed.run_scenario(&scenario, &[3], EvaluationMode::MonteCarlo { iterations: 200 })[0].passed);
    }

    #[test]
    fn engine_errors_become_failures() {
        let engine = engine();
        let scenario = Scenario {
            name: "missing".to_string(),
            mechanic: Mechanic::single(99, ModifierChoice::NONE),
            reference: None,
        };
        let tester = RefineTester::new(&engine, 0.05, false, false);
        let result = &tester.run_scenario(&scenario, &[1], EvaluationMode::ClosedForm)[0];
        assert!(!result.passed);
        assert!(result.failures[0].contains("99"));
    }

    #[test]
    fn results_serialize_duration_as_millis() {
        let engine = engine();
        let scenario = Scenario {
            name: "level 12".to_string(),
            mechanic: Mechanic::single(12, ModifierChoice::NONE),
            reference: None,
        };
        let tester = RefineTester::new(&engine, 0.05, false, false);
        let result = &tester.run_scenario(&scenario, &[1], EvaluationMode::ClosedForm)[0];
        let json = serde_json::to_value(result).unwrap();
        assert!(json["duration"].is_u64());
        assert_eq!(json["scenario_name"], "level 12");
    }
}
