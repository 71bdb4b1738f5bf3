use anyhow::Result;
use colored::Colorize;
use refine_engine::{AttemptOutcome, AttemptRecord};
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:+.2}%", v * 100.0))
}

fn summary_counts(results: &[ScenarioResult]) -> (usize, usize, usize) {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    (total, passed, total - passed)
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Refine Evaluation Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "============================".cyan())?;

    let (total, passed, failed) = summary_counts(results);
    writeln!(out, "Total evaluations: {total}")?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", failed.to_string().red())?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Closed form: {}  Simulated: {}  Reference: {}  Deviation: {}",
            fmt_opt(result.closed_form, 4),
            fmt_opt(result.simulated_mean(), 4),
            fmt_opt(result.reference, 4),
            fmt_pct(result.deviation)
        )?;
        if let Some(summary) = &result.simulated {
            writeln!(
                out,
                "   Runs: {}  min {}  p50 {}  p90 {}  p99 {}  max {}  guaranteed {:.2}%",
                summary.iterations,
                summary.min,
                summary.p50,
                summary.p90,
                summary.p99,
                summary.max,
                summary.guaranteed_rate() * 100.0
            )?;
        }
        if let Some(consumption) = &result.consumption {
            writeln!(
                out,
                "   Consumes: {:.2} catalyst stacks, {:.2} bonus items over {:.2} attempts",
                consumption.catalyst_stacks, consumption.bonus_items, consumption.attempts
            )?;
        }
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
    }

    if let Some(worst) = results
        .iter()
        .filter_map(|r| r.deviation.map(|d| (r, d.abs())))
        .max_by(|a, b| a.1.total_cmp(&b.1))
    {
        writeln!(out)?;
        writeln!(out, "{}", "📐 Largest deviation".bright_yellow().bold())?;
        writeln!(
            out,
            "{} (seed {}): {}",
            worst.0.scenario_name.yellow(),
            worst.0.seed,
            fmt_pct(worst.0.deviation)
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    writeln!(out, "# Refine Evaluation Results\n")?;

    let (total, passed, failed) = summary_counts(results);
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total evaluations**: {total}")?;
    writeln!(out, "- **Passed**: {passed}")?;
    writeln!(out, "- **Failed**: {failed}\n")?;

    writeln!(out, "## Detailed Results\n")?;
    writeln!(
        out,
        "| Status | Scenario | Seed | Closed form | Simulated | Reference | Deviation |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            out,
            "| {status} | {} | {} | {} | {} | {} | {} |",
            result.scenario_name,
            result.seed,
            fmt_opt(result.closed_form, 4),
            fmt_opt(result.simulated_mean(), 4),
            fmt_opt(result.reference, 4),
            fmt_pct(result.deviation)
        )?;
    }

    let failing: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for result in failing {
            for failure in &result.failures {
                writeln!(out, "- {} (seed {}): {failure}", result.scenario_name, result.seed)?;
            }
        }
    }
    Ok(())
}

pub fn generate_csv_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    writeln!(
        out,
        "scenario,seed,iterations,closed_form,simulated_mean,reference,deviation,p50,p90,p99,passed"
    )?;
    for result in results {
        let percentile = |pick: fn(&refine_engine::SimulationSummary) -> u32| {
            result
                .simulated
                .as_ref()
                .map_or_else(String::new, |summary| pick(summary).to_string())
        };
        let number = |value: Option<f64>| value.map_or_else(String::new, |v| format!("{v:.6}"));
        writeln!(
            out,
            "\"{}\",{},{},{},{},{},{},{},{},{},{}",
            result.scenario_name.replace('"', "\"\""),
            result.seed,
            result.iterations,
            number(result.closed_form),
            number(result.simulated_mean()),
            number(result.reference),
            number(result.deviation),
            percentile(|s| s.p50),
            percentile(|s| s.p90),
            percentile(|s| s.p99),
            result.passed
        )?;
    }
    Ok(())
}

/// Render one attempt sequence for visual inspection.
pub fn generate_trace(out: &mut dyn Write, label: &str, records: &[AttemptRecord]) -> Result<()> {
    writeln!(out, "{}", format!("🎲 Attempt trace: {label}").bright_magenta().bold())?;
    for record in records {
        let outcome = match record.outcome {
            AttemptOutcome::Failure => "failure".red(),
            AttemptOutcome::Success => "success".green(),
            AttemptOutcome::Guaranteed => "guaranteed".bright_green().bold(),
        };
        writeln!(
            out,
            "  #{:<4} p={:.4}  energy={:.4}  {}",
            record.try_index, record.final_probability, record.energy_before, outcome
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "level 11 [none]".to_string(),
            seed: 1337,
            iterations: 0,
            closed_form: Some(5.638),
            simulated: None,
            reference: Some(5.638),
            deviation: Some(0.0),
            consumption: None,
            passed,
            failures: if passed {
                Vec::new()
            } else {
                vec!["drifted".to_string()]
            },
            duration: Duration::from_millis(3),
        }
    }

    fn render(f: impl FnOnce(&mut dyn Write) -> Result<()>) -> String {
        let mut buffer: Vec<u8> = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn markdown_lists_results_and_failures() {
        let results = [sample_result(true), sample_result(false)];
        let content = render(|out| generate_markdown_report(out, &results));
        assert!(content.contains("# Refine Evaluation Results"));
        assert!(content.contains("| ✅ | level 11 [none] | 1337 | 5.6380 |"));
        assert!(content.contains("- level 11 [none] (seed 1337): drifted"));
    }

    #[test]
    fn csv_has_header_and_one_row_per_result() {
        let content = render(|out| generate_csv_report(out, &[sample_result(true)]));
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("scenario,seed"));
        assert!(lines[1].starts_with("\"level 11 [none]\",1337,0,5.638000"));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let content = render(|out| generate_json_report(out, &[sample_result(false)]));
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(!parsed[0].passed);
    }

    #[test]
    fn console_reports_counts() {
        colored::control::set_override(false);
        let content = render(|out| {
            generate_console_report(out, &[sample_result(false)], Duration::from_millis(5))
        });
        assert!(content.contains("Total evaluations: 1"));
        assert!(content.contains("drifted"));
    }

    #[test]
    fn trace_marks_guaranteed_attempts() {
        colored::control::set_override(false);
        let records = [AttemptRecord {
            try_index: 0,
            final_probability: 1.0,
            energy_before: 1.02,
            outcome: AttemptOutcome::Guaranteed,
        }];
        let content = render(|out| generate_trace(out, "level 25", &records));
        assert!(content.contains("guaranteed"));
    }
}
