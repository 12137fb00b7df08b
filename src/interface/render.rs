use crate::models::Outcome;
use crate::tuner::{ConfigSpace, SearchReport};

/// Display the declared parameters in search order.
pub fn display_space(space: &ConfigSpace) {
    println!();
    println!("=== Config Space ({} parameters) ===", space.parameters().len());
    println!();

    let max_name_len = space
        .parameters()
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(10);

    for (i, parameter) in space.parameters().iter().enumerate() {
        let domain: Vec<String> = parameter.domain.iter().map(|v| v.to_string()).collect();
        println!(
            "{:>3}. {:<width$} [{}] default {} ({})",
            i + 1,
            parameter.name,
            domain.join(", "),
            parameter.default,
            parameter.kind(),
            width = max_name_len
        );
    }

    println!();
    println!("At most {} evaluations per sweep.", space.max_evaluations());
    println!();
}

/// Display the result of a finished sweep.
pub fn display_report(report: &SearchReport) {
    let failed = report
        .trials
        .iter()
        .filter(|t| t.outcome == Outcome::EvaluationFailed)
        .count();
    let unavailable = report
        .trials
        .iter()
        .filter(|t| t.outcome == Outcome::ScoreUnavailable)
        .count();

    println!();
    println!("=== Best Configuration ===");
    println!();

    let max_name_len = report
        .best_configuration
        .names()
        .map(str::len)
        .max()
        .unwrap_or(10);
    for (name, value) in report.best_configuration.iter() {
        println!("  {:<width$} : {}", name, value, width = max_name_len);
    }

    let sign = if report.improvement() >= 0.0 { "+" } else { "" };

    println!();
    println!("--- Summary ---");
    println!("Trials: {} ({} evaluated, {} replayed)", report.trials.len(), report.evaluations, report.replayed);
    println!("Failed: {} evaluation, {} score unavailable", failed, unavailable);
    println!("Baseline score: {:.3}", report.baseline_score);
    println!("Best score: {:.3} ({}{:.3})", report.best_score, sign, report.improvement());
    println!();
}
