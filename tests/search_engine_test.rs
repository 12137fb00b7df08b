#[macro_use]
extern crate assert_float_eq;

use std::cell::Cell;

use proptest::prelude::*;
use tempfile::TempDir;

use tracker_tuner::evaluation::{CancelToken, Evaluation};
use tracker_tuner::state::{load_trace, ReplayCache, ResultTrace};
use tracker_tuner::tuner::{ConfigSpace, Parameter, SearchEngine, SearchOptions, SearchReport};
use tracker_tuner::{Configuration, Outcome, TuneError, Value};

fn alpha_space() -> ConfigSpace {
    ConfigSpace::declare(vec![Parameter::floats("alpha", &[0.2, 0.5, 0.8], 0.5)]).unwrap()
}

fn three_space() -> ConfigSpace {
    ConfigSpace::declare(vec![
        Parameter::floats("alpha", &[0.2, 0.5, 0.8], 0.5),
        Parameter::ints("buffer", &[10, 20, 30, 40], 30),
        Parameter::bools("reid", true),
    ])
    .unwrap()
}

fn float(config: &Configuration, name: &str) -> f64 {
    config.get(name).and_then(Value::as_f64).unwrap()
}

/// Scores from the documented alpha scenario: 0.2 → 8, 0.5 → 10, 0.8 → 12.
fn alpha_score(config: &Configuration) -> f64 {
    match float(config, "alpha") {
        a if a == 0.2 => 8.0,
        a if a == 0.5 => 10.0,
        _ => 12.0,
    }
}

/// Smooth bowl peaking at alpha=0.8, buffer=20, reid=false.
fn bowl_score(config: &Configuration) -> f64 {
    let a = float(config, "alpha");
    let b = float(config, "buffer");
    let reid = config.get("reid") == Some(&Value::Bool(true));
    50.0 - 10.0 * (a - 0.8).powi(2) - 0.01 * (b - 20.0).powi(2) - if reid { 1.0 } else { 0.0 }
}

fn run(space: &ConfigSpace, client: impl FnMut(&Configuration) -> Evaluation) -> SearchReport {
    SearchEngine::new(space, client, ResultTrace::in_memory())
        .run()
        .unwrap()
}

#[test]
fn test_alpha_scenario_with_self_skip() {
    let space = alpha_space();
    let report = run(&space, |c: &Configuration| Evaluation::success(alpha_score(c)));

    assert_eq!(report.best_configuration.get("alpha"), Some(&Value::Float(0.8)));
    assert_eq!(report.best_score, 12.0);
    assert_eq!(report.baseline_score, 10.0);
    // Baseline plus 0.2 and 0.8
    assert_eq!(report.trials.len(), 3);
    assert_eq!(report.evaluations, 3);
}

#[test]
fn test_alpha_scenario_without_self_skip() {
    let space = alpha_space();
    let report = SearchEngine::new(
        &space,
        |c: &Configuration| Evaluation::success(alpha_score(c)),
        ResultTrace::in_memory(),
    )
    .with_options(SearchOptions {
        skip_current_value: false,
        retries: 0,
    })
    .run()
    .unwrap();

    assert_eq!(report.best_score, 12.0);
    assert_eq!(report.trials.len(), 4);
}

#[test]
fn test_failed_candidate_is_not_an_improvement() {
    let space = alpha_space();
    let report = run(&space, |c: &Configuration| {
        if float(c, "alpha") == 0.8 {
            Evaluation::failed("inference: timed out after 60s")
        } else {
            Evaluation::success(alpha_score(c))
        }
    });

    assert_eq!(report.best_configuration.get("alpha"), Some(&Value::Float(0.5)));
    assert_eq!(report.best_score, 10.0);

    let failed = &report.trials[2];
    assert_eq!(failed.outcome, Outcome::EvaluationFailed);
    assert_eq!(failed.score, None);
    assert_eq!(failed.detail.as_deref(), Some("inference: timed out after 60s"));
}

#[test]
fn test_unavailable_score_does_not_stop_the_sweep() {
    let space = three_space();
    let report = run(&space, |c: &Configuration| {
        if float(c, "buffer") == 10.0 {
            Evaluation::unavailable("no 'COMBINED' row")
        } else {
            Evaluation::success(bowl_score(c))
        }
    });

    assert!(report.trials.iter().any(|t| t.outcome == Outcome::ScoreUnavailable));
    assert_eq!(report.best_configuration.get("buffer"), Some(&Value::Int(20)));
    assert_eq!(report.best_configuration.get("reid"), Some(&Value::Bool(false)));
}

#[test]
fn test_baseline_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.jsonl");
    let space = alpha_space();
    let calls = Cell::new(0);

    let result = SearchEngine::new(
        &space,
        |_: &Configuration| {
            calls.set(calls.get() + 1);
            Evaluation::failed("inference: exited with status 2")
        },
        ResultTrace::with_sink(&path).unwrap(),
    )
    .run();

    match result {
        Err(TuneError::NoBaselineScore(reason)) => assert!(reason.contains("status 2")),
        other => panic!("expected NoBaselineScore, got {:?}", other.map(|r| r.best_score)),
    }
    assert_eq!(calls.get(), 1);

    // The failed baseline is still on record
    let trials = load_trace(&path).unwrap();
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].outcome, Outcome::EvaluationFailed);
}

/// Position of `config` in the flattened grid of `space`.
fn grid_index(space: &ConfigSpace, config: &Configuration) -> usize {
    space.iteration_order().fold(0, |acc, p| {
        let pos = p.domain.iter().position(|v| config.get(&p.name) == Some(v)).unwrap();
        acc * p.domain.len() + pos
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_best_climbs_one_coordinate_at_a_time(
        table in prop::collection::vec(prop::option::weighted(0.8, -100.0f64..100.0), 24),
        baseline in -100.0f64..100.0,
    ) {
        let space = three_space();
        let baseline_index = grid_index(&space, &space.default_configuration());
        let lookup = |c: &Configuration| {
            let i = grid_index(&space, c);
            let score = if i == baseline_index { Some(baseline) } else { table[i] };
            match score {
                Some(s) => Evaluation::success(s),
                None => Evaluation::failed("inference: exited with status 1"),
            }
        };
        let report = run(&space, lookup);

        prop_assert_eq!(report.baseline_score, baseline);
        prop_assert!(report.best_score >= report.baseline_score);
        prop_assert!(report.evaluations <= space.max_evaluations());

        // Rebuild the incumbent from the trace: every candidate is one step
        // away from it, and only a strictly better success replaces it
        let mut best = report.trials[0].configuration.clone();
        let mut best_score = baseline;
        for trial in &report.trials[1..] {
            let changed = trial
                .configuration
                .iter()
                .filter(|(name, value)| best.get(name) != Some(*value))
                .count();
            prop_assert!(changed <= 1, "trial {} moved {} parameters", trial.sequence_index, changed);

            if trial.comparable_score() > best_score {
                best = trial.configuration.clone();
                best_score = trial.comparable_score();
            }
        }
        prop_assert_eq!(&best, &report.best_configuration);
        prop_assert_eq!(best_score, report.best_score);

        let max_seen = report
            .trials
            .iter()
            .filter_map(|t| if t.is_success() { t.score } else { None })
            .fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(report.best_score, max_seen);
    }
}

#[test]
fn test_committed_values_persist_into_later_scans() {
    let space = three_space();
    let report = run(&space, |c: &Configuration| Evaluation::success(bowl_score(c)));

    // alpha is scanned first and commits 0.8; every later trial carries it
    let alpha_trials = 1 + 2;
    for trial in &report.trials[alpha_trials..] {
        assert_eq!(trial.configuration.get("alpha"), Some(&Value::Float(0.8)));
    }
    // buffer commits 20 before reid is scanned
    let buffer_trials = 3;
    for trial in &report.trials[alpha_trials + buffer_trials..] {
        assert_eq!(trial.configuration.get("buffer"), Some(&Value::Int(20)));
    }

    assert_float_absolute_eq!(report.best_score, 50.0, 1e-9);
}

#[test]
fn test_trial_count_is_independent_of_scores() {
    let space = three_space();
    // 1 baseline + (3 + 4 + 2) candidates - one skipped self-value per parameter
    let expected = 1 + 9 - 3;

    let flat = run(&space, |_: &Configuration| Evaluation::success(1.0));
    let bowl = run(&space, |c: &Configuration| Evaluation::success(bowl_score(c)));
    let failing = run(&space, |c: &Configuration| {
        if c == &space.default_configuration() {
            Evaluation::success(0.0)
        } else {
            Evaluation::failed("metrics: exited with status 1")
        }
    });

    assert_eq!(flat.evaluations, expected);
    assert_eq!(bowl.evaluations, expected);
    assert_eq!(failing.evaluations, expected);
    assert_eq!(space.max_evaluations(), expected + 3);
}

#[test]
fn test_forced_failure_matches_absent_candidate() {
    let with_candidate = ConfigSpace::declare(vec![
        Parameter::floats("alpha", &[0.2, 0.5, 0.8], 0.5),
        Parameter::ints("buffer", &[10, 20, 30, 40], 30),
    ])
    .unwrap();
    let without_candidate = ConfigSpace::declare(vec![
        Parameter::floats("alpha", &[0.2, 0.5], 0.5),
        Parameter::ints("buffer", &[10, 20, 30, 40], 30),
    ])
    .unwrap();
    let score = |c: &Configuration| {
        50.0 - 10.0 * (float(c, "alpha") - 0.8).powi(2) - 0.01 * (float(c, "buffer") - 20.0).powi(2)
    };

    let failed = run(&with_candidate, |c: &Configuration| {
        if float(c, "alpha") == 0.8 {
            Evaluation::failed("inference: exited with status 137")
        } else {
            Evaluation::success(score(c))
        }
    });
    let absent = run(&without_candidate, |c: &Configuration| Evaluation::success(score(c)));

    assert_eq!(failed.best_configuration, absent.best_configuration);
    assert_eq!(failed.best_score, absent.best_score);
}

#[test]
fn test_ties_keep_the_earlier_optimum() {
    let space = alpha_space();
    let report = run(&space, |c: &Configuration| {
        if float(c, "alpha") == 0.8 {
            Evaluation::success(9.0)
        } else {
            Evaluation::success(10.0)
        }
    });

    // 0.2 ties the baseline and must not replace it
    assert_eq!(report.best_configuration.get("alpha"), Some(&Value::Float(0.5)));
    assert_eq!(report.best_score, 10.0);
}

#[test]
fn test_resume_replays_without_evaluating() {
    let dir = TempDir::new().unwrap();
    let first_path = dir.path().join("first.jsonl");
    let space = three_space();

    let first = SearchEngine::new(
        &space,
        |c: &Configuration| Evaluation::success(bowl_score(c)),
        ResultTrace::with_sink(&first_path).unwrap(),
    )
    .run()
    .unwrap();

    let replay = ReplayCache::from_trials(&space, load_trace(&first_path).unwrap(), false).unwrap();
    let calls = Cell::new(0);
    let second = SearchEngine::new(
        &space,
        |_: &Configuration| {
            calls.set(calls.get() + 1);
            Evaluation::failed("should not run")
        },
        ResultTrace::in_memory(),
    )
    .with_replay(replay)
    .run()
    .unwrap();

    assert_eq!(calls.get(), 0);
    assert_eq!(second.evaluations, 0);
    assert_eq!(second.replayed, first.trials.len());
    assert_eq!(second.best_configuration, first.best_configuration);
    assert_eq!(second.best_score, first.best_score);
    assert!(second.trials.iter().all(|t| t.replayed));
}

#[test]
fn test_partial_resume_continues_where_it_stopped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("first.jsonl");
    let space = three_space();

    let first = SearchEngine::new(
        &space,
        |c: &Configuration| Evaluation::success(bowl_score(c)),
        ResultTrace::with_sink(&path).unwrap(),
    )
    .run()
    .unwrap();

    let mut recorded = load_trace(&path).unwrap();
    recorded.truncate(4);
    let replay = ReplayCache::from_trials(&space, recorded, false).unwrap();

    let second = SearchEngine::new(
        &space,
        |c: &Configuration| Evaluation::success(bowl_score(c)),
        ResultTrace::in_memory(),
    )
    .with_replay(replay)
    .run()
    .unwrap();

    assert_eq!(second.replayed, 4);
    assert_eq!(second.evaluations, first.trials.len() - 4);
    assert_eq!(second.best_configuration, first.best_configuration);
}

#[test]
fn test_retry_failed_reevaluates_recorded_failures() {
    let space = alpha_space();
    let first = run(&space, |c: &Configuration| {
        if float(c, "alpha") == 0.8 {
            Evaluation::failed("inference: exited with status 1")
        } else {
            Evaluation::success(alpha_score(c))
        }
    });

    let replay = ReplayCache::from_trials(&space, first.trials, true).unwrap();
    let second = SearchEngine::new(
        &space,
        |c: &Configuration| Evaluation::success(alpha_score(c)),
        ResultTrace::in_memory(),
    )
    .with_replay(replay)
    .run()
    .unwrap();

    assert_eq!(second.evaluations, 1);
    assert_eq!(second.best_score, 12.0);
}

#[test]
fn test_resume_against_changed_space_is_surfaced() {
    let space = alpha_space();
    let first = run(&space, |c: &Configuration| Evaluation::success(alpha_score(c)));

    let narrowed =
        ConfigSpace::declare(vec![Parameter::floats("alpha", &[0.5, 0.8], 0.5)]).unwrap();
    let result = ReplayCache::from_trials(&narrowed, first.trials, false);

    assert!(matches!(
        result,
        Err(TuneError::ResumeMismatch { trial_index: 1, .. })
    ));
}

#[test]
fn test_cancel_before_start() {
    let space = alpha_space();
    let cancel = CancelToken::new();
    cancel.cancel();
    let calls = Cell::new(0);

    let result = SearchEngine::new(
        &space,
        |c: &Configuration| {
            calls.set(calls.get() + 1);
            Evaluation::success(alpha_score(c))
        },
        ResultTrace::in_memory(),
    )
    .with_cancel_token(cancel)
    .run();

    assert!(matches!(result, Err(TuneError::Cancelled(0))));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_cancel_mid_run_discards_interrupted_trial() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.jsonl");
    let space = three_space();
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let calls = Cell::new(0);

    let result = SearchEngine::new(
        &space,
        |c: &Configuration| {
            calls.set(calls.get() + 1);
            if calls.get() == 3 {
                // User aborts while the third evaluation is running
                trigger.cancel();
                return Evaluation::failed("inference: cancelled");
            }
            Evaluation::success(bowl_score(c))
        },
        ResultTrace::with_sink(&path).unwrap(),
    )
    .with_cancel_token(cancel)
    .run();

    assert!(matches!(result, Err(TuneError::Cancelled(2))));
    assert_eq!(calls.get(), 3);

    let trials = load_trace(&path).unwrap();
    assert_eq!(trials.len(), 2);
    assert!(trials.iter().all(|t| t.outcome == Outcome::Success));
}
