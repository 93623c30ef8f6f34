#![allow(clippy::float_cmp, clippy::unreadable_literal)]
mod support;

use ratiopix_core::{RatioConfig, RatioPipeline, ThresholdMode, ThresholdPair, ThresholdState};
use support::{FakeOps, FakeStack, LiveCounter, ScriptedPrompt};

fn two_channel(counter: &LiveCounter) -> FakeStack {
    FakeStack::new(
        counter,
        vec![vec![4.0, 4.0, 4.0, 0.0], vec![2.0, 2.0, 2.0, 2.0]],
    )
}

/// Runs `n` series through one pipeline, threading the state, and returns
/// the pair used by each series.
fn run_series(
    mode: ThresholdMode,
    n: usize,
    prompt: &mut ScriptedPrompt,
) -> Vec<ThresholdPair> {
    let counter = LiveCounter::default();
    let pipeline = RatioPipeline::new(FakeOps::default(), RatioConfig::default()).unwrap();
    let mut state = ThresholdState::new(mode);
    let mut used = Vec::new();
    for i in 0..n {
        let label = format!("run.nd2 [series {}/{n}]", i + 1);
        let outcome = pipeline
            .run(two_channel(&counter), &label, state, prompt)
            .unwrap();
        used.push(outcome.threshold);
        state = outcome.state;
    }
    used
}

#[test]
fn test_manual_once_prompts_only_on_first_series() {
    let first = ThresholdPair::new(0.5, 10.0);
    let mut prompt = ScriptedPrompt::new(vec![first, ThresholdPair::new(3.0, 4.0)]);

    let used = run_series(ThresholdMode::ManualOnce, 3, &mut prompt);

    assert_eq!(prompt.calls, 1);
    assert_eq!(prompt.labels, vec!["run.nd2 [series 1/3]"]);
    assert_eq!(used, vec![first, first, first]);
}

#[test]
fn test_fully_manual_prompts_every_series() {
    let answers = vec![
        ThresholdPair::new(0.5, 10.0),
        ThresholdPair::new(1.0, 10.0),
        ThresholdPair::new(1.5, 10.0),
    ];
    let mut prompt = ScriptedPrompt::new(answers.clone());

    let used = run_series(ThresholdMode::FullyManual, 3, &mut prompt);

    assert_eq!(prompt.calls, 3);
    assert_eq!(used, answers);
}

#[test]
fn test_fully_automatic_never_prompts() {
    let mut prompt = ScriptedPrompt::new(Vec::new());
    let used = run_series(ThresholdMode::FullyAutomatic, 5, &mut prompt);
    assert_eq!(prompt.calls, 0);
    assert_eq!(used.len(), 5);
}

#[test]
fn test_ratio_is_masked_quotient() {
    let counter = LiveCounter::default();
    let pipeline = RatioPipeline::new(FakeOps::default(), RatioConfig::default()).unwrap();
    let mut prompt = ScriptedPrompt::new(Vec::new());
    let outcome = pipeline
        .run(
            two_channel(&counter),
            "ratio",
            ThresholdState::new(ThresholdMode::FullyAutomatic),
            &mut prompt,
        )
        .unwrap();

    let ratio = &outcome.ratio.channels[0];
    assert_eq!(&ratio[..3], &[2.0, 2.0, 2.0]);
    assert!(ratio[3].is_nan(), "pixel outside the mask must be NaN");
}

#[test]
fn test_manual_mask_lut_is_restored() {
    // Manual binarization uses the white-background convention; the ratio
    // must still keep the segmented pixels, not the background.
    let counter = LiveCounter::default();
    let pipeline = RatioPipeline::new(FakeOps::default(), RatioConfig::default()).unwrap();
    let mut prompt = ScriptedPrompt::new(vec![ThresholdPair::new(0.5, 10.0)]);
    let outcome = pipeline
        .run(
            two_channel(&counter),
            "manual",
            ThresholdState::new(ThresholdMode::FullyManual),
            &mut prompt,
        )
        .unwrap();
    assert!(!outcome.ratio.inverted);
    assert_eq!(outcome.ratio.channels[0][0], 2.0);
}

#[test]
fn test_failures_release_every_stack() {
    let steps = [
        "align",
        "float",
        "blur",
        "duplicate",
        "background",
        "laplacian",
        "threshold",
        "mask",
        "nan",
        "scale",
        "divide",
        "multiply",
        "calibration",
    ];
    for step in steps {
        let counter = LiveCounter::default();
        let config = RatioConfig::default().with_alignment(true);
        let pipeline = RatioPipeline::new(FakeOps::failing_at(step), config).unwrap();
        let mut prompt = ScriptedPrompt::new(Vec::new());

        let result = pipeline.run(
            two_channel(&counter),
            "failing",
            ThresholdState::new(ThresholdMode::FullyAutomatic),
            &mut prompt,
        );

        assert!(result.is_err(), "step {step} should fail");
        assert_eq!(counter.get(), 0, "stacks leaked after failure in {step}");
    }
}

#[test]
fn test_failed_series_does_not_capture_threshold() {
    let counter = LiveCounter::default();
    let pipeline =
        RatioPipeline::new(FakeOps::failing_at("multiply"), RatioConfig::default()).unwrap();
    let mut prompt = ScriptedPrompt::new(vec![ThresholdPair::new(0.5, 10.0)]);
    let state = ThresholdState::new(ThresholdMode::ManualOnce);

    let result = pipeline.run(two_channel(&counter), "s1", state, &mut prompt);

    assert!(result.is_err());
    assert_eq!(prompt.calls, 1);
    assert!(state.needs_prompt());
}

#[test]
fn test_success_releases_intermediates() {
    let counter = LiveCounter::default();
    let pipeline = RatioPipeline::new(FakeOps::default(), RatioConfig::default()).unwrap();
    let mut prompt = ScriptedPrompt::new(Vec::new());
    let outcome = pipeline
        .run(
            two_channel(&counter),
            "s1",
            ThresholdState::new(ThresholdMode::FullyAutomatic),
            &mut prompt,
        )
        .unwrap();

    // Only the ratio image survives the call.
    assert_eq!(counter.get(), 1);
    drop(outcome);
    assert_eq!(counter.get(), 0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = RatioConfig::default().with_segmentation_channel(0);
    assert!(RatioPipeline::new(FakeOps::default(), config).is_err());
}
