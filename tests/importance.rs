use mccbn_rs::importance::{
    emission_probability, expected_statistics, log_bernoulli, log_bernoulli_process,
};
use mccbn_rs::workers::build_pool;
use mccbn_rs::{CbnError, Model, Observations, Proposal, RngContext, importance_weight};
use ndarray::array;

fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

fn chain_model(epsilon: f64) -> Model {
    Model::from_edges(&[(0, 1), (1, 2)], vec![1.0, 2.0, 0.5], 1.0, epsilon).expect("chain model")
}

#[test]
fn log_bernoulli_matches_closed_form() {
    assert_eq!(log_bernoulli(0, 0.0, 7), 0.0);
    assert_eq!(log_bernoulli(0, 0.0, 0), 0.0);
    let expected = 2.0 * 0.1f64.ln() + 3.0 * 0.9f64.ln();
    assert!(approx_eq(log_bernoulli(2, 0.1, 5), expected, 1e-12));
    assert_eq!(
        log_bernoulli_process(&[0, 2], 0.1, 5),
        vec![log_bernoulli(0, 0.1, 5), log_bernoulli(2, 0.1, 5)]
    );
}

#[test]
fn log_bernoulli_stays_finite_without_noise() {
    for p in 1..40 {
        for d in 1..=p {
            let ll = log_bernoulli(d, 0.0, p);
            assert!(ll.is_finite() && ll < 0.0, "d={d} p={p} gives {ll}");
        }
    }
}

#[test]
fn emission_probability_is_exact_at_zero_noise() {
    assert_eq!(emission_probability(0, 0.0, 4), 1.0);
    assert_eq!(emission_probability(1, 0.0, 4), 0.0);
    assert!(approx_eq(
        emission_probability(1, 0.2, 3),
        0.2 * 0.8 * 0.8,
        1e-12
    ));
}

#[test]
fn forward_weights_follow_the_distance() {
    let model = chain_model(0.1);
    let mut ctx = RngContext::new(5);
    let genotype = array![true, false, false];
    let sample = importance_weight(genotype.view(), None, &model, 300, Proposal::Forward, ctx.rng())
        .expect("importance sample");
    assert_eq!(sample.len(), 300);
    assert_eq!(sample.time_diffs.dim(), (300, 3));
    assert!(!sample.random_fallback);
    for (w, &d) in sample.weights.iter().zip(&sample.dist) {
        assert!(*w >= 0.0);
        assert!(approx_eq(*w, 0.1f64.powi(d as i32) * 0.9f64.powi(3 - d as i32), 1e-12));
    }
    assert!(sample.log_mean_weight().is_finite());
    let ed = sample.expected_dist();
    assert!((0.0..=3.0).contains(&ed));
    assert!(sample.expected_time_diffs().iter().all(|t| *t > 0.0));
}

#[test]
fn rejection_weights_are_equal() {
    let model = chain_model(0.1);
    let mut ctx = RngContext::new(8);
    let genotype = array![true, true, false];
    let sample =
        importance_weight(genotype.view(), None, &model, 50, Proposal::Rejection, ctx.rng())
            .expect("importance sample");
    assert_eq!(sample.len(), 50);
    assert!(!sample.random_fallback);
    let first = sample.weights[0];
    assert!(first > 0.0);
    assert!(sample.weights.iter().all(|w| *w == first));
}

#[test]
fn impossible_observation_falls_back_to_uniform_resampling() {
    // Event 1 without event 0 cannot happen on the chain, and with no noise
    // every candidate in the pool has zero emission probability.
    let model = Model::from_edges(&[(0, 1)], vec![1.0, 1.0], 1.0, 0.0).expect("model");
    let mut ctx = RngContext::new(2);
    let genotype = array![false, true];
    let sample =
        importance_weight(genotype.view(), None, &model, 40, Proposal::Rejection, ctx.rng())
            .expect("importance sample");
    assert!(sample.random_fallback);
    assert!(sample.dist.iter().all(|d| *d >= 1));
    assert!(sample.weights.iter().all(|w| w.is_finite() && *w >= 0.0));
    assert!(sample.expected_dist().is_finite());
}

#[test]
fn all_zero_forward_weights_still_give_finite_expectations() {
    let model = Model::from_edges(&[(0, 1)], vec![1.0, 1.0], 1.0, 0.0).expect("model");
    let mut ctx = RngContext::new(4);
    let genotype = array![false, true];
    let sample = importance_weight(genotype.view(), None, &model, 30, Proposal::Forward, ctx.rng())
        .expect("importance sample");
    assert_eq!(sample.weight_sum(), 0.0);
    assert!(sample.expected_dist() >= 1.0);
    assert!(sample.expected_time_diffs().iter().all(|t| t.is_finite()));
}

#[test]
fn known_sampling_time_is_respected() {
    let model = chain_model(0.0);
    let mut ctx = RngContext::new(6);
    let genotype = array![false, false, false];
    let sample =
        importance_weight(genotype.view(), Some(0.0), &model, 20, Proposal::Forward, ctx.rng())
            .expect("importance sample");
    assert!(sample.dist.iter().all(|d| *d == 0));
    assert!(sample.weights.iter().all(|w| *w == 1.0));
}

#[test]
fn bad_inputs_are_rejected() {
    let model = chain_model(0.1);
    let mut ctx = RngContext::new(1);
    let short = array![true, false];
    let err = importance_weight(short.view(), None, &model, 10, Proposal::Forward, ctx.rng())
        .expect_err("wrong width");
    assert!(matches!(err, CbnError::DimensionMismatch { .. }));

    let genotype = array![true, false, false];
    let err = importance_weight(genotype.view(), None, &model, 0, Proposal::Forward, ctx.rng())
        .expect_err("zero samples");
    assert!(matches!(err, CbnError::InvalidParameter { .. }));
}

#[test]
fn expected_statistics_cover_every_observation() {
    let model = chain_model(0.05);
    let obs = Observations::new(array![
        [false, false, false],
        [true, false, false],
        [true, true, false],
        [true, true, true],
        [false, true, true],
    ]);
    let pool = build_pool(2).expect("pool");
    let mut ctx = RngContext::new(12);
    let stats = expected_statistics(&obs, &model, 100, Proposal::Forward, &pool, &mut ctx)
        .expect("statistics");
    assert_eq!(stats.weight_sums.len(), 5);
    assert_eq!(stats.dist.len(), 5);
    assert_eq!(stats.time_diffs.dim(), (5, 3));
    assert!(stats.weight_sums.iter().all(|w| *w > 0.0));
    assert!(stats.time_diffs.iter().all(|t| *t > 0.0 && t.is_finite()));
    // The incompatible genotype needs at least one flip.
    assert!(stats.dist[4] > 0.5);

    let mut again = RngContext::new(12);
    let repeat = expected_statistics(&obs, &model, 100, Proposal::Forward, &pool, &mut again)
        .expect("statistics");
    assert_eq!(stats.dist, repeat.dist);
    assert_eq!(stats.time_diffs, repeat.time_diffs);
}

#[test]
fn distances_beyond_the_event_count_are_capped() {
    assert_eq!(log_bernoulli(5, 0.1, 3), log_bernoulli(3, 0.1, 3));
    assert_eq!(log_bernoulli(9, 0.0, 2), log_bernoulli(2, 0.0, 2));
    assert!(log_bernoulli(5, 0.1, 3).is_finite());
    assert_eq!(emission_probability(4, 0.2, 2), emission_probability(2, 0.2, 2));
    assert!(emission_probability(4, 0.2, 2).is_finite());
}

#[test]
fn expected_distance_stays_within_the_event_count() {
    let model = Model::from_edges(&[], vec![1.0], 1.0, 0.0).expect("single event");
    let genotype = array![true];
    let mut ctx = RngContext::new(17);
    for n_samples in [3, 7, 10, 49] {
        let sample = importance_weight(
            genotype.view(),
            Some(0.0),
            &model,
            n_samples,
            Proposal::Forward,
            ctx.rng(),
        )
        .expect("importance sample");
        assert!(sample.weights.iter().all(|w| *w == 0.0));
        let d = sample.expected_dist();
        assert!(d <= 1.0, "expected dist {d} with L = {n_samples}");
        assert!(approx_eq(d, 1.0, 1e-12));
    }
}
