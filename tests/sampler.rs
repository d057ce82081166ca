use mccbn_rs::sampler::{add_noise, hamming_dist, hamming_dist_mat};
use mccbn_rs::{CbnError, Model, Poset, RngContext, SamplingTimes, sample, sample_genotypes};
use ndarray::{Array2, array};
use proptest::prelude::*;

fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

fn chain_model(p: usize) -> Model {
    let edges: Vec<(usize, usize)> = (1..p).map(|j| (j - 1, j)).collect();
    Model::from_edges(&edges, vec![1.0; p], 1.0, 0.0).expect("chain model")
}

#[test]
fn draws_have_expected_shapes() {
    let model = chain_model(4);
    let draws = sample(25, &model, SamplingTimes::Latent, 3).expect("sample");
    assert_eq!(draws.genotypes.dim(), (25, 4));
    assert_eq!(draws.time_diffs.dim(), (25, 4));
    assert_eq!(draws.sampling_times.len(), 25);
    assert!(draws.time_diffs.iter().all(|t| *t > 0.0 && t.is_finite()));
    assert!(draws.sampling_times.iter().all(|t| *t > 0.0 && t.is_finite()));
}

#[test]
fn model_without_events_yields_empty_rows() {
    let model = Model::new(Poset::empty(0), Vec::new(), 1.0, 0.0).expect("empty model");
    let draws = sample(50, &model, SamplingTimes::Latent, 1).expect("sample");
    assert_eq!(draws.genotypes.dim(), (50, 0));
    assert_eq!(draws.time_diffs.dim(), (50, 0));
    assert_eq!(draws.sampling_times.len(), 50);
}

#[test]
fn fixed_sampling_time_is_used_for_every_draw() {
    let model = chain_model(3);
    let draws = sample(40, &model, SamplingTimes::Constant(0.0), 9).expect("sample");
    assert!(draws.sampling_times.iter().all(|t| *t == 0.0));
    assert!(draws.genotypes.iter().all(|g| !g));

    let draws = sample(40, &model, SamplingTimes::Constant(1e9), 9).expect("sample");
    assert!(draws.genotypes.iter().all(|g| *g));
}

#[test]
fn per_draw_times_must_match_the_number_of_draws() {
    let model = chain_model(2);
    let times = [0.5, 1.0, 2.0];
    let draws = sample(3, &model, SamplingTimes::PerDraw(&times), 5).expect("sample");
    assert_eq!(draws.sampling_times, times.to_vec());

    let err = sample(4, &model, SamplingTimes::PerDraw(&times), 5).expect_err("length mismatch");
    assert!(matches!(
        err,
        CbnError::DimensionMismatch {
            expected: 4,
            found: 3,
            ..
        }
    ));
}

#[test]
fn same_seed_gives_identical_draws() {
    let model = chain_model(5);
    let a = sample(100, &model, SamplingTimes::Latent, 42).expect("sample");
    let b = sample(100, &model, SamplingTimes::Latent, 42).expect("sample");
    assert_eq!(a.genotypes, b.genotypes);
    assert_eq!(a.time_diffs, b.time_diffs);
    assert_eq!(a.sampling_times, b.sampling_times);

    let c = sample(100, &model, SamplingTimes::Latent, 43).expect("sample");
    assert_ne!(a.time_diffs, c.time_diffs);
}

#[test]
fn single_event_frequency_matches_race_against_sampling() {
    // P(T <= S) = lambda / (lambda + lambda_s) for independent exponentials.
    let model = Model::new(Poset::empty(1), vec![3.0], 1.0, 0.0).expect("model");
    let draws = sample(20_000, &model, SamplingTimes::Latent, 11).expect("sample");
    let freq = draws.genotypes.iter().filter(|g| **g).count() as f64 / 20_000.0;
    assert!(approx_eq(freq, 0.75, 0.02), "frequency {freq}");
}

#[test]
fn hamming_distance_is_symmetric_and_rowwise() {
    let x = array![true, false, true, true];
    let y = array![false, false, true, false];
    assert_eq!(hamming_dist(x.view(), y.view()), 2);
    assert_eq!(hamming_dist(y.view(), x.view()), 2);
    assert_eq!(hamming_dist(x.view(), x.view()), 0);

    let m = array![[true, false, true, true], [false, false, true, false], [false, true, false, false]];
    assert_eq!(hamming_dist_mat(m.view(), y.view()), vec![2, 0, 2]);
}

#[test]
fn noise_of_zero_is_identity_and_one_flips_everything() {
    let g = array![[true, false], [false, false], [true, true]];
    let mut ctx = RngContext::new(0);
    assert_eq!(add_noise(&g, 0.0, ctx.rng()).expect("noise"), g);
    assert_eq!(add_noise(&g, 1.0, ctx.rng()).expect("noise"), g.mapv(|x| !x));
    assert!(add_noise(&g, 1.5, ctx.rng()).is_err());
}

#[test]
fn noise_rate_is_close_to_epsilon() {
    let g = Array2::from_elem((200, 50), false);
    let mut ctx = RngContext::new(17);
    let noisy = add_noise(&g, 0.1, ctx.rng()).expect("noise");
    let rate = noisy.iter().filter(|x| **x).count() as f64 / 10_000.0;
    assert!(approx_eq(rate, 0.1, 0.015), "flip rate {rate}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn true_genotypes_never_violate_the_poset(
        n_events in 1usize..8,
        pairs in proptest::collection::vec((0usize..8, 0usize..8), 0..20),
        rates in proptest::collection::vec(0.1f64..5.0, 8),
        seed in any::<u64>(),
    ) {
        let edges: Vec<(usize, usize)> = pairs
            .into_iter()
            .filter(|(a, b)| a < b && *b < n_events)
            .collect();
        let model = Model::from_edges(&edges, rates[..n_events].to_vec(), 1.0, 0.0)
            .expect("random DAG model");
        let mut ctx = RngContext::new(seed);
        let draws = sample_genotypes(200, &model, SamplingTimes::Latent, ctx.rng())
            .expect("sample");
        for row in draws.genotypes.outer_iter() {
            for &(u, v) in &edges {
                prop_assert!(!row[v] || row[u]);
            }
            prop_assert!(model.poset().is_compatible(row).expect("width"));
        }
    }
}
