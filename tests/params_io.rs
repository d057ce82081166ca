use mccbn_rs::io::params::{FitResultFile, load_fit, save_fit};
use mccbn_rs::opt::EmHistory;
use mccbn_rs::{ControlEm, FitOptions, FitStatus, McemFit, Proposal};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_path(prefix: &str, ext: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is before unix epoch")
        .as_nanos();
    path.push(format!("{prefix}_{}_{}.{}", std::process::id(), nanos, ext));
    path
}

#[test]
fn fit_json_roundtrip() {
    let path = unique_temp_path("mccbn_fit", "json");
    let fit = McemFit {
        lambda: vec![1.25, 0.8, 3.0],
        epsilon: 0.042,
        llhood: -812.5,
        status: FitStatus::Converged,
        iterations: 60,
        n_samples: 200,
        max_lambda: 1e6,
        history: EmHistory::default(),
    };
    let options = FitOptions {
        n_samples: 100,
        proposal: Proposal::Rejection,
        control: ControlEm {
            adaptive_sample_size: true,
            ..ControlEm::default()
        },
        threads: 4,
        verbose: false,
        progress: false,
    };
    let file = FitResultFile::from_fit(&fit, 1.5, &options, 77);
    assert_eq!(file.n_samples, 200);

    save_fit(&path, &file).expect("failed to save fit");
    let loaded = load_fit(&path).expect("failed to load fit");

    assert_eq!(loaded.lambda, fit.lambda);
    assert!((loaded.epsilon - 0.042).abs() < 1e-12);
    assert!((loaded.llhood + 812.5).abs() < 1e-12);
    assert!((loaded.lambda_s - 1.5).abs() < 1e-12);
    assert_eq!(loaded.status, FitStatus::Converged);
    assert_eq!(loaded.iterations, 60);
    assert_eq!(loaded.proposal, Proposal::Rejection);
    assert_eq!(loaded.seed, 77);
    assert_eq!(loaded.threads, 4);
    assert_eq!(loaded.control.max_iter, 100);
    assert!(loaded.control.adaptive_sample_size);
    assert_eq!(loaded.control.max_sample_size, None);

    let text = fs::read_to_string(&path).expect("failed to read fit json");
    assert!(text.contains("\"proposal\": \"rejection\""));
    assert!(text.contains("\"status\": \"converged\""));

    let _ = fs::remove_file(path);
}

#[test]
fn load_fit_rejects_malformed_json() {
    let path = unique_temp_path("mccbn_bad_fit", "json");
    fs::write(&path, "{\"lambda\": [1.0]}").expect("failed to write json");
    let err = load_fit(&path).expect_err("missing fields");
    assert!(format!("{err:#}").contains("failed to parse"));
    let _ = fs::remove_file(path);
}
