use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use mccbn_rs::io::genotypes::{read_genotypes, read_values, write_genotypes, write_values};
use mccbn_rs::io::params::{FitResultFile, load_fit, save_fit};
use mccbn_rs::io::poset::read_poset;
use mccbn_rs::likelihood::observed_log_likelihood;
use mccbn_rs::sampler::add_noise;
use mccbn_rs::workers::build_pool;
use mccbn_rs::{
    ControlEm, FitOptions, Model, Observations, Poset, Proposal, RngContext,
    SamplingTimes, mcem, progress, sample_genotypes,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ProposalArg {
    Forward,
    Rejection,
}

impl From<ProposalArg> for Proposal {
    fn from(arg: ProposalArg) -> Self {
        match arg {
            ProposalArg::Forward => Proposal::Forward,
            ProposalArg::Rejection => Proposal::Rejection,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "mccbn")]
#[command(about = "Monte Carlo EM for hidden conjunctive Bayesian networks", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Log every EM iteration")]
    verbose: bool,
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit rates and noise level for a given poset
    Fit(FitArgs),
    /// Draw noisy genotypes from a model
    Simulate(SimulateArgs),
    /// Estimate the observed log-likelihood of fitted parameters
    Loglik(LoglikArgs),
}

#[derive(Args, Debug)]
struct DataArgs {
    #[arg(long)]
    poset: PathBuf,
    #[arg(long)]
    genotypes: PathBuf,
    #[arg(long, help = "Sampling time per observation; latent when omitted")]
    times: Option<PathBuf>,
    #[arg(long, help = "Weight per observation; all ones when omitted")]
    weights: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FitArgs {
    #[command(flatten)]
    data: DataArgs,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 1.0)]
    lambda_s: f64,
    #[arg(long, default_value_t = 0.05)]
    epsilon: f64,
    #[arg(long, value_delimiter = ',', help = "Initial rates; all ones when omitted")]
    initial_lambda: Vec<f64>,
    #[arg(short = 'L', long = "n-samples", default_value_t = 100)]
    n_samples: usize,
    #[arg(long, value_enum, default_value_t = ProposalArg::Forward)]
    proposal: ProposalArg,
    #[arg(long, default_value_t = 100)]
    max_iter: usize,
    #[arg(long, default_value_t = 20)]
    update_step_size: usize,
    #[arg(long, default_value_t = 1e-3)]
    tol: f64,
    #[arg(long, default_value_t = 1e6)]
    max_lambda: f64,
    #[arg(long, help = "Double L at every checkpoint that misses the tolerance")]
    adaptive: bool,
    #[arg(long)]
    max_samples: Option<usize>,
    #[arg(long, help = "Replace the poset by its transitive reduction before fitting")]
    reduce: bool,
    #[arg(long, default_value_t = 1)]
    threads: usize,
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(long)]
    poset: PathBuf,
    #[arg(long)]
    n: usize,
    #[arg(long)]
    out_genotypes: PathBuf,
    #[arg(long)]
    out_times: Option<PathBuf>,
    #[arg(long, value_delimiter = ',', help = "Rates; all ones when omitted")]
    lambda: Vec<f64>,
    #[arg(long, default_value_t = 1.0)]
    lambda_s: f64,
    #[arg(long, default_value_t = 0.0)]
    epsilon: f64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

#[derive(Args, Debug)]
struct LoglikArgs {
    #[command(flatten)]
    data: DataArgs,
    #[arg(long, help = "JSON written by `mccbn fit`")]
    params: PathBuf,
    #[arg(short = 'L', long = "n-samples", default_value_t = 1000)]
    n_samples: usize,
    #[arg(long, value_enum, default_value_t = ProposalArg::Forward)]
    proposal: ProposalArg,
    #[arg(long, default_value_t = 1)]
    threads: usize,
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Command::Fit(args) => run_fit(args, &cli),
        Command::Simulate(args) => run_simulate(args),
        Command::Loglik(args) => run_loglik(args, &cli),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn rates_or_ones(rates: &[f64], p: usize) -> Result<Vec<f64>> {
    if rates.is_empty() {
        return Ok(vec![1.0; p]);
    }
    if rates.len() != p {
        bail!("{} rates given for a poset with {} events", rates.len(), p);
    }
    Ok(rates.to_vec())
}

fn load_data(data: &DataArgs, show_progress: bool) -> Result<(Poset, Observations)> {
    let pb = show_progress.then(|| progress::spinner("IO", "Reading poset and genotypes"));
    let poset = read_poset(&data.poset)?;
    let genotypes = read_genotypes(&data.genotypes)?;

    let mut obs = Observations::new(genotypes);
    if let Some(path) = &data.times {
        obs = obs
            .with_sampling_times(read_values(path)?)
            .with_context(|| format!("invalid sampling times in {:?}", path))?;
    }
    if let Some(path) = &data.weights {
        obs = obs
            .with_weights(read_values(path)?)
            .with_context(|| format!("invalid weights in {:?}", path))?;
    }
    if obs.n_events() != poset.n_events() {
        bail!(
            "genotypes have {} events but the poset has {}",
            obs.n_events(),
            poset.n_events()
        );
    }
    if let Some(pb) = pb {
        pb.finish_with_message(format!(
            "Read {} observations over {} events",
            obs.len(),
            obs.n_events()
        ));
    }
    Ok((poset, obs))
}

fn run_fit(args: &FitArgs, cli: &Cli) -> Result<()> {
    let (mut poset, obs) = load_data(&args.data, !cli.no_progress)?;
    if args.reduce {
        poset
            .transitive_reduction()
            .context("cannot reduce the poset")?;
    }
    let lambda = rates_or_ones(&args.initial_lambda, poset.n_events())?;
    let mut model =
        Model::new(poset, lambda, args.lambda_s, args.epsilon).context("invalid initial model")?;

    let options = FitOptions {
        n_samples: args.n_samples,
        proposal: args.proposal.into(),
        control: ControlEm {
            max_iter: args.max_iter,
            update_step_size: args.update_step_size,
            tol: args.tol,
            max_lambda: args.max_lambda,
            adaptive_sample_size: args.adaptive,
            max_sample_size: args.max_samples,
        },
        threads: args.threads,
        verbose: cli.verbose,
        progress: !cli.no_progress,
    };
    let mut ctx = RngContext::new(args.seed).with_verbose(cli.verbose);
    let fit = mcem(&mut model, &obs, &options, &mut ctx).context("MCEM failed")?;

    println!(
        "{:?} after {} iterations, llhood {}",
        fit.status, fit.iterations, fit.llhood
    );

    save_fit(
        &args.out,
        &FitResultFile::from_fit(&fit, args.lambda_s, &options, args.seed),
    )?;
    println!("Fit: {}", args.out.display());
    Ok(())
}

fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let poset = read_poset(&args.poset)?;
    let lambda = rates_or_ones(&args.lambda, poset.n_events())?;
    let model = Model::new(poset, lambda, args.lambda_s, args.epsilon).context("invalid model")?;

    let mut ctx = RngContext::new(args.seed);
    let draws = sample_genotypes(args.n, &model, SamplingTimes::Latent, ctx.rng())?;
    let observed = add_noise(&draws.genotypes, args.epsilon, ctx.rng())?;

    write_genotypes(&args.out_genotypes, &observed)?;
    if let Some(path) = &args.out_times {
        write_values(path, &draws.sampling_times)?;
    }
    println!(
        "Simulated {} genotypes: {}",
        args.n,
        args.out_genotypes.display()
    );
    Ok(())
}

fn run_loglik(args: &LoglikArgs, cli: &Cli) -> Result<()> {
    let (poset, obs) = load_data(&args.data, !cli.no_progress)?;
    let params = load_params_for(&args.params, poset.n_events())?;
    let model = Model::new(poset, params.lambda, params.lambda_s, params.epsilon)
        .context("invalid fitted parameters")?;

    let pool = build_pool(args.threads)?;
    let mut ctx = RngContext::new(args.seed);
    let llhood = observed_log_likelihood(
        &obs,
        &model,
        args.n_samples,
        args.proposal.into(),
        &pool,
        &mut ctx,
    )?;
    println!("{llhood}");
    Ok(())
}

fn load_params_for(path: &Path, p: usize) -> Result<FitResultFile> {
    let params = load_fit(path)?;
    if params.lambda.len() != p {
        bail!(
            "{:?} holds {} rates but the poset has {} events",
            path,
            params.lambda.len(),
            p
        );
    }
    Ok(params)
}
