//! Experiment Runner for the Accuracy Analysis of the truncated SVD.
//!
//! This executable generates a random low-rank test problem, dense or sparse, computes
//! its full singular value decomposition with `faer` as the ground truth, and then runs
//! IRLB for a range of `nu` values. Every run contributes one CSV row with the worst
//! relative error of the computed singular values, the orthogonality loss of the computed
//! bases, and the cost of the run (iterations, operator products, wall time, peak RSS).

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use faer::{
    prelude::*,
    sparse::{SparseColMat, Triplet},
};
use irlb::{
    IrlbOptions, Operator, Start, TruncatedSvd, compute_truncated_svd, utils::perf::get_peak_rss_kb,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::{path::PathBuf, time::Instant};

/// Storage of the generated test matrix.
#[derive(ValueEnum, Clone, Debug, Copy, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Storage {
    Dense,
    Sparse,
}

/// Command-line arguments for the accuracy experiment.
#[derive(Parser, Debug)]
#[clap(
    name = "accuracy-runner",
    about = "Compares IRLB singular values against a full SVD on random low-rank problems."
)]
struct AccuracyArgs {
    /// Storage of the test matrix.
    #[clap(long, value_enum, default_value_t = Storage::Dense)]
    storage: Storage,

    /// Number of rows.
    #[clap(long, default_value_t = 400)]
    m: usize,

    /// Number of columns.
    #[clap(long, default_value_t = 300)]
    n: usize,

    /// Rank of the dominant part of the matrix.
    #[clap(long, default_value_t = 20)]
    rank: usize,

    /// Magnitude of the full-rank noise added to the low-rank part.
    #[clap(long, default_value_t = 1e-3)]
    noise: f64,

    /// Fraction of nonzero entries in the sparse factors (sparse storage only).
    #[clap(long, default_value_t = 0.05)]
    density: f64,

    /// Smallest number of singular triplets to request.
    #[clap(long, default_value_t = 1)]
    nu_min: usize,

    /// Largest number of singular triplets to request.
    #[clap(long, default_value_t = 10)]
    nu_max: usize,

    /// Working subspace dimension; defaults to `nu + 7`.
    #[clap(long)]
    work: Option<usize>,

    /// Maximum number of restarts per run.
    #[clap(long, default_value_t = 1000)]
    maxit: usize,

    /// Convergence tolerance.
    #[clap(long, default_value_t = 1e-8)]
    tol: f64,

    /// Seed for both the problem generator and the starting vector.
    #[clap(long, default_value_t = 42)]
    seed: u64,

    /// Path to the output CSV file where results will be written.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
}

/// Represents a single row of data for the accuracy analysis CSV.
#[derive(Debug, Serialize)]
struct AccuracyResult {
    storage: Storage,
    nu: usize,
    work: usize,
    /// Status code of the run (0 on convergence).
    status: i32,
    iterations: usize,
    multiplies: usize,
    /// `max_i |s_i - sigma_i| / sigma_1` over the requested values.
    max_relative_error: f64,
    /// `max(||U^T U - I||_max, ||V^T V - I||_max)`.
    orthogonality_loss: f64,
    time_s: f64,
    rss_kb: u64,
}

/// Builds `X Y^T + noise * E` with uniform random factors.
fn dense_problem(args: &AccuracyArgs, rng: &mut StdRng) -> Mat<f64> {
    let x = Mat::from_fn(args.m, args.rank, |_, _| rng.random_range(-1.0..1.0));
    let y = Mat::from_fn(args.n, args.rank, |_, _| rng.random_range(-1.0..1.0));
    let mut a = &x * y.transpose();
    for j in 0..args.n {
        for i in 0..args.m {
            a[(i, j)] += args.noise * rng.random_range(-1.0..1.0);
        }
    }
    a
}

/// Builds a random sparse matrix: `rank` dense-ish rank-one terms over random supports,
/// plus a noisy diagonal so that every column is nonzero.
fn sparse_problem(args: &AccuracyArgs, rng: &mut StdRng) -> Result<SparseColMat<usize, f64>> {
    let mut triplets = Vec::new();
    for r in 0..args.rank {
        let weight = (args.rank - r) as f64;
        for i in 0..args.m {
            for j in 0..args.n {
                if rng.random::<f64>() < args.density / args.rank.max(1) as f64 {
                    triplets.push(Triplet {
                        row: i,
                        col: j,
                        val: weight * rng.random_range(-1.0..1.0),
                    });
                }
            }
        }
    }
    for i in 0..args.m.min(args.n) {
        triplets.push(Triplet {
            row: i,
            col: i,
            val: args.noise * rng.random_range(-1.0..1.0),
        });
    }
    SparseColMat::try_new_from_triplets(args.m, args.n, &triplets)
        .map_err(|e| anyhow!("Failed to assemble sparse matrix: {e:?}"))
}

/// Largest absolute entry of `Q^T Q - I`.
fn orthogonality_loss(q: MatRef<'_, f64>) -> f64 {
    let gram = q.transpose() * q;
    let mut loss: f64 = 0.0;
    for i in 0..gram.nrows() {
        for j in 0..gram.ncols() {
            let expected = if i == j { 1.0 } else { 0.0 };
            loss = loss.max((gram[(i, j)] - expected).abs());
        }
    }
    loss
}

fn summarize(
    args: &AccuracyArgs,
    options: &IrlbOptions,
    out: &TruncatedSvd,
    exact: &[f64],
    time_s: f64,
) -> AccuracyResult {
    let sigma_1 = exact.first().copied().unwrap_or(1.0).max(f64::MIN_POSITIVE);
    let max_relative_error = out
        .values
        .iter()
        .zip(exact)
        .map(|(s, sigma)| (s - sigma).abs() / sigma_1)
        .fold(0.0, f64::max);
    AccuracyResult {
        storage: args.storage,
        nu: options.nu,
        work: options.work,
        status: out.status.code(),
        iterations: out.iterations,
        multiplies: out.multiplies,
        max_relative_error,
        orthogonality_loss: orthogonality_loss(out.u.as_ref())
            .max(orthogonality_loss(out.v.as_ref())),
        time_s,
        rss_kb: get_peak_rss_kb(),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    let args = AccuracyArgs::parse();
    if args.nu_min == 0 || args.nu_min > args.nu_max {
        return Err(anyhow!("Invalid nu range: {}..={}", args.nu_min, args.nu_max));
    }

    log::info!(
        "Generating a {:?} {}x{} problem of rank {} (noise {:e})...",
        args.storage,
        args.m,
        args.n,
        args.rank,
        args.noise
    );
    let mut rng = StdRng::seed_from_u64(args.seed);
    let sparse = match args.storage {
        Storage::Dense => None,
        Storage::Sparse => Some(sparse_problem(&args, &mut rng)?),
    };
    let dense = match &sparse {
        Some(a) => a.as_ref().to_dense(),
        None => dense_problem(&args, &mut rng),
    };

    log::info!("Computing the reference SVD...");
    let exact = dense
        .as_ref()
        .singular_values()
        .map_err(|e| anyhow!("Reference SVD failed: {e:?}"))?;

    let sparse_ref = sparse.as_ref().map(|a| a.as_ref());
    let operator = match &sparse_ref {
        Some(a) => Operator::sparse(a),
        None => Operator::dense(dense.as_ref()),
    };

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create CSV writer for {:?}", &args.output))?;

    for nu in args.nu_min..=args.nu_max {
        let mut options = IrlbOptions::new(nu)
            .with_maxit(args.maxit)
            .with_tol(args.tol)
            .with_seed(args.seed);
        if let Some(work) = args.work {
            options = options.with_work(work);
        }

        let start = Instant::now();
        let out = match compute_truncated_svd(&operator, &options, Start::Random, None) {
            Ok(out) => out,
            Err(e) => {
                log::warn!("nu = {nu}: run failed with status {}: {e}", e.code());
                continue;
            }
        };
        let result = summarize(&args, &options, &out, &exact, start.elapsed().as_secs_f64());
        log::info!(
            "nu = {nu}: status {}, {} products, max relative error {:.3e}",
            result.status,
            result.multiplies,
            result.max_relative_error
        );
        writer.serialize(&result)?;
        writer.flush()?;
    }

    log::info!("Results written to {:?}", args.output);
    Ok(())
}
