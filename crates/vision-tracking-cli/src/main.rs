use std::{fs, path::Path};

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use vision_tracking::{
    Homography, HomographySolver, Pt2, RansacHomographyOptions, Real, RobustHomographyOptions,
};

/// Homography estimation from point correspondences.
#[derive(Debug, Parser)]
#[command(author, version, about = "Estimate the homography mapping points B onto points A")]
struct Args {
    /// Path to JSON file containing `points_b` and `points_a` arrays of `[x, y]`.
    #[arg(long)]
    input: String,

    /// Estimation method.
    #[arg(long, value_enum, default_value_t = Method::Dlt)]
    method: Method,

    /// Optional path to JSON EstimationConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,

    /// Skip Hartley normalization in the closed-form solvers.
    #[arg(long)]
    no_normalize: bool,

    /// Treat the scene as non-planar (HLM only).
    #[arg(long)]
    non_planar: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    Dlt,
    Hlm,
    Ransac,
    Robust,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CorrespondenceInput {
    points_b: Vec<Pt2>,
    points_a: Vec<Pt2>,
}

/// Options of the robust estimators, both optional in the JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct EstimationConfig {
    ransac: RansacHomographyOptions,
    robust: RobustHomographyOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EstimationReport {
    method: String,
    homography: Homography,
    /// RMS transfer error over the inliers (or all points for closed-form methods).
    residual: Real,
    #[serde(skip_serializing_if = "Option::is_none")]
    inliers: Option<Vec<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inlier_count: Option<usize>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

fn rms_transfer_error(h: &Homography, points_b: &[Pt2], points_a: &[Pt2]) -> Real {
    if points_b.is_empty() {
        return 0.0;
    }
    let sum: Real = points_b
        .iter()
        .zip(points_a)
        .map(|(b, a)| h.transfer_error(b, a).powi(2))
        .sum();
    (sum / points_b.len() as Real).sqrt()
}

fn estimate(
    input: &CorrespondenceInput,
    config: &EstimationConfig,
    method: Method,
    normalize: bool,
    planar: bool,
) -> Result<EstimationReport> {
    let (b, a) = (&input.points_b, &input.points_a);
    let name = match method {
        Method::Dlt => "dlt",
        Method::Hlm => "hlm",
        Method::Ransac => "ransac",
        Method::Robust => "robust",
    };
    log::info!("estimating homography from {} correspondences ({name})", b.len());

    let closed_form = |homography: Homography| EstimationReport {
        method: name.to_string(),
        residual: rms_transfer_error(&homography, b, a),
        homography,
        inliers: None,
        inlier_count: None,
    };

    let report = match method {
        Method::Dlt => closed_form(HomographySolver::dlt(b, a, normalize)?),
        Method::Hlm => closed_form(HomographySolver::hlm(b, a, planar)?),
        Method::Ransac | Method::Robust => {
            let est = if method == Method::Ransac {
                HomographySolver::ransac(b, a, &config.ransac)?
            } else {
                HomographySolver::robust(b, a, &config.robust)?
            };
            log::info!("{} / {} inliers", est.inlier_count(), b.len());
            EstimationReport {
                method: name.to_string(),
                homography: est.homography,
                residual: est.residual,
                inlier_count: Some(est.inlier_count()),
                inliers: Some(est.inliers),
            }
        }
    };
    Ok(report)
}

fn run_estimation_from_files(
    input_path: &str,
    config_path: Option<&str>,
    method: Method,
    normalize: bool,
    planar: bool,
) -> Result<String> {
    let input: CorrespondenceInput = load_json_file(Path::new(input_path))?;
    ensure!(
        input.points_b.len() == input.points_a.len(),
        "points_b has {} entries but points_a has {}",
        input.points_b.len(),
        input.points_a.len()
    );

    let config = if let Some(cfg_path) = config_path {
        load_json_file::<EstimationConfig>(Path::new(cfg_path))?
    } else {
        EstimationConfig::default()
    };

    let report = estimate(&input, &config, method, normalize, planar)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let level = if args.debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(level));

    let json = run_estimation_from_files(
        &args.input,
        args.config.as_deref(),
        args.method,
        !args.no_normalize,
        !args.non_planar,
    )?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};
    use tempfile::NamedTempFile;
    use vision_tracking::core::Mat3;
    use vision_tracking::synthetic::{grid_points, homography_correspondences, PixelNoise};

    fn write_json<T: Serialize>(value: &T, path: &Path) {
        serde_json::to_writer_pretty(fs::File::create(path).unwrap(), value).unwrap();
    }

    fn ground_truth() -> Mat3 {
        Mat3::new(1.1, 0.05, 12.0, -0.03, 0.95, -7.0, 1e-4, -2e-4, 1.0)
    }

    fn synthetic_input(outliers: &[usize]) -> CorrespondenceInput {
        let points_b = grid_points(Pt2::new(10.0, 20.0), 6, 5, 40.0);
        let noise = PixelNoise::new(7, 0.0);
        let points_a =
            homography_correspondences(&ground_truth(), &points_b, &noise, outliers, 30.0)
                .unwrap();
        CorrespondenceInput { points_b, points_a }
    }

    fn run(
        input: &CorrespondenceInput,
        config: Option<&EstimationConfig>,
        method: Method,
    ) -> EstimationReport {
        let input_file = NamedTempFile::new().unwrap();
        write_json(input, input_file.path());
        let config_file = NamedTempFile::new().unwrap();
        if let Some(config) = config {
            write_json(config, config_file.path());
        }

        let json = run_estimation_from_files(
            input_file.path().to_str().unwrap(),
            config.map(|_| config_file.path().to_str().unwrap()),
            method,
            true,
            true,
        )
        .expect("cli helper should succeed");
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn dlt_helper_recovers_exact_homography() {
        let input = synthetic_input(&[]);
        let report = run(&input, None, Method::Dlt);
        assert_eq!(report.method, "dlt");
        assert!(report.residual < 1e-6, "residual too high: {}", report.residual);
        assert!(report.inliers.is_none());

        let expected = Homography::from_matrix(ground_truth());
        assert!(
            report.homography.distance(&expected) < 1e-6,
            "estimated {:?}",
            report.homography.matrix()
        );
    }

    #[test]
    fn ransac_helper_flags_outliers() {
        let input = synthetic_input(&[3, 11, 17]);
        let mut config = EstimationConfig::default();
        config.ransac.pixel_threshold = 1.0;
        let report = run(&input, Some(&config), Method::Ransac);

        assert_eq!(report.inlier_count, Some(27));
        let inliers = report.inliers.expect("ransac reports inliers");
        for i in [3, 11, 17] {
            assert!(!inliers[i], "point {i} should be an outlier");
        }
        assert!(report.residual < 1e-6, "residual too high: {}", report.residual);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut input = synthetic_input(&[]);
        input.points_a.pop();
        let input_file = NamedTempFile::new().unwrap();
        write_json(&input, input_file.path());

        let err = run_estimation_from_files(
            input_file.path().to_str().unwrap(),
            None,
            Method::Dlt,
            true,
            true,
        );
        assert!(err.is_err(), "length mismatch should fail");
    }
}
