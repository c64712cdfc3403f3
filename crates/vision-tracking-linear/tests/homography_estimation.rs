use anyhow::Result;
use vision_tracking_core::synthetic::{grid_points, homography_correspondences, map_points, PixelNoise};
use vision_tracking_core::{Mat3, Pt2, Real};
use vision_tracking_linear::{
    Homography, HomographyError, HomographySolver, RansacHomographyOptions,
    RobustHomographyOptions,
};

const OUTLIERS: [usize; 5] = [3, 8, 12, 17, 21];

fn truth() -> Mat3 {
    Mat3::new(0.92, -0.06, 40.0, 0.05, 1.08, -25.0, 1.5e-4, -2e-4, 1.0)
}

fn scene() -> Result<(Vec<Pt2>, Vec<Pt2>)> {
    let b = grid_points(Pt2::new(50.0, 40.0), 5, 5, 90.0);
    let noise = PixelNoise::new(7, 0.1);
    let a = homography_correspondences(&truth(), &b, &noise, &OUTLIERS, 30.0)?;
    Ok((b, a))
}

/// Largest disagreement between two homographies over the scene points, in pixels.
fn max_transfer_gap(h: &Homography, points: &[Pt2]) -> Result<Real> {
    let expected = map_points(&truth(), points)?;
    let mut worst: Real = 0.0;
    for (p, e) in points.iter().zip(expected.iter()) {
        worst = worst.max((h.project(p)? - e).norm());
    }
    Ok(worst)
}

#[test]
fn dlt_round_trip_from_four_points() -> Result<()> {
    let b = vec![
        Pt2::new(12.0, 8.0),
        Pt2::new(410.0, 30.0),
        Pt2::new(390.0, 350.0),
        Pt2::new(25.0, 330.0),
    ];
    let a = map_points(&truth(), &b)?;
    let h = HomographySolver::dlt(&b, &a, true)?;
    let d = h.distance(&Homography::from_matrix(truth()));
    assert!(d < 1e-9, "normalized Frobenius distance {d}");
    assert!((h.matrix()[(2, 2)] - 1.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn ransac_recovers_homography_and_flags_outliers() -> Result<()> {
    let (b, a) = scene()?;
    let opts = RansacHomographyOptions {
        consensus: 20,
        pixel_threshold: 1.0,
        seed: 11,
        ..RansacHomographyOptions::default()
    };
    let est = HomographySolver::ransac(&b, &a, &opts)?;
    assert_eq!(est.outlier_indices(), OUTLIERS.to_vec());
    assert_eq!(est.inlier_count(), 20);
    assert!(est.residual < 0.2, "inlier rms {}", est.residual);

    let gap = max_transfer_gap(&est.homography, &b)?;
    assert!(gap < 0.5, "transfer gap {gap} px");
    Ok(())
}

#[test]
fn robust_recovers_homography_and_flags_outliers() -> Result<()> {
    let (b, a) = scene()?;
    let opts = RobustHomographyOptions {
        iterations: 8,
        ..RobustHomographyOptions::default()
    };
    let est = HomographySolver::robust(&b, &a, &opts)?;
    assert_eq!(est.outlier_indices(), OUTLIERS.to_vec());

    let gap = max_transfer_gap(&est.homography, &b)?;
    assert!(gap < 0.5, "transfer gap {gap} px");
    Ok(())
}

#[test]
fn collinear_points_are_rejected_by_dlt_and_ransac() {
    let b: Vec<Pt2> = (0..4).map(|i| Pt2::new(10.0 * i as Real, 3.0 * i as Real)).collect();
    let a = vec![
        Pt2::new(0.0, 0.0),
        Pt2::new(10.0, 0.0),
        Pt2::new(10.0, 10.0),
        Pt2::new(0.0, 10.0),
    ];

    for normalize in [true, false] {
        let res = HomographySolver::dlt(&b, &a, normalize);
        assert!(
            matches!(res, Err(HomographyError::DegenerateConfiguration(_))),
            "dlt accepted collinear points: {res:?}"
        );
    }
    let res = HomographySolver::ransac(&b, &a, &RansacHomographyOptions::default());
    assert!(matches!(res, Err(HomographyError::DegenerateConfiguration(_))));
}

#[test]
fn ransac_with_only_degenerate_samples_reports_degeneracy() {
    // Three of the four points are collinear: every minimal sample is degenerate.
    let b = vec![
        Pt2::new(0.0, 0.0),
        Pt2::new(50.0, 0.0),
        Pt2::new(100.0, 0.0),
        Pt2::new(40.0, 80.0),
    ];
    let res = HomographySolver::ransac(&b, &b, &RansacHomographyOptions::default());
    assert!(matches!(res, Err(HomographyError::DegenerateConfiguration(_))));
}

#[test]
fn hlm_matches_dlt_on_planar_data() -> Result<()> {
    let b = grid_points(Pt2::new(0.0, 0.0), 4, 4, 50.0);
    let a = map_points(&truth(), &b)?;
    let h_dlt = HomographySolver::dlt(&b, &a, true)?;
    let h_hlm = HomographySolver::hlm(&b, &a, true)?;
    assert!(h_dlt.distance(&h_hlm) < 1e-9);
    Ok(())
}

#[test]
fn options_deserialize_with_defaults() -> Result<()> {
    let opts: RansacHomographyOptions = serde_json::from_str(r#"{ "pixel_threshold": 1.5 }"#)?;
    assert_eq!(opts.pixel_threshold, 1.5);
    assert!(opts.normalize);
    let robust: RobustHomographyOptions = serde_json::from_str(r#"{ "kernel": "huber" }"#)?;
    assert_eq!(robust.iterations, 4);
    Ok(())
}
