use rstest::rstest;

use ratingscope::algorithm::{estimate, BucketGeometry, Histogram, PercentileError};

fn histogram(start: f64, width: f64, counts: &[u64]) -> Histogram {
    Histogram::new(BucketGeometry::new(start, width).unwrap(), counts.to_vec())
}

#[rstest]
#[case(&[10], 0.5, 812.5)]
#[case(&[1, 1, 1, 1], 0.5, 850.0)]
#[case(&[1, 1, 1, 1], 0.25, 825.0)]
#[case(&[1, 1, 1, 1], 0.75, 875.0)]
#[case(&[0, 4, 0], 0.5, 837.5)]
#[case(&[3, 1], 0.875, 837.5)]
fn test_known_estimates(#[case] counts: &[u64], #[case] percentile: f64, #[case] expected: f64) {
    let results = estimate(&histogram(800.0, 25.0, counts), &[percentile]).unwrap();

    assert_eq!(results, vec![Ok(expected)]);
}

#[rstest]
#[case(0.0)]
#[case(1.0)]
#[case(-0.01)]
#[case(1.01)]
#[case(f64::INFINITY)]
fn test_out_of_unit_interval(#[case] percentile: f64) {
    let results = estimate(&histogram(800.0, 25.0, &[1, 2, 3]), &[percentile]).unwrap();

    assert_eq!(results, vec![Err(PercentileError::InvalidPercentile(percentile))]);
}

#[rstest]
#[case(&[])]
#[case(&[0])]
#[case(&[0, 0, 0, 0])]
fn test_empty_histograms(#[case] counts: &[u64]) {
    assert_eq!(
        estimate(&histogram(800.0, 25.0, counts), &[0.05, 0.5, 0.95]),
        Err(PercentileError::EmptyHistogram)
    );
}

#[rstest]
#[case(0.0, 1.0)]
#[case(800.0, 25.0)]
#[case(-100.0, 0.5)]
fn test_geometry_only_shifts_and_scales(#[case] start: f64, #[case] width: f64) {
    let counts = [4, 9, 13, 7, 2, 0, 1];
    let unit = estimate(&histogram(0.0, 1.0, &counts), &[0.1, 0.5, 0.9]).unwrap();
    let scaled = estimate(&histogram(start, width, &counts), &[0.1, 0.5, 0.9]).unwrap();

    for (u, s) in unit.iter().zip(scaled.iter()) {
        let expected = start + u.as_ref().unwrap() * width;

        assert!((s.as_ref().unwrap() - expected).abs() < 1e-9);
    }
}

#[test]
fn test_one_bad_request_keeps_the_others() {
    let results = estimate(&histogram(800.0, 25.0, &[1, 1]), &[0.5, 0.0, 0.25]).unwrap();

    assert_eq!(
        results,
        vec![
            Ok(825.0),
            Err(PercentileError::InvalidPercentile(0.0)),
            Ok(812.5)
        ]
    );
}
