use timely_flow::{EstimatorConfig, RateEstimator, ReferenceRtt, Regime, SeedPolicy, TimelyError};

const NIC_BPS: f64 = 10_000_000_000.0;

fn rel_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= b.abs() * 1e-12
}

#[test]
fn test_preset_constants() {
    let basic = EstimatorConfig::basic();
    assert_eq!(basic.seed, SeedPolicy::FairShare);
    assert_eq!(basic.reference_rtt_us(), 20.0);
    assert!(!basic.time_scaled && !basic.bypass_at_line_rate && !basic.floor_at_half_previous);
    assert_eq!(EstimatorConfig::default(), basic);

    let erpc = EstimatorConfig::erpc();
    assert_eq!(erpc.seed, SeedPolicy::LineRate);
    assert_eq!(erpc.reference_rtt_us(), 50.0);
    assert!(erpc.time_scaled && erpc.bypass_at_line_rate && erpc.floor_at_half_previous);
    assert_eq!(erpc.max_rate_for(NIC_BPS), NIC_BPS);
}

#[test]
fn test_erpc_seeds_at_line_rate() {
    let est = RateEstimator::new(NIC_BPS, 3, EstimatorConfig::erpc()).unwrap();
    assert_eq!(est.rate(), NIC_BPS);
    assert_eq!(est.prev_rtt_us(), 2.0);
}

#[test]
fn test_bypass_when_saturated() {
    let mut est = RateEstimator::new(NIC_BPS, 0, EstimatorConfig::erpc()).unwrap();

    assert_eq!(est.observe(50.0, 1.0).unwrap(), Regime::Bypassed);
    assert_eq!(est.observe(12.0, 1.0).unwrap(), Regime::Bypassed);
    assert_eq!(est.rate(), NIC_BPS);
    assert_eq!(est.prev_time_us(), 0.0);
    assert_eq!(est.prev_rtt_us(), 2.0);
    assert_eq!(est.weighted_rtt_diff_us(), 0.0);

    // Above min model RTT the sample is informative again
    assert_eq!(est.observe(51.0, 1.0).unwrap(), Regime::Gradient);
    assert_eq!(est.prev_time_us(), 1.0);
}

#[test]
fn test_bypass_disabled_still_samples() {
    let mut cfg = EstimatorConfig::erpc();
    cfg.bypass_at_line_rate = false;
    let mut est = RateEstimator::new(NIC_BPS, 0, cfg).unwrap();

    assert_eq!(est.observe(30.0, 1.0).unwrap(), Regime::Additive);
    // delta factor 0.5: 1e10 + 5e6 * 0.5, clamped back to capacity
    assert_eq!(est.raw_rate(), 10_002_500_000.0);
    assert_eq!(est.rate(), NIC_BPS);
    assert_eq!(est.prev_time_us(), 1.0);
}

#[test]
fn test_time_scaled_steps() {
    let mut est = RateEstimator::new(NIC_BPS, 0, EstimatorConfig::erpc()).unwrap();

    // 1us since the last sample over a 2us min RTT: half a step
    // 1 - 0.26 * 0.5 * (1 - 1000/2000) = 0.935
    est.update(2000.0, 1.0).unwrap();
    assert!(rel_eq(est.rate(), 9.35e9));

    // 10us gap saturates the factor at 1: 1 - 0.26 * 0.5 = 0.87
    est.update(2000.0, 11.0).unwrap();
    assert!(rel_eq(est.rate(), 9.35e9 * 0.87));

    let mut cfg = EstimatorConfig::erpc();
    cfg.time_scaled = false;
    let mut flat = RateEstimator::new(NIC_BPS, 0, cfg).unwrap();
    flat.update(2000.0, 1.0).unwrap();
    assert!(rel_eq(flat.rate(), 8.7e9));
}

#[test]
fn test_floor_at_half_previous() {
    // 1000us sits on the upper bound: gradient rule, weight 1,
    // error (1000 - 50) / 50 = 19, so the raw rate goes deeply negative
    let mut est = RateEstimator::new(NIC_BPS, 0, EstimatorConfig::erpc()).unwrap();
    assert_eq!(est.observe(1000.0, 10.0).unwrap(), Regime::Gradient);
    assert!(rel_eq(est.raw_rate(), -3.94e10));
    assert_eq!(est.rate(), NIC_BPS * 0.5);

    let mut cfg = EstimatorConfig::erpc();
    cfg.floor_at_half_previous = false;
    let mut unfloored = RateEstimator::new(NIC_BPS, 0, cfg).unwrap();
    unfloored.update(1000.0, 10.0).unwrap();
    assert_eq!(unfloored.rate(), 15_000_000.0);
}

#[test]
fn test_erpc_monotone_decrease() {
    let mut est = RateEstimator::new(NIC_BPS, 0, EstimatorConfig::erpc()).unwrap();
    let mut prev = est.rate();
    for i in 1..=200 {
        let rate = est.update(2000.0, i as f64 * 10.0).unwrap();
        assert!(rate <= prev);
        prev = rate;
    }
    assert_eq!(est.rate(), 15_000_000.0);

    // And climbs back once the path drains
    let mut t = 2_010.0;
    for _ in 0..10 {
        let before = est.rate();
        est.update(30.0, t).unwrap();
        assert!(est.rate() > before);
        t += 10.0;
    }
}

#[test]
fn test_reference_rtt_choice() {
    let mut cfg = EstimatorConfig::basic();
    cfg.reference_rtt = ReferenceRtt::MinModelRtt;
    let mut est = RateEstimator::new(NIC_BPS, 3, cfg).unwrap();

    // Weight 1 but zero error against the 50us reference: rate holds
    assert_eq!(est.observe(50.0, 1.0).unwrap(), Regime::Gradient);
    assert_eq!(est.rate(), 2_500_000_000.0);
}

#[test]
fn test_invalid_configurations() {
    let base = EstimatorConfig::basic();
    let cases: Vec<(f64, EstimatorConfig)> = vec![
        (999_999.0, base),
        (f64::NAN, base),
        (NIC_BPS, EstimatorConfig { alpha: 0.0, ..base }),
        (NIC_BPS, EstimatorConfig { alpha: 1.5, ..base }),
        (NIC_BPS, EstimatorConfig { alpha: f64::NAN, ..base }),
        (NIC_BPS, EstimatorConfig { beta: 0.0, ..base }),
        (NIC_BPS, EstimatorConfig { beta: 1.01, ..base }),
        (NIC_BPS, EstimatorConfig { delta: 500_000.0, ..base }),
        (NIC_BPS, EstimatorConfig { min_rate_bps: 0.0, ..base }),
        (NIC_BPS, EstimatorConfig { max_rate_bps: Some(400_000.0), ..base }),
        (NIC_BPS, EstimatorConfig { max_rate_bps: Some(2.0 * NIC_BPS), ..base }),
        (NIC_BPS, EstimatorConfig { min_rtt_us: 0.0, ..base }),
        (NIC_BPS, EstimatorConfig { min_rtt_us: 50.0, ..base }),
        (NIC_BPS, EstimatorConfig { max_model_rtt_us: 50.0, ..base }),
        (NIC_BPS, EstimatorConfig { max_model_rtt_us: f64::INFINITY, ..base }),
    ];

    for (i, (bw, cfg)) in cases.into_iter().enumerate() {
        assert!(
            matches!(RateEstimator::new(bw, 0, cfg), Err(TimelyError::InvalidConfiguration(_))),
            "case {} accepted",
            i
        );
    }
}

#[test]
fn test_edge_configurations_accepted() {
    let cfg = EstimatorConfig {
        alpha: 1.0,
        beta: 1.0,
        delta: 1_000_000.0,
        max_rate_bps: Some(2_000_000.0),
        ..EstimatorConfig::basic()
    };
    let est = RateEstimator::new(1_000_000.0 * 2.0, 0, cfg).unwrap();
    assert_eq!(est.max_rate_bps(), 2_000_000.0);
    assert_eq!(est.rate(), 2_000_000.0);
}
