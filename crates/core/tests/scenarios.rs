use esg_kpi_core::{
    analyze_file, compute_benchmark, confidence_histogram, cosine_similarity, validate,
    EngineError, FilterContext, KpiRecord, RawKpi,
};

fn record(source: &str, topic: &str, value: f64, confidence: f64) -> KpiRecord {
    validate(
        &RawKpi::new(format!("{topic} indicator"), value, confidence)
            .topic(topic)
            .source(source),
    )
    .expect("valid record")
}

#[test]
fn confidence_buckets_from_three_scores() {
    let records = [0.92, 0.95, 0.41]
        .into_iter()
        .map(|c| record("acme", "Energy", 1.0, c))
        .collect::<Vec<_>>();
    let buckets = confidence_histogram(&records)
        .into_iter()
        .map(|b| (b.level, b.count))
        .collect::<Vec<_>>();
    assert_eq!(buckets, vec![(0.4, 1), (0.9, 2)]);
}

#[test]
fn benchmark_for_two_companies() {
    let mut records = Vec::new();
    for value in [10.0, 20.0, 30.0] {
        records.push(record("Acme", "Energy", value, 0.9));
    }
    for value in [5.0, 15.0, 25.0] {
        records.push(record("Globex", "Energy", value, 0.9));
    }
    let rows = compute_benchmark(&records, 0.0).unwrap();
    let acme = rows.iter().find(|r| r.source_id == "Acme").unwrap();
    assert_eq!(acme.mean, 20.0);
    assert_eq!(acme.median, 20.0);
    assert_eq!(acme.min, 10.0);
    assert_eq!(acme.max, 30.0);
    assert_eq!(acme.count, 3);
    let globex = rows.iter().find(|r| r.source_id == "Globex").unwrap();
    assert_eq!(globex.mean, 15.0);
}

#[test]
fn seven_companies_is_rejected_without_partial_result() {
    let records = (0..7)
        .map(|i| record(&format!("company-{i}"), "Energy", i as f64, 0.9))
        .collect::<Vec<_>>();
    let ctx = FilterContext::new(0.0).with_companies((0..7).map(|i| format!("company-{i}")));
    match esg_kpi_core::compare(&records, &ctx) {
        Err(EngineError::TooManySelections { requested, max }) => {
            assert_eq!(requested, 7);
            assert_eq!(max, 6);
        }
        other => panic!("expected TooManySelections, got {other:?}"),
    }
}

#[test]
fn empty_file_analysis_does_not_divide_by_zero() {
    let analysis = analyze_file(&[]);
    assert!(analysis.topic_stats.is_empty());
    assert!(analysis.confidence_histogram.is_empty());
    assert_eq!(analysis.summary.total_kpis, 0);
    assert!(analysis.summary.avg_confidence.is_finite());
    assert!(analysis.summary.avg_value.is_finite());
    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["summary"]["total_kpis"], 0);
}

#[test]
fn identical_and_orthogonal_vectors() {
    let same = cosine_similarity(&[3.0, 4.0, 5.0], &[3.0, 4.0, 5.0]);
    assert_eq!(format!("{same:.2}"), "1.00");
    let orthogonal = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
    assert_eq!(format!("{orthogonal:.2}"), "0.00");
}

#[test]
fn identical_profiles_compare_as_one() {
    let records = vec![
        record("Acme", "Energy", 10.0, 0.9),
        record("Acme", "Water", 5.0, 0.9),
        record("Globex", "Energy", 10.0, 0.9),
        record("Globex", "Water", 5.0, 0.9),
    ];
    let ctx = FilterContext::new(0.3).with_companies(["Acme", "Globex"]);
    let comparison = esg_kpi_core::compare(&records, &ctx).unwrap();
    let sim = comparison.similarity.get("Acme", "Globex").unwrap();
    assert!((sim - 1.0).abs() < 1e-12);
    assert_eq!(comparison.scores.len(), 2);
    assert_eq!(comparison.scores[0].score, 7.5);
}
