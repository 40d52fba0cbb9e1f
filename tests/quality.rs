use proptest::prelude::*;

use kira_data_miner::domain::{ConfidenceTier, Grade, Record, Registry};
use kira_data_miner::quality::{QualityAssessor, QualityWeights};

fn confidence() -> impl Strategy<Value = ConfidenceTier> {
    prop_oneof![
        Just(ConfidenceTier::Explicit),
        Just(ConfidenceTier::Inferred),
        Just(ConfidenceTier::Unknown),
        Just(ConfidenceTier::Absent),
    ]
}

fn record() -> impl Strategy<Value = Record> {
    (
        "[A-Za-z0-9 ,.-]{0,300}",
        "[A-Za-z0-9 ,.-]{0,600}",
        "[A-Za-z ]{0,40}",
        proptest::option::of("[a-z ]{1,20}"),
        confidence(),
    )
        .prop_map(|(title, description, organism, sample, tier)| {
            let mut record = Record::new(Registry::Sra, "salt", "SRX1");
            record.title = title;
            record.description = description;
            record.organism = organism;
            record.sample = sample;
            record.sample_confidence = tier;
            record
        })
}

fn weights() -> impl Strategy<Value = QualityWeights> {
    proptest::array::uniform5(0.0f64..1.0)
        .prop_filter("non-zero total", |raw| raw.iter().sum::<f64>() > 1e-3)
        .prop_map(|raw| {
            let total: f64 = raw.iter().sum();
            QualityWeights {
                completeness: raw[0] / total,
                title: raw[1] / total,
                description: raw[2] / total,
                sample: raw[3] / total,
                organism: raw[4] / total,
            }
        })
}

proptest! {
    #[test]
    fn score_stays_in_range(record in record(), weights in weights()) {
        let assessor = QualityAssessor::new(weights, Default::default()).unwrap();
        let assessment = assessor.assess(&record);
        prop_assert!((0.0..=100.0).contains(&assessment.score));
        prop_assert_eq!(assessment.grade, Grade::from_score(assessment.score));
        for part in [
            assessment.breakdown.completeness,
            assessment.breakdown.title,
            assessment.breakdown.description,
            assessment.breakdown.sample,
            assessment.breakdown.organism,
        ] {
            prop_assert!((0.0..=100.0).contains(&part));
        }
    }

    #[test]
    fn grade_is_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        // Grade::A orders first, so a higher score never yields a later grade.
        prop_assert!(Grade::from_score(high) <= Grade::from_score(low));
    }
}

#[test]
fn unbalanced_weights_are_rejected() {
    let weights = QualityWeights {
        completeness: 0.5,
        ..QualityWeights::default()
    };
    assert!(QualityAssessor::new(weights, Default::default()).is_err());
}
