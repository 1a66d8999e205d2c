use hll_sketch::Sketch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn assert_relative_error(estimate: u64, actual: u64, bound: f64) {
    let error = (estimate as f64 - actual as f64).abs() / actual as f64;
    assert!(
        error < bound,
        "estimate {estimate} vs actual {actual}: relative error {error:.4} exceeds {bound}"
    );
}

#[test]
fn sparse_phase_is_accurate_for_small_cardinalities() {
    let mut sketch = Sketch::new(12, 6).unwrap();
    for i in 0u64..1000 {
        sketch.insert(&i);
    }
    assert!(sketch.is_sparse());
    assert_relative_error(sketch.estimate(), 1000, 0.05);
}

#[test]
fn dense_phase_is_accurate_for_large_cardinalities() {
    let mut sketch = Sketch::new(12, 6).unwrap();
    for i in 0u64..100_000 {
        sketch.insert(&i);
        if i == 999 {
            assert_relative_error(sketch.estimate(), 1000, 0.05);
        }
    }
    assert!(!sketch.is_sparse());
    assert_relative_error(sketch.estimate(), 100_000, 0.05);
}

#[test]
fn dense_only_constructor_tracks_the_same_stream() {
    let mut sparse_first = Sketch::new(14, 6).unwrap();
    let mut dense_only = Sketch::dense(14, 6).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50_000 {
        let hash: u64 = rng.gen();
        sparse_first.insert(&hash);
        dense_only.insert(&hash);
    }
    assert_relative_error(dense_only.estimate(), 50_000, 0.05);
    // Both paths observe the same stream; their estimates must land close together.
    let a = sparse_first.estimate() as f64;
    let b = dense_only.estimate() as f64;
    assert!((a - b).abs() / b < 0.02);
}

#[test]
fn merged_dense_sketches_equal_the_sketch_of_the_combined_stream() {
    let mut rng = StdRng::seed_from_u64(42);
    let stream_a: Vec<u64> = (0..10_000).map(|_| rng.gen()).collect();
    let stream_b: Vec<u64> = (0..10_000).map(|_| rng.gen()).collect();

    let sketch_of = |streams: &[&[u64]]| {
        let mut s = Sketch::dense(10, 6).unwrap();
        for stream in streams {
            for &hash in *stream {
                s.add(hash);
            }
        }
        s
    };

    let a = sketch_of(&[stream_a.as_slice()]);
    let b = sketch_of(&[stream_b.as_slice()]);
    let combined = sketch_of(&[stream_a.as_slice(), stream_b.as_slice()]);

    let mut merged = a.clone();
    assert!(merged.merge(&b));
    assert_eq!(merged.to_bytes(), combined.to_bytes());

    // Commutative: merging the other way around produces the same registers.
    let mut reversed = b.clone();
    assert!(reversed.merge(&a));
    assert_eq!(reversed.to_bytes(), combined.to_bytes());
}

#[test]
fn merge_is_associative_on_register_content() {
    let mut rng = StdRng::seed_from_u64(1234);
    let streams: Vec<Vec<u64>> = (0..3).map(|_| (0..5000).map(|_| rng.gen()).collect()).collect();
    let sketches: Vec<Sketch> = streams
        .iter()
        .map(|stream| {
            let mut s = Sketch::dense(8, 4).unwrap();
            for &hash in stream {
                s.add(hash);
            }
            s
        })
        .collect();

    // (a ∪ b) ∪ c
    let mut left = sketches[0].clone();
    assert!(left.merge(&sketches[1]));
    assert!(left.merge(&sketches[2]));

    // a ∪ (b ∪ c)
    let mut right_tail = sketches[1].clone();
    assert!(right_tail.merge(&sketches[2]));
    let mut right = sketches[0].clone();
    assert!(right.merge(&right_tail));

    assert_eq!(left.to_bytes(), right.to_bytes());
}

#[test]
fn merging_overlapping_streams_counts_the_union() {
    // Streams share half their items; the union has 15_000 distinct elements.
    let mut a = Sketch::new(12, 6).unwrap();
    let mut b = Sketch::new(12, 6).unwrap();
    for i in 0u64..10_000 {
        a.insert(&i);
    }
    for i in 5_000u64..15_000 {
        b.insert(&i);
    }
    assert!(a.merge(&b));
    assert_relative_error(a.estimate(), 15_000, 0.05);
}

#[test]
fn large_range_correction_applies() {
    // Every register saturates at rank 24: the raw estimate crosses 2^32 / 30 and must be
    // pushed further up by the large-range correction.
    let mut sketch = Sketch::dense(4, 6).unwrap();
    for i in 0u64..16 {
        sketch.add(i << 60 | 1 << 23);
    }
    for index in 0..16 {
        assert_eq!(sketch.register(index), 24);
    }
    let estimate = sketch.estimate();
    assert!(estimate > 180_660_000, "correction must exceed the raw estimate");
    assert!(estimate < 190_000_000);
}

#[test]
fn serialized_sketches_keep_estimating_after_merge() {
    // A distributed-aggregation round trip: partial sketches serialized, shipped,
    // deserialized and merged at a coordinator.
    let mut partials = Vec::new();
    for worker in 0u64..8 {
        let mut sketch = Sketch::new(12, 6).unwrap();
        for i in 0u64..2000 {
            sketch.insert(&(worker * 2000 + i));
        }
        partials.push(sketch.to_bytes());
    }

    let mut total = Sketch::new(12, 6).unwrap();
    for bytes in &partials {
        let partial = Sketch::from_bytes(bytes).unwrap();
        assert!(total.merge(&partial));
    }
    assert_relative_error(total.estimate(), 16_000, 0.05);
}

#[test]
fn legacy_bytes_interoperate_with_current_sketches() {
    let mut sketch = Sketch::new(10, 5).unwrap();
    for i in 0u64..30_000 {
        sketch.insert(&i);
    }
    assert!(!sketch.is_sparse());

    let legacy = sketch.to_legacy_bytes().unwrap();
    let revived = Sketch::from_legacy_bytes(&legacy).unwrap();
    assert_eq!(revived.estimate(), sketch.estimate());

    // A revived legacy sketch merges with a current one.
    let mut other = Sketch::new(10, 5).unwrap();
    for i in 20_000u64..40_000 {
        other.insert(&i);
    }
    let mut merged = revived;
    assert!(merged.merge(&other));
    // p = 10 carries ~3.3% expected error; allow three sigma.
    assert_relative_error(merged.estimate(), 40_000, 0.10);
}
