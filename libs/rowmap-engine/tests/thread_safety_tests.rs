use std::sync::{Arc, Barrier};
use std::thread;

use rowmap_api::{Scan, Value};
use rowmap_cursor_memory::{MemoryCursor, ResultSet};
use rowmap_engine::{Mapper, NameCase, NameNormalizer, ScanOptions};

#[derive(Scan, Default, Debug, PartialEq)]
struct Metric {
    host: String,
    #[db(rename = "val")]
    value: f64,
    #[db(flatten)]
    labels: Labels,
}

#[derive(Scan, Default, Debug, PartialEq)]
struct Labels {
    region: Option<String>,
    tier: Option<String>,
}

fn metrics(count: usize) -> MemoryCursor {
    let rows = (0..count)
        .map(|i| vec![Value::from(format!("h{i}")), Value::from(i as f64), Value::Null, Value::from("gold")])
        .collect();
    MemoryCursor::new(ResultSet::new(["host", "val", "region", "tier"], rows))
}

#[test]
fn test_concurrent_first_resolution_shares_one_map() {
    const THREADS: usize = 16;
    let mapper = Arc::new(Mapper::default());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let mapper = Arc::clone(&mapper);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                mapper.resolve::<Metric>()
            })
        })
        .collect();
    let maps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(mapper.cache().len(), 1);
    for map in &maps {
        assert!(Arc::ptr_eq(map, &maps[0]));
    }
    assert_eq!(
        maps[0].names().collect::<Vec<_>>(),
        vec!["host", "val", "region", "tier"]
    );
}

#[test]
fn test_concurrent_scans_with_one_mapper() {
    const THREADS: usize = 8;
    let mapper = Arc::new(Mapper::default());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let mapper = Arc::clone(&mapper);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut cursor = metrics(t + 1);
                let mut dest: Vec<Metric> = Vec::new();
                mapper.scan_all(&mut cursor, &mut dest, ScanOptions::default()).unwrap();
                dest
            })
        })
        .collect();

    for (t, handle) in handles.into_iter().enumerate() {
        let dest = handle.join().unwrap();
        assert_eq!(dest.len(), t + 1);
        assert_eq!(dest[t].host, format!("h{t}"));
        assert_eq!(dest[t].value, t as f64);
        assert_eq!(dest[t].labels.tier.as_deref(), Some("gold"));
    }
}

#[test]
fn test_normalizer_swap_during_resolution() {
    let mapper = Arc::new(Mapper::default());

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    let map = mapper.resolve::<Metric>();
                    // Every map is internally consistent with one normalizer.
                    let host = map.field("host").is_some();
                    let upper = map.field("HOST").is_some();
                    assert!(host != upper);
                }
            });
        }
        s.spawn(|| {
            for i in 0..50 {
                let case = if i % 2 == 0 { NameCase::Upper } else { NameCase::Lower };
                mapper.set_normalizer(NameNormalizer::from_case(case));
            }
        });
    });

    // The last replacement was Lower; whatever was cached after it uses it.
    assert!(mapper.resolve::<Metric>().field("host").is_some());
}
