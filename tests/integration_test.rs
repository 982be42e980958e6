// Integration tests for Findora
use chrono::{Duration as ChronoDuration, Utc};
use findora::prelude::*;
use findora::{
    CandidateIndex, CandidateSource, ConfidenceLevel, MatchOrchestrator, MatchStatus, RasterEmbedder,
};
use findora::{ImageEmbedder, PairKey};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

fn stripes(color: [u8; 3], stripe: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 48, |x, _| {
        if (x / stripe) % 2 == 0 {
            Rgb(color)
        } else {
            Rgb([240, 240, 230])
        }
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

fn report(
    item_type: ItemType,
    category: Category,
    description: &str,
    location: Location,
    hours_after: i64,
) -> ItemReport {
    ItemReport {
        item_type,
        category,
        title: String::new(),
        description: description.to_string(),
        location,
        created_at: Utc::now() + ChronoDuration::hours(hours_after),
        reward: None,
        contact: String::new(),
    }
}

fn memory_engine(threads: usize) -> (MatchEngine, Arc<MemoryMatchStore>) {
    let store = Arc::new(MemoryMatchStore::new());
    let mut config = EngineConfig::default();
    config.worker.threads = threads;
    (MatchEngine::new(config, store.clone()).unwrap(), store)
}

#[test]
fn test_wallet_scenario_is_high_confidence() {
    let (engine, _) = memory_engine(2);
    let photo = stripes([15, 15, 15], 6);

    let lost = engine
        .submit(
            report(
                ItemType::Lost,
                Category::Wallet,
                "black leather wallet with gold clasp",
                Location::at("Main St", 40.0, -73.0).unwrap(),
                0,
            ),
            Some(photo.clone()),
        )
        .unwrap();
    engine.wait_idle();
    let found = engine
        .submit(
            report(
                ItemType::Found,
                Category::Wallet,
                "black leather wallet gold buckle",
                Location::at("Main St", 40.001, -73.001).unwrap(),
                2,
            ),
            Some(photo),
        )
        .unwrap();
    engine.wait_idle();

    let matches = engine.matches_for(&found);
    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.lost_item_id, lost);
    assert_eq!(m.found_item_id, found);
    assert!(m.confidence >= 0.80, "got {}", m.confidence);
    assert_eq!(m.level, ConfidenceLevel::High);
    assert_eq!(m.status, MatchStatus::Pending);
    assert!((0.0..=100.0).contains(&m.percent()));
}

#[test]
fn test_category_swap_produces_no_match() {
    let (engine, store) = memory_engine(2);
    let photo = stripes([15, 15, 15], 6);
    let location = Location::at("Main St", 40.0, -73.0).unwrap();

    engine
        .submit(
            report(ItemType::Lost, Category::Wallet, "black leather wallet", location.clone(), 0),
            Some(photo.clone()),
        )
        .unwrap();
    engine
        .submit(
            report(ItemType::Found, Category::Keys, "black leather wallet", location, 1),
            Some(photo),
        )
        .unwrap();
    engine.wait_idle();

    assert!(store.is_empty());
    assert_eq!(engine.stats().matches, 0);
}

#[test]
fn test_undecodable_image_still_matches() {
    let (engine, _) = memory_engine(1);
    let location = Location::at("Central Station", 51.5, -0.12).unwrap();

    let lost = engine
        .submit(
            report(ItemType::Lost, Category::Backpack, "green canvas backpack", location.clone(), 0),
            Some(b"\x89PNG\r\n\x1a\ntruncated".to_vec()),
        )
        .unwrap();
    engine
        .submit(
            report(ItemType::Found, Category::Bag, "green canvas backpack", location, 3),
            Some(stripes([20, 120, 40], 4)),
        )
        .unwrap();
    engine.wait_idle();

    let matches = engine.matches_for(&lost);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].scores.image, None);
    assert!(matches[0].confidence >= 0.30);
}

#[test]
fn test_concurrent_submissions_converge() {
    let (engine, store) = memory_engine(4);
    let engine = Arc::new(engine);
    let location = Location::at("Harbour Front", -33.86, 151.21).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = engine.clone();
            let location = location.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    let item_type = if (t + i) % 2 == 0 { ItemType::Lost } else { ItemType::Found };
                    engine
                        .submit_with_id(
                            ItemId::from(format!("t{}-{}", t, i)),
                            report(item_type, Category::Other, "navy umbrella wooden handle", location.clone(), 0),
                            None,
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    engine.wait_idle();

    let counts = engine.index().counts();
    assert_eq!(counts.lost + counts.found, 20);
    assert_eq!(store.len(), counts.lost * counts.found);

    // Each pair stored once, visible from both sides
    for item in engine.index().iter() {
        let expected = if item.item_type == ItemType::Lost { counts.found } else { counts.lost };
        assert_eq!(engine.matches_for(&item.id).len(), expected);
    }
}

#[test]
fn test_recomputation_is_idempotent() {
    let index = Arc::new(CandidateIndex::default());
    let store = Arc::new(MemoryMatchStore::new());
    let orchestrator = MatchOrchestrator::new(index.clone(), store.clone(), PairScorer::default());
    let embedder = RasterEmbedder::default();

    let lost = Item::from_report(
        ItemId::from("lost"),
        report(
            ItemType::Lost,
            Category::Phone,
            "black phone in a red case",
            Location::named("City Library"),
            0,
        ),
        Some(embedder.embed(&stripes([200, 20, 20], 8)).unwrap()),
    )
    .unwrap();
    let found = Item::from_report(
        ItemId::from("found"),
        report(
            ItemType::Found,
            Category::Electronics,
            "phone with red case",
            Location::named("City Library reading room"),
            5,
        ),
        Some(embedder.embed(&stripes([190, 30, 25], 8)).unwrap()),
    )
    .unwrap();
    let lost = index.insert(lost).unwrap();
    let found = index.insert(found).unwrap();

    orchestrator.on_item_created(&found).unwrap();
    let key = PairKey::new(&lost.id, &found.id);
    let first = store.get(&key).expect("pair should match");

    let again = orchestrator.rescore_pair(&lost, &found).unwrap().unwrap();
    assert_eq!(again, first);
    let reversed = orchestrator.rescore_pair(&found, &lost).unwrap().unwrap();
    assert_eq!(reversed, first);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_confidence_never_increases_with_distance() {
    let scorer = PairScorer::default();
    let lost = Item::from_report(
        ItemId::from("lost"),
        report(ItemType::Lost, Category::Bag, "brown leather satchel", Location::at("", 48.85, 2.35).unwrap(), 0),
        None,
    )
    .unwrap();

    let mut previous = f32::INFINITY;
    for step in 0..20 {
        let lat = 48.85 + step as f64 * 0.01;
        let found = Item::from_report(
            ItemId::from(format!("found-{}", step)),
            report(ItemType::Found, Category::Bag, "brown leather satchel", Location::at("", lat, 2.35).unwrap(), 1),
            None,
        )
        .unwrap();

        let pair = scorer.score(&lost, &found);
        assert!((0.0..=1.0).contains(&pair.confidence));
        assert!(pair.confidence <= previous);
        assert_eq!(pair.scores.proximity, scorer.score(&found, &lost).scores.proximity);
        assert_eq!(pair.scores.text, scorer.score(&found, &lost).scores.text);
        previous = pair.confidence;
    }
}

#[test]
fn test_matches_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let location = Location::at("Airport T2", 52.31, 4.76).unwrap();

    let (lost, before) = {
        let storage = Arc::new(MatchStorage::open(dir.path()).unwrap());
        let engine = MatchEngine::new(EngineConfig::default(), storage.clone()).unwrap();
        let lost = engine
            .submit(report(ItemType::Lost, Category::Jewelry, "silver ring with blue stone", location.clone(), 0), None)
            .unwrap();
        engine.wait_idle();
        engine
            .submit(report(ItemType::Found, Category::Accessories, "silver ring blue stone", location, 6), None)
            .unwrap();
        engine.wait_idle();
        engine.shutdown();

        let before = engine.matches_for(&lost);
        assert_eq!(before.len(), 1);
        storage.save().unwrap();
        (lost, before)
    };

    let storage = MatchStorage::open(dir.path()).unwrap();
    assert_eq!(storage.matches_for(&lost), before);
}

#[test]
fn test_removed_item_loses_matches() {
    let (engine, store) = memory_engine(2);
    let location = Location::at("Pier 39", 37.808, -122.409).unwrap();
    let lost = engine
        .submit(report(ItemType::Lost, Category::Documents, "blue passport", location.clone(), 0), None)
        .unwrap();
    engine.wait_idle();
    let found = engine
        .submit(report(ItemType::Found, Category::Wallet, "blue passport", location, 1), None)
        .unwrap();
    engine.wait_idle();
    assert_eq!(store.len(), 1);

    assert!(engine.remove_item(&found).unwrap());
    assert!(engine.matches_for(&lost).is_empty());
    assert!(engine.index().get(&found).unwrap().is_none());
}
