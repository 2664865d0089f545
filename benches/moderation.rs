//! Benchmark for text moderation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use piperline::config::ModerationConfig;
use piperline::moderation::{ModerationMode, Moderator};
use piperline::text::{parse_directives, sanitize};
use std::collections::BTreeMap;

const MESSAGE: &str = "h3ll0 everyone!!! check https://example.com/watch?v=abc 🎉🎉 \
                       this is such a d.a.r.n good stream, see you all tomorrow 👋";

fn moderator() -> Moderator {
    let dir = std::env::temp_dir().join("piperline-bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("blocklist.txt");
    let terms: Vec<String> = (0..200).map(|i| format!("badword{i}")).collect();
    std::fs::write(&path, format!("darn\nheck\n{}\n", terms.join("\n"))).unwrap();

    let config = ModerationConfig {
        blocklist_path: Some(path),
        ..Default::default()
    };
    Moderator::new(&config).unwrap()
}

fn bench_filter(c: &mut Criterion) {
    let moderator = moderator();

    c.bench_function("moderate_drop", |b| {
        b.iter(|| moderator.filter(black_box(MESSAGE), ModerationMode::Drop))
    });

    c.bench_function("moderate_mask", |b| {
        b.iter(|| moderator.filter(black_box(MESSAGE), ModerationMode::Mask))
    });

    let long_message = MESSAGE.repeat(8);
    c.bench_function("moderate_drop_long", |b| {
        b.iter(|| moderator.filter(black_box(&long_message), ModerationMode::Drop))
    });
}

fn bench_censor(c: &mut Criterion) {
    let moderator = moderator();
    let rules = moderator.blocklist().rules();

    c.bench_function("censor_rules", |b| {
        b.iter(|| piperline::moderation::censor(&rules, black_box(MESSAGE), ModerationMode::Drop))
    });
}

fn bench_directives(c: &mut Criterion) {
    let aliases = BTreeMap::from([("bob".to_string(), "en_US-ryan-high".to_string())]);
    let presets = BTreeMap::new();

    c.bench_function("sanitize_and_directives", |b| {
        b.iter(|| {
            let text = sanitize(black_box("bob:   hello \u{200b}there [fast] friend"), 500);
            parse_directives(&text, &aliases, &presets)
        })
    });
}

criterion_group!(benches, bench_filter, bench_censor, bench_directives);
criterion_main!(benches);
