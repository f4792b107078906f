use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use examforge_core::rewriter::DifficultyRewriter;
use examforge_core::vocabulary::VocabularyCorpus;
use examforge_core::weights::LevelWeightTable;
use examforge_core::Tier;

const PASSAGE: &str = "小王今天早上去商店买了一些水果，然后和朋友一起去学校准备考试。\
    他们觉得这次考试很重要，所以每天晚上都在图书馆学习到十点。";

fn corpus() -> VocabularyCorpus {
    let tiers = [
        vec!["今天", "早上", "商店", "朋友", "学校", "一起", "学习", "晚上"],
        vec!["水果", "然后", "准备", "考试", "觉得", "每天", "所以"],
        vec!["图书馆", "重要", "一些"],
        vec!["这次"],
        vec![],
        vec![],
    ];
    VocabularyCorpus::from_tiers(
        tiers
            .into_iter()
            .enumerate()
            .filter_map(|(i, words)| Tier::from_index(i).map(|t| (t, words))),
    )
}

fn bench_rewrite(c: &mut Criterion) {
    let rewriter = DifficultyRewriter::new(Arc::new(corpus()), Arc::new(LevelWeightTable::default()));
    let mut group = c.benchmark_group("rewrite");

    for level in [1u8, 3, 6] {
        let Some(tier) = Tier::new(level) else { continue };
        group.bench_function(format!("passage/{tier}"), |b| {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            b.iter(|| rewriter.rewrite(black_box(PASSAGE), tier, &mut rng))
        });
    }

    group.bench_function("segment", |b| {
        b.iter(|| rewriter.segmenter().segment(black_box(PASSAGE)).len())
    });

    group.finish();
}

criterion_group!(benches, bench_rewrite);
criterion_main!(benches);
