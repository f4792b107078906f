use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use examforge_core::descriptor::DescriptorRegistry;
use examforge_core::rewriter::DifficultyRewriter;
use examforge_core::{AssessmentEngine, EngineConfig, Tier};

fn engine() -> AssessmentEngine {
    AssessmentEngine::new(
        Arc::new(DescriptorRegistry::default()),
        Arc::new(DifficultyRewriter::passthrough()),
        EngineConfig {
            seed: Some(1),
            ..Default::default()
        },
    )
}

fn records() -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for i in 0..20 {
        out.push(json!({
            "type": "阅读理解",
            "question": format!("第{i}题"),
            "options": ["A. 六岁", "B. 八岁", "C. 九岁"],
            "answer": "A"
        }));
        out.push(json!({
            "type": "句子匹配",
            "sentences": ["一", "二", "三", "四", "五"],
            "options": ["甲", "乙", "丙", "丁", "戊"],
            "answer": ["B", "A", "C", "E", "D"]
        }));
    }
    out
}

fn bench_grading(c: &mut Criterion) {
    let engine = engine();
    let mut group = c.benchmark_group("grading");

    group.bench_function("load_40", |b| {
        b.iter(|| engine.load_values(black_box(records()), Tier::MIN))
    });

    group.bench_function("submit_all_40", |b| {
        let mut session = engine.load_values(records(), Tier::MIN);
        for i in (0..session.len()).step_by(2) {
            let _ = engine.select(&mut session, i, 0, "A");
        }
        b.iter(|| {
            let mut fresh = session.clone();
            engine.submit_all(black_box(&mut fresh))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_grading);
criterion_main!(benches);
