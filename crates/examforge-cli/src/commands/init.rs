//! The `examforge init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_once(Path::new("examforge.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("exam-sets/questions")?;
    write_once(Path::new("exam-sets/descriptors.toml"), SAMPLE_DESCRIPTORS)?;
    write_once(Path::new("exam-sets/questions/example.json"), EXAMPLE_QUESTIONS)?;

    println!("\nNext steps:");
    println!("  1. Add vocabulary lists (1.json .. 6.json) under exam-sets/vocabulary");
    println!("  2. Run: examforge validate --questions exam-sets/questions/example.json");
    println!("  3. Run: examforge render --questions exam-sets/questions/example.json");

    Ok(())
}

fn write_once(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examforge configuration

descriptors = "exam-sets/descriptors.toml"
vocabulary_dir = "exam-sets/vocabulary"

# Fix the session seed for reproducible display order and rewriting.
# seed = 42

allow_retry = false
shuffle_display = true
max_retries = 3
retry_delay_ms = 1000

[speech]
type = "silent"
base_uri = "silent://"

[images]
type = "placeholder"

# [generator]
# type = "fixture"
# path = "exam-sets/questions/example.json"
"#;

const SAMPLE_DESCRIPTORS: &str = r#"[shapes]
"听录音选择题" = "single_choice"
"问答匹配题" = "matching"

[tiers.HSK1."听力"."听录音选择题"]
require_audio = true
max_options = 3
vocab_level = 1

[tiers.HSK1."阅读"."问答匹配题"]
max_options = 5
vocab_level = 1
show_pinyin = true
"#;

const EXAMPLE_QUESTIONS: &str = r#"{
  "questions": [
    {
      "type": "听录音选择题",
      "category": "听力",
      "content": "我女儿今年六岁了，她很喜欢猫。",
      "question": "女儿几岁了？",
      "options": ["A. 6岁", "B. 8岁", "C. 9岁"],
      "answer": "A",
      "explanation": "录音中说女儿今年六岁。"
    },
    {
      "type": "问答匹配题",
      "category": "阅读",
      "questions": ["你叫什么名字？", "你今年多大？"],
      "options": ["我叫王方。", "我二十岁。"],
      "answer": ["A", "B"]
    }
  ]
}
"#;
