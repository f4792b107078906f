//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn examforge() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("examforge").unwrap();
    cmd.env("EXAMFORGE_DESCRIPTORS", "../../exam-sets/descriptors.toml")
        .env("EXAMFORGE_VOCABULARY_DIR", "../../exam-sets/vocabulary")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn validate_sample_set() {
    examforge()
        .arg("validate")
        .arg("--questions")
        .arg("../../exam-sets/questions/hsk1-sample.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("6 records"))
        .stdout(predicate::str::contains("[1] OK 听录音选择题 (single_choice)"))
        .stdout(predicate::str::contains("[5] REJECTED 图片匹配题"))
        .stdout(predicate::str::contains("5 accepted, 1 rejected"));
}

#[test]
fn validate_directory() {
    examforge()
        .arg("validate")
        .arg("--questions")
        .arg("../../exam-sets/questions")
        .arg("--tier")
        .arg("HSK4")
        .assert()
        .success()
        .stdout(predicate::str::contains("hsk1-sample.json"))
        .stdout(predicate::str::contains("hsk4-sample.json"));
}

#[test]
fn validate_nonexistent_file() {
    examforge()
        .arg("validate")
        .arg("--questions")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn types_lists_tier() {
    examforge()
        .arg("types")
        .arg("--tier")
        .arg("3")
        .assert()
        .success()
        .stdout(predicate::str::contains("连词成句"))
        .stdout(predicate::str::contains("ordering"))
        .stdout(predicate::str::contains("HSK3"));
}

#[test]
fn types_rejects_bad_tier() {
    examforge()
        .arg("types")
        .arg("--tier")
        .arg("9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid tier"));
}

#[test]
fn rewrite_keeps_single_characters() {
    examforge()
        .arg("rewrite")
        .arg("--tier")
        .arg("2")
        .arg("--seed")
        .arg("7")
        .arg("我，你！")
        .assert()
        .success()
        .stdout(predicate::str::contains("我，你！"));
}

#[test]
fn rewrite_trials_prints_mixture() {
    examforge()
        .arg("rewrite")
        .arg("--tier")
        .arg("1")
        .arg("--seed")
        .arg("7")
        .arg("--trials")
        .arg("20")
        .arg("我们明天去学校学习汉语。")
        .assert()
        .success()
        .stdout(predicate::str::contains("trial(s)"))
        .stdout(predicate::str::contains("HSK6"))
        .stdout(predicate::str::contains("unknown"));
}

#[test]
fn render_shows_questions_and_rejections() {
    examforge()
        .arg("render")
        .arg("--questions")
        .arg("../../exam-sets/questions/hsk1-sample.json")
        .arg("--seed")
        .arg("3")
        .assert()
        .success()
        .stdout(predicate::str::contains("[1] 听录音选择题 (single_choice)"))
        .stdout(predicate::str::contains("(audio unavailable)"))
        .stdout(predicate::str::contains("[5] REJECTED"));
}

#[test]
fn render_single_question_as_json() {
    let output = examforge()
        .arg("render")
        .arg("--questions")
        .arg("../../exam-sets/questions/hsk1-sample.json")
        .arg("--index")
        .arg("3")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let plans: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let plans = plans.as_array().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0]["type_name"], "问答匹配题");
    assert_eq!(plans[0]["shape"], "matching");
    assert_eq!(plans[0]["slots"].as_array().unwrap().len(), 3);
    // The HSK1 question-answer matching type shows pinyin.
    assert!(plans[0]["choice_sets"][0][0]["pinyin"].is_string());
}

#[test]
fn render_index_out_of_range() {
    examforge()
        .arg("render")
        .arg("--questions")
        .arg("../../exam-sets/questions/hsk1-sample.json")
        .arg("--index")
        .arg("99")
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn grade_sample_answers() {
    let dir = TempDir::new().unwrap();
    examforge()
        .arg("grade")
        .arg("--questions")
        .arg("../../exam-sets/questions/hsk1-sample.json")
        .arg("--answers")
        .arg("../../exam-sets/answers/hsk1-sample.json")
        .arg("--tier")
        .arg("1")
        .arg("--output")
        .arg(dir.path())
        .arg("--markdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("8 correct of 11 graded (11 items)"))
        .stdout(predicate::str::contains("Report saved to"));

    let mut reports: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    reports.sort();
    assert_eq!(reports.len(), 2);
    let json = reports
        .iter()
        .find(|p| p.extension().is_some_and(|e| e == "json"))
        .unwrap();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(report["aggregate"]["correct_count"], 8);
    assert_eq!(report["aggregate"]["graded"], 11);
    assert_eq!(report["questions"].as_array().unwrap().len(), 5);
    assert_eq!(report["rejected"].as_array().unwrap().len(), 1);
}

#[test]
fn grade_rejects_bad_answer_key() {
    let dir = TempDir::new().unwrap();
    let answers = dir.path().join("answers.json");
    std::fs::write(&answers, r#"{"first": ["A"]}"#).unwrap();

    examforge()
        .arg("grade")
        .arg("--questions")
        .arg("../../exam-sets/questions/hsk1-sample.json")
        .arg("--answers")
        .arg(&answers)
        .arg("--tier")
        .arg("1")
        .arg("--output")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a question index"));
}

#[test]
fn grade_leaves_out_of_range_labels_blank() {
    let dir = TempDir::new().unwrap();
    let answers = dir.path().join("answers.json");
    std::fs::write(&answers, r#"{"1": ["Z"]}"#).unwrap();

    examforge()
        .arg("grade")
        .arg("--questions")
        .arg("../../exam-sets/questions/hsk1-sample.json")
        .arg("--answers")
        .arg(&answers)
        .arg("--tier")
        .arg("1")
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("out of range"))
        .stdout(predicate::str::contains("0 correct of"));
}

#[test]
fn generate_requires_generator() {
    let dir = TempDir::new().unwrap();
    examforge()
        .current_dir(dir.path())
        .arg("generate")
        .arg("--tier")
        .arg("4")
        .arg("--category")
        .arg("阅读")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no generator configured"));
}

#[test]
fn generate_from_fixture_filters_types() {
    let dir = TempDir::new().unwrap();
    let fixture = std::env::current_dir()
        .unwrap()
        .join("../../exam-sets/questions/hsk4-sample.json");
    let config = dir.path().join("examforge.toml");
    std::fs::write(
        &config,
        format!(
            "[generator]\ntype = \"fixture\"\npath = '{}'\n",
            fixture.display()
        ),
    )
    .unwrap();
    let output = dir.path().join("generated.json");

    examforge()
        .arg("generate")
        .arg("--tier")
        .arg("4")
        .arg("--category")
        .arg("阅读")
        .arg("--types")
        .arg("句子排序题, 阅读理解题")
        .arg("--output")
        .arg(&output)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 accepted, 3 rejected"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let questions = written["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["type"], "句子排序题");
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();
    #[allow(deprecated)]
    Command::cargo_bin("examforge")
        .unwrap()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examforge.toml"))
        .stdout(predicate::str::contains("Next steps"));

    assert!(dir.path().join("examforge.toml").exists());
    assert!(dir.path().join("exam-sets/descriptors.toml").exists());
    assert!(dir.path().join("exam-sets/questions/example.json").exists());

    #[allow(deprecated)]
    Command::cargo_bin("examforge")
        .unwrap()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists, skipping"));
}

#[test]
fn init_then_validate() {
    let dir = TempDir::new().unwrap();
    #[allow(deprecated)]
    Command::cargo_bin("examforge")
        .unwrap()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    #[allow(deprecated)]
    Command::cargo_bin("examforge")
        .unwrap()
        .current_dir(dir.path())
        .env_remove("EXAMFORGE_DESCRIPTORS")
        .env_remove("EXAMFORGE_VOCABULARY_DIR")
        .arg("validate")
        .arg("--questions")
        .arg("exam-sets/questions/example.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("[0] OK 听录音选择题"))
        .stdout(predicate::str::contains("[1] OK 问答匹配题 (matching)"))
        .stdout(predicate::str::contains("2 accepted, 0 rejected"));
}

#[test]
fn help_output() {
    examforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("HSK exam"))
        .stdout(predicate::str::contains("grade"));
}
