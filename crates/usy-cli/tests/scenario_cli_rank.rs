use assert_cmd::Command;
use predicates::prelude::*;

fn usy() -> Command {
    Command::cargo_bin("usy").expect("usy binary")
}

#[test]
fn rank_uses_club_table_by_default() {
    usy()
        .args(["rank", "1000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rank=Silver class=silver"));

    usy()
        .args(["rank", "99"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rank=Novice"));
}

#[test]
fn negative_balance_falls_into_lowest_band() {
    usy()
        .args(["rank", "-40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("balance=-40 rank=Novice"));
}

#[test]
fn rank_honours_configured_bands() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = dir.path().join("ranks.yaml");
    std::fs::write(
        &cfg,
        "ranks:\n  - {min: 0, name: Pawn, class: pawn}\n  - {min: 50, name: Knight, class: knight}\n",
    )?;

    usy()
        .args(["rank", "75", "--config", cfg.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("rank=Knight class=knight"));
    Ok(())
}

#[test]
fn rank_rejects_table_without_zero_band() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = dir.path().join("ranks.yaml");
    std::fs::write(&cfg, "ranks:\n  - {min: 10, name: Pawn, class: pawn}\n")?;

    usy()
        .args(["rank", "75", "--config", cfg.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid ranks section"));
    Ok(())
}
