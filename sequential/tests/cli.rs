use std::{io::Write, process::Command};
use tempfile::NamedTempFile;

fn sequential() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sequential"))
}

#[test]
fn prints_the_report() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "artist|song|text").unwrap();
    writeln!(file, "ABBA|Mamma Mia|love love love, happy").unwrap();
    writeln!(file, "Queen|Bohemian Rhapsody|pain and hate").unwrap();
    writeln!(file, "ABBA|Waterloo|I was defeated, you won the war").unwrap();
    writeln!(file, "no separators here").unwrap();

    let output = sequential()
        .args(&["--dialect", "pipe", "--top-n", "2", "--dataset"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("== top 2 words"), "{}", stdout);
    assert!(stdout.contains("love"), "{}", stdout);
    assert!(stdout.contains("ABBA"), "{}", stdout);
    assert!(stdout.contains("3 records (1 malformed skipped"), "{}", stdout);
    assert!(stdout.contains("classified 3, failed 0"), "{}", stdout);
}

#[test]
fn missing_dataset_fails() {
    let output = sequential()
        .env_remove("LYRICS_DATASET")
        .args(&["--dataset", "/no/such/lyrics.csv"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("/no/such/lyrics.csv"));
}
