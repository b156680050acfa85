//! Filesystem-checked parameter types: `if`, `of`, `dir`.

use std::fs;

use declarg::{MatchError, compile, match_args};

#[test]
fn input_file_must_exist_and_be_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.txt");
    fs::write(&path, "data").unwrap();

    let grammar = compile("-in <file:if>\tInput file\n").unwrap();

    let result = match_args(&grammar, ["-in", path.to_str().unwrap()]);
    assert!(result.is_success(), "errors: {:?}", result.errors());
    assert_eq!(result["-in"], path.to_str().unwrap());

    let missing = dir.path().join("nope.txt");
    let result = match_args(&grammar, ["-in", missing.to_str().unwrap()]);
    assert!(matches!(result.errors()[0], MatchError::Validation(_)));
}

#[test]
fn output_file_accepts_a_path_that_does_not_exist_yet() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = dir.path().join("to-create.log");

    let grammar = compile("-out <file:of>\tOutput file\n").unwrap();
    let result = match_args(&grammar, ["-out", fresh.to_str().unwrap()]);
    assert!(result.is_success(), "errors: {:?}", result.errors());
}

#[test]
fn output_file_rejects_an_existing_readonly_file() {
    let dir = tempfile::tempdir().unwrap();
    let locked = dir.path().join("locked.log");
    fs::write(&locked, "x").unwrap();
    let mut perms = fs::metadata(&locked).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&locked, perms).unwrap();

    let grammar = compile("-out <file:of>\tOutput file\n").unwrap();
    let result = match_args(&grammar, ["-out", locked.to_str().unwrap()]);
    assert!(matches!(result.errors()[0], MatchError::Validation(_)));
}

#[test]
fn directory_type_rejects_a_plain_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain.txt");
    fs::write(&file, "x").unwrap();

    let grammar = compile("-d <where:dir>\tWorking directory\n").unwrap();

    let result = match_args(&grammar, ["-d", dir.path().to_str().unwrap()]);
    assert!(result.is_success(), "errors: {:?}", result.errors());

    let result = match_args(&grammar, ["-d", file.to_str().unwrap()]);
    assert!(matches!(result.errors()[0], MatchError::Validation(_)));
}

#[test]
fn dash_stands_for_a_standard_stream() {
    let grammar = compile("-in <file:if>\tInput\n-out <file:of>\tOutput\n").unwrap();
    let result = match_args(&grammar, ["-in", "-", "-out", "-"]);
    assert!(result.is_success(), "errors: {:?}", result.errors());
    assert_eq!(result["-in"], "-");
}
