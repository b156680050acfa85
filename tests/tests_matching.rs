//! End-to-end tests: compile a declaration, match argv, inspect the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use declarg::{ActionKind, Compiler, MatchError, Value, compile, match_args};

#[test]
fn gnu_pair_records_value_under_both_flags() {
    let grammar = compile("-a, --at <time:s>\tSchedule the job\n").unwrap();

    let result = match_args(&grammar, ["-a", "5 minutes ago"]);
    assert!(result.is_success(), "errors: {:?}", result.errors());
    assert_eq!(result["-a"], "5 minutes ago");
    assert_eq!(result["--at"], "5 minutes ago");

    let result = match_args(&grammar, ["--at", "noon"]);
    assert_eq!(result["-a"], "noon");
}

#[test]
fn missing_required_pair_reports_once_under_primary() {
    let grammar = compile("-i, --id <id:i>\tIdentity [required]\n").unwrap();
    let result = match_args(&grammar, Vec::<&str>::new());

    assert_eq!(result.error_count(), 1);
    assert!(matches!(
        &result.errors()[0],
        MatchError::MissingRequired(flag) if flag == "-i"
    ));
}

#[test]
fn strict_mode_flags_the_unknown_token() {
    let grammar = compile("[strict]\n-x <v:i>\tA flag\n").unwrap();
    let result = match_args(&grammar, ["-x", "1", "--unknown"]);

    assert_eq!(result.unused(), ["--unknown"]);
    assert_eq!(result.error_count(), 1);
    assert!(matches!(
        &result.errors()[0],
        MatchError::UnrecognizedArgument(token) if token == "--unknown"
    ));
}

#[test]
fn custom_type_validator_rejects_exactly_once() {
    let mut compiler = Compiler::new();
    compiler.register_validator(
        "reject odd values",
        Arc::new(|name, value| match value.as_int() {
            Some(n) if n % 2 == 0 => Ok(None),
            _ => Err(format!("{name} must be even")),
        }),
    );
    let grammar = compiler
        .compile("[pvtype: even /:i/ { reject odd values }]\n-n <v:even>\tEven only\n")
        .unwrap();

    let result = match_args(&grammar, ["-n", "3"]);
    assert_eq!(result.error_count(), 1);
    assert!(matches!(
        &result.errors()[0],
        MatchError::Validation(message) if message == "v must be even"
    ));

    let result = match_args(&grammar, ["-n", "4"]);
    assert!(result.is_success());
    assert_eq!(result["-n"].as_int(), Some(4));
}

#[test]
fn base_conversion_runs_before_derived_validation() {
    // The derived validator sees the integer the base type produced,
    // not the raw text.
    let mut compiler = Compiler::new();
    compiler.register_validator(
        "cap at ten",
        Arc::new(|name, value| match value.as_int() {
            Some(n) if n <= 10 => Ok(None),
            Some(_) => Err(format!("{name} is too big")),
            None => Err(format!("{name} never became an integer")),
        }),
    );
    let grammar = compiler
        .compile("[pvtype: small /:i/ { cap at ten }]\n-s <v:small>\tSmall\n")
        .unwrap();

    assert!(match_args(&grammar, ["-s", "7"]).is_success());
    let result = match_args(&grammar, ["-s", "11"]);
    assert!(matches!(
        &result.errors()[0],
        MatchError::Validation(message) if message == "v is too big"
    ));
}

#[test]
fn deferred_actions_run_only_on_a_clean_parse() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let mut compiler = Compiler::new();
    compiler.register_action(
        "count it",
        ActionKind::Deferred,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    let text = "[strict]\n-x\tA flag\n\t{ count it }\n";
    let grammar = compiler.compile(text).unwrap();

    let result = match_args(&grammar, ["-x"]);
    assert!(result.is_success());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let result = match_args(&grammar, ["-x", "--bogus"]);
    assert_eq!(result.error_count(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1, "deferred action ran despite errors");
}

#[test]
fn immediate_action_sees_the_converted_value() {
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    let mut compiler = Compiler::new();
    compiler.register_action(
        "stash the count",
        ActionKind::Immediate,
        Arc::new(move |ctx| {
            let n = ctx.value.and_then(Value::as_int).ok_or("no value")?;
            sink.store(n as usize, Ordering::SeqCst);
            Ok(())
        }),
    );
    let grammar = compiler
        .compile("-n <v:i>\tA number\n\t{ stash the count }\n")
        .unwrap();

    let result = match_args(&grammar, ["-n", "42"]);
    assert!(result.is_success(), "errors: {:?}", result.errors());
    assert_eq!(seen.load(Ordering::SeqCst), 42);
}

#[test]
fn failing_action_is_reported_against_its_flag() {
    let mut compiler = Compiler::new();
    compiler.register_action(
        "always fail",
        ActionKind::Immediate,
        Arc::new(|_| Err("nope".to_string())),
    );
    let grammar = compiler.compile("-x\tDoomed\n\t{ always fail }\n").unwrap();

    let result = match_args(&grammar, ["-x"]);
    assert!(matches!(
        &result.errors()[0],
        MatchError::ActionFailed { flag, message } if flag == "-x" && message == "nope"
    ));
}

#[test]
fn mutex_conflict_is_symmetric() {
    let grammar = compile("-a\tA [mutex: -a -b]\n-b\tB\n").unwrap();

    let result = match_args(&grammar, ["-a", "-b"]);
    assert!(matches!(
        &result.errors()[0],
        MatchError::MutexConflict { flag, blocked_by } if flag == "-b" && blocked_by == "-a"
    ));

    let result = match_args(&grammar, ["-b", "-a"]);
    assert!(matches!(
        &result.errors()[0],
        MatchError::MutexConflict { flag, blocked_by } if flag == "-a" && blocked_by == "-b"
    ));
}

#[test]
fn excludes_blocks_the_other_flag() {
    let grammar = compile("-q\tQuiet [excludes: -v]\n-v\tVerbose\n").unwrap();
    let result = match_args(&grammar, ["-q", "-v"]);
    assert!(result.found("-q"));
    assert!(!result.found("-v"));
    assert_eq!(result.error_count(), 1);
}

#[test]
fn requires_expression_with_negation() {
    let grammar = compile("-z\tCompress [requires: -a && !-b]\n-a\tA\n-b\tB\n").unwrap();

    assert!(match_args(&grammar, ["-z", "-a"]).is_success());

    let result = match_args(&grammar, ["-z", "-a", "-b"]);
    assert_eq!(result.error_count(), 1);
    assert!(matches!(
        &result.errors()[0],
        MatchError::UnsatisfiedRequires { flag, expr } if flag == "-z" && expr == "-a && !-b"
    ));
}

#[test]
fn optional_group_matches_with_and_without_its_payload() {
    let grammar = compile("-print [<file:s>]\tPrint, optionally to a file\n").unwrap();

    let result = match_args(&grammar, ["-print", "out.txt"]);
    assert_eq!(result["-print"], "out.txt");

    let result = match_args(&grammar, ["-print"]);
    assert!(result.found("-print"));
    assert_eq!(result["-print"].as_int(), Some(1));
}

#[test]
fn optional_payload_refuses_a_token_shaped_like_a_flag() {
    let grammar = compile("-print [<file:s>]\tPrint\n-v\tVerbose\n").unwrap();
    let result = match_args(&grammar, ["-print", "-v"]);
    assert!(result.found("-v"), "-v was swallowed as the optional file");
    assert_eq!(result["-print"].as_int(), Some(1));
}

#[test]
fn tight_flag_takes_its_value_flush() {
    let grammar = compile("-j<jobs:i>\tParallel jobs\n").unwrap();

    let result = match_args(&grammar, ["-j4"]);
    assert_eq!(result["-j"].as_int(), Some(4));

    let result = match_args(&grammar, ["-j", "4"]);
    assert!(!result.found("-j"));
    assert_eq!(result.unused(), ["-j", "4"]);
}

#[test]
fn punctuated_range_spec_matches_tightly() {
    let grammar = compile("-r <from:i>..<to:i>\tRange of pages\n").unwrap();
    let result = match_args(&grammar, ["-r", "1..9"]);
    assert!(result.is_success(), "errors: {:?}", result.errors());
    let value = &result["-r"];
    assert_eq!(value.get("from").and_then(Value::as_int), Some(1));
    assert_eq!(value.get("to").and_then(Value::as_int), Some(9));
}

#[test]
fn longer_flag_wins_over_its_prefix() {
    let grammar = compile("-v\tTerse\n-verbose\tFull\n").unwrap();
    let result = match_args(&grammar, ["-verbose"]);
    assert!(result.found("-verbose"));
    assert!(!result.found("-v"));
}

#[test]
fn float_type_converts_scientific_notation() {
    let grammar = compile("-t <secs:n>\tTimeout\n").unwrap();
    let result = match_args(&grammar, ["-t", "1.5e3"]);
    assert_eq!(result["-t"].as_float(), Some(1500.0));
}

#[test]
fn negative_numbers_are_values_not_flags() {
    let grammar = compile("-off <delta:i>\tOffset\n").unwrap();
    let result = match_args(&grammar, ["-off", "-7"]);
    assert!(result.is_success(), "errors: {:?}", result.errors());
    assert_eq!(result["-off"].as_int(), Some(-7));
}

#[test]
fn positional_and_flag_specs_interleave() {
    let text = "-v\tVerbose\n<input:s>\tInput file [required]\n";
    let grammar = compile(text).unwrap();
    let result = match_args(&grammar, ["-v", "data.csv"]);
    assert!(result.is_success());
    assert_eq!(result["input"], "data.csv");
    assert!(result.found("-v"));
}

#[test]
fn help_flag_wins_even_with_a_broken_stream() {
    let grammar = compile("[strict]\n-i <id:i>\tIdentity [required]\n").unwrap();
    let result = match_args(&grammar, ["--garbage", "--help"]);
    assert!(result.help_requested());
    assert!(result.is_success(), "help request still produced errors");
}
