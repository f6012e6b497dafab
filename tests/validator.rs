//! End-to-end structural validation behavior over buffered and file
//! sources: column-count stability, ragged and blank rows, line-break
//! bookkeeping, header checks, the title-row and single-column heuristics,
//! format consistency, and session plumbing (limit, hook, idempotence).

use std::cell::RefCell;
use std::fs::File;
use std::io::BufReader;
use std::rc::Rc;

use csv_vet::{DiagnosticKind, DialectOverrides, LineTerminator, Source, Validator};

mod common;
use common::{TestWorkspace, error_kinds, validate_text, warning_kinds};

#[test]
fn uniform_files_are_valid() {
    let validator = validate_text("a,b,c\n1,2,3\n4,5,6\n7,8,9\n");
    assert!(validator.is_valid());
    assert!(validator.findings().warnings.is_empty());
    assert_eq!(validator.rows().len(), 4);
}

#[test]
fn ragged_row_reported_at_its_line() {
    let validator = validate_text("a,b,c\n1,2,3\n4,5\n6,7,8\n");
    let ragged: Vec<_> = validator
        .findings()
        .errors
        .iter()
        .filter(|d| d.kind == DiagnosticKind::RaggedRows)
        .collect();
    assert_eq!(ragged.len(), 1);
    assert_eq!(ragged[0].line, Some(3));
}

#[test]
fn blank_row_is_an_error_and_advances_the_counter() {
    let validator = validate_text("a,b,c\n1,2,3\n,,\n4,5,6\n");
    let blank: Vec<_> = validator
        .findings()
        .errors
        .iter()
        .filter(|d| d.kind == DiagnosticKind::BlankRows)
        .collect();
    assert_eq!(blank.len(), 1);
    assert_eq!(blank[0].line, Some(3));
    assert_eq!(validator.current_line(), 4);
    // Three empty fields still match the expected column count.
    assert!(!validator.findings().has_error(&DiagnosticKind::RaggedRows));
}

#[test]
fn mixed_line_breaks_yield_exactly_one_error() {
    let validator = validate_text("a,b\n1,2\r\n3,4\n5,6\r\n");
    let count = validator
        .findings()
        .errors
        .iter()
        .filter(|d| d.kind == DiagnosticKind::LineBreaks)
        .count();
    assert_eq!(count, 1);
}

#[test]
fn non_crlf_terminators_get_one_info_notice() {
    let validator = validate_text("a,b\n1,2\n");
    let count = validator
        .findings()
        .info
        .iter()
        .filter(|d| d.kind == DiagnosticKind::NonRfcLineBreaks)
        .count();
    assert_eq!(count, 1);

    let crlf_only = validate_text("a,b\r\n1,2\r\n");
    assert!(
        crlf_only
            .findings()
            .info
            .iter()
            .all(|d| d.kind != DiagnosticKind::NonRfcLineBreaks)
    );
}

#[test]
fn duplicate_header_warns_at_the_repeat_only() {
    let validator = validate_text("id,name,id\n1,alpha,2\n");
    let duplicates: Vec<_> = validator
        .findings()
        .warnings
        .iter()
        .filter(|d| d.kind == DiagnosticKind::DuplicateColumnName)
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].column, Some(3));
    assert_eq!(duplicates[0].line, Some(1));
}

#[test]
fn empty_header_cell_warns_with_its_column() {
    let validator = validate_text("id,,name\n1,2,3\n");
    let empties: Vec<_> = validator
        .findings()
        .warnings
        .iter()
        .filter(|d| d.kind == DiagnosticKind::EmptyColumnName)
        .collect();
    assert_eq!(empties.len(), 1);
    assert_eq!(empties[0].column, Some(2));
}

#[test]
fn header_cells_are_trimmed_by_default() {
    let validator = validate_text(" id , name \n1,2\n");
    assert_eq!(
        validator.header(),
        Some(&["id".to_string(), "name".to_string()][..])
    );

    let overrides = DialectOverrides {
        trim: Some(false),
        ..Default::default()
    };
    let mut untrimmed = Validator::new(Some(overrides), None);
    untrimmed
        .validate(Source::buffered(" id , name \n1,2\n"))
        .unwrap();
    assert_eq!(
        untrimmed.header(),
        Some(&[" id ".to_string(), " name ".to_string()][..])
    );
}

#[test]
fn title_row_heuristic_flags_short_first_row() {
    // Header has one populated cell, data rows have three.
    let validator = validate_text("title,,\n1,2,3\n4,5,6\n");
    assert!(
        validator
            .findings()
            .warnings
            .iter()
            .any(|d| d.kind == DiagnosticKind::TitleRow)
    );
}

#[test]
fn single_column_file_suggests_checking_options() {
    let validator = validate_text("name\nalpha\nbeta\n");
    assert!(
        validator
            .findings()
            .warnings
            .iter()
            .any(|d| d.kind == DiagnosticKind::CheckOptions)
    );
}

#[test]
fn eighty_percent_dominance_warns_inconsistent_values() {
    let mut content = String::from("n\n");
    for i in 0..8 {
        content.push_str(&format!("{i}\n"));
    }
    content.push_str("alpha\nbeta\n");
    let validator = validate_text(&content);
    let inconsistent: Vec<_> = validator
        .findings()
        .warnings
        .iter()
        .filter(|d| d.kind == DiagnosticKind::InconsistentValues)
        .collect();
    assert_eq!(inconsistent.len(), 1);
    assert_eq!(inconsistent[0].column, Some(1));
}

#[test]
fn ninety_percent_dominance_stays_quiet() {
    let mut content = String::from("n\n");
    for i in 0..9 {
        content.push_str(&format!("{i}\n"));
    }
    content.push_str("alpha\n");
    let validator = validate_text(&content);
    assert!(
        validator
            .findings()
            .warnings
            .iter()
            .all(|d| d.kind != DiagnosticKind::InconsistentValues)
    );
}

#[test]
fn repeated_runs_produce_identical_findings() {
    let content = "a,b,c\n1,2\n\"x,3,4\n,,\n5,6,7\r\n";
    let first = validate_text(content);
    let second = validate_text(content);
    assert_eq!(first.findings(), second.findings());
    assert_eq!(first.rows(), second.rows());
}

#[test]
fn assumed_header_noted_unless_declared() {
    let validator = validate_text("a,b\n1,2\n");
    assert!(
        validator
            .findings()
            .info
            .iter()
            .any(|d| d.kind == DiagnosticKind::AssumedHeader)
    );

    let overrides = DialectOverrides {
        header: Some(true),
        ..Default::default()
    };
    let mut declared = Validator::new(Some(overrides), None);
    declared.validate(Source::buffered("a,b\n1,2\n")).unwrap();
    assert!(
        declared
            .findings()
            .info
            .iter()
            .all(|d| d.kind != DiagnosticKind::AssumedHeader)
    );
}

#[test]
fn headerless_dialect_treats_line_one_as_data() {
    let overrides = DialectOverrides {
        header: Some(false),
        ..Default::default()
    };
    let mut validator = Validator::new(Some(overrides), None);
    validator
        .validate(Source::buffered("1,2,3\n4,5,6\n"))
        .unwrap();
    assert!(validator.header().is_none());
    assert!(validator.is_valid());
    assert_eq!(validator.rows().len(), 2);
}

#[test]
fn semicolon_dialect_splits_accordingly() {
    let overrides = DialectOverrides {
        delimiter: Some(';'),
        ..Default::default()
    };
    let mut validator = Validator::new(Some(overrides), None);
    validator
        .validate(Source::buffered("a;b\n1;2\n"))
        .unwrap();
    assert!(validator.is_valid());
    assert_eq!(
        validator.header(),
        Some(&["a".to_string(), "b".to_string()][..])
    );
}

#[test]
fn line_limit_stops_early_without_error() {
    let mut validator = Validator::new(None, None).with_line_limit(3);
    validator
        .validate(Source::buffered("a,b\n1,2\n3,4\n5,6,7\n8,9\n"))
        .unwrap();
    // The ragged line 4 is never reached.
    assert_eq!(validator.current_line(), 3);
    assert_eq!(validator.rows().len(), 3);
    assert!(validator.is_valid());
}

#[test]
fn line_hook_sees_every_processed_line() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = Rc::clone(&seen);
    let mut validator = Validator::new(None, None).with_line_hook(move |v: &Validator| {
        recorder.borrow_mut().push(v.current_line());
    });
    validator
        .validate(Source::buffered("a,b\n1,2\n3,4"))
        .unwrap();
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
}

#[test]
fn explicit_cr_dialect_splits_on_carriage_returns() {
    let overrides = DialectOverrides {
        line_terminator: Some(LineTerminator::Cr),
        ..Default::default()
    };
    let mut validator = Validator::new(Some(overrides), None);
    validator
        .validate(Source::buffered("a,b\r1,2\r3,4\r"))
        .unwrap();
    assert_eq!(validator.rows().len(), 3);
    assert!(validator.is_valid());
}

#[test]
fn file_source_streams_through_a_reader() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("data.csv", "a,b,c\n1,2,3\n4,5\n");
    let file = File::open(&path).expect("open fixture");
    let mut validator = Validator::new(None, None);
    validator
        .validate(Source::reader(BufReader::new(file)))
        .unwrap();
    assert_eq!(error_kinds(&validator), vec!["ragged_rows"]);
}

#[test]
fn findings_serialize_to_stable_json() {
    let validator = validate_text("a,b,c\n1,2,3\n4,5\n");
    let json = validator.findings().to_json().expect("findings JSON");
    assert!(json.contains("\"ragged_rows\""));
    assert!(json.contains("\"structure\""));
    assert!(warning_kinds(&validator).is_empty());
}
