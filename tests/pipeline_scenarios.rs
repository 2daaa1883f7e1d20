mod common;

use std::fs;
use std::path::Path;

use common::{ScriptedOracle, archive_entries, docx_with_paragraphs, paragraph_texts};
use urdu_loanword_annotator::errors::OracleError;
use urdu_loanword_annotator::{AnnotationMode, Document, Pipeline, RunResult, Settings};

fn pipeline(oracle: &ScriptedOracle) -> Pipeline<ScriptedOracle> {
    Pipeline::with_provider(oracle.clone(), Settings::default(), AnnotationMode::Basic)
}

fn write_input(dir: &Path, texts: &[&str]) -> std::path::PathBuf {
    let input = dir.join("input.docx");
    fs::write(&input, docx_with_paragraphs(texts)).unwrap();
    input
}

async fn run_with_progress(
    pipeline: &Pipeline<ScriptedOracle>,
    input: &Path,
    output: &Path,
) -> (RunResult, Vec<u8>) {
    let mut events = Vec::new();
    let mut sink = |percent: u8| events.push(percent);
    let result = pipeline.run(input, output, Some(&mut sink)).await;
    (result, events)
}

#[tokio::test]
async fn candidate_paragraph_is_annotated_and_others_kept() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["خالی", "", "سٹینڈرڈ (Standard) test"]);
    let output = dir.path().join("input_translated.docx");
    let oracle = ScriptedOracle::new(|paragraph| {
        assert_eq!(paragraph, "سٹینڈرڈ (Standard) test");
        Ok("[[سٹینڈرڈ]] (Standard) {{معیار}} test".to_string())
    });

    let (result, events) = run_with_progress(&pipeline(&oracle), &input, &output).await;
    assert_eq!(result, RunResult::Success("Processing Complete".to_string()));
    assert_eq!(events, vec![0, 33, 66, 100]);
    assert_eq!(oracle.calls(), 1);

    let annotated = Document::load(&output).unwrap();
    assert_eq!(
        paragraph_texts(&annotated),
        vec!["خالی", "", "[[سٹینڈرڈ]] (Standard) {{معیار}} test"]
    );
}

#[tokio::test]
async fn transport_failures_produce_an_identical_document() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["ہیلو (hello)", "کتاب (book) اور قلم (pen)"]);
    let output = dir.path().join("out.docx");
    let oracle = ScriptedOracle::new(|_| Err(OracleError::Transport("offline".to_string())));

    let result = pipeline(&oracle).run(&input, &output, None).await;
    assert!(result.is_success());
    assert_eq!(oracle.calls(), 2);

    let before = archive_entries(&fs::read(&input).unwrap());
    let after = archive_entries(&fs::read(&output).unwrap());
    assert_eq!(before, after);
}

#[tokio::test]
async fn missing_input_fails_without_output_or_progress() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("does-not-exist.docx");
    let output = dir.path().join("out.docx");
    let oracle = ScriptedOracle::new(|_| Ok("unused".to_string()));

    let (result, events) = run_with_progress(&pipeline(&oracle), &input, &output).await;
    match &result {
        RunResult::Failure(message) => assert!(message.starts_with("failed to load document")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(events.is_empty());
    assert!(!output.exists());
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn whitespace_response_keeps_the_paragraph() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["ڈاکومنٹ (document) محفوظ کریں"]);
    let output = dir.path().join("out.docx");
    let oracle = ScriptedOracle::new(|_| Ok("  \n\t ".to_string()));

    let result = pipeline(&oracle).run(&input, &output, None).await;
    assert!(result.is_success());
    let annotated = Document::load(&output).unwrap();
    assert_eq!(
        paragraph_texts(&annotated),
        vec!["ڈاکومنٹ (document) محفوظ کریں"]
    );
}

#[tokio::test]
async fn only_rewritten_paragraphs_change_in_the_package() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["پہلا پیراگراف", "کمپیوٹر (computer)"]);
    let output = dir.path().join("out.docx");
    let oracle = ScriptedOracle::new(|_| Ok("[[کمپیوٹر]] (computer) {{شمارندہ}}".to_string()));

    let result = pipeline(&oracle).run(&input, &output, None).await;
    assert!(result.is_success());

    let before = archive_entries(&fs::read(&input).unwrap());
    let after = archive_entries(&fs::read(&output).unwrap());
    let names = |entries: &[(String, Vec<u8>)]| {
        entries.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&before), names(&after));
    for ((name, old), (_, new)) in before.iter().zip(after.iter()) {
        if name == "word/document.xml" {
            let new = String::from_utf8(new.clone()).unwrap();
            assert!(new.contains(
                r#"<w:p><w:pPr><w:bidi/></w:pPr><w:r><w:rPr><w:rtl/></w:rPr><w:t xml:space="preserve">پہلا پیراگراف</w:t></w:r></w:p>"#
            ));
            assert!(new.contains(
                r#"<w:r><w:rPr><w:rtl/></w:rPr><w:t xml:space="preserve">[[کمپیوٹر]] (computer) {{شمارندہ}}</w:t></w:r>"#
            ));
            assert!(new.ends_with(
                r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#
            ));
        } else {
            assert_eq!(old, new, "entry {name} changed");
        }
    }
}

#[tokio::test]
async fn second_pass_over_annotated_output_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["سکول (school)"]);
    let first = dir.path().join("first.docx");
    let second = dir.path().join("second.docx");
    // an oracle that annotates once and echoes already-annotated text
    let oracle = ScriptedOracle::new(|paragraph| {
        if paragraph.contains("[[") {
            Ok(paragraph.to_string())
        } else {
            Ok("[[سکول]] (school) {{مدرسہ/درسگاہ}}".to_string())
        }
    });

    assert!(pipeline(&oracle).run(&input, &first, None).await.is_success());
    assert!(pipeline(&oracle).run(&first, &second, None).await.is_success());
    assert_eq!(
        archive_entries(&fs::read(&first).unwrap()),
        archive_entries(&fs::read(&second).unwrap())
    );
    assert_eq!(
        oracle.paragraphs_seen(),
        vec!["سکول (school)", "[[سکول]] (school) {{مدرسہ/درسگاہ}}"]
    );
}

#[tokio::test]
async fn non_candidates_are_never_sent() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["بغیر قوسین", "   ", "", "صرف ( ایک"]);
    let output = dir.path().join("out.docx");
    let oracle = ScriptedOracle::new(|_| Ok("unused".to_string()));

    let (result, events) = run_with_progress(&pipeline(&oracle), &input, &output).await;
    assert!(result.is_success());
    assert_eq!(oracle.calls(), 0);
    assert_eq!(events, vec![0, 25, 50, 75, 100]);
}

#[tokio::test]
async fn progress_for_empty_and_single_paragraph_documents() {
    let dir = tempfile::tempdir().unwrap();
    let oracle = ScriptedOracle::new(|_| Ok("[[a]] (b) {{c}}".to_string()));

    let empty = write_input(dir.path(), &[]);
    let (result, events) =
        run_with_progress(&pipeline(&oracle), &empty, &dir.path().join("empty.docx")).await;
    assert!(result.is_success());
    assert_eq!(events, vec![100]);

    let single = dir.path().join("single.docx");
    fs::write(&single, docx_with_paragraphs(&["a (b)"])).unwrap();
    let (result, events) =
        run_with_progress(&pipeline(&oracle), &single, &dir.path().join("single_out.docx")).await;
    assert!(result.is_success());
    assert_eq!(events, vec![0, 100]);
}

#[tokio::test]
async fn progress_is_monotonic_for_many_paragraphs() {
    let dir = tempfile::tempdir().unwrap();
    let texts = (0..7)
        .map(|i| if i % 2 == 0 { format!("لفظ {i} (word)") } else { format!("سطر {i}") })
        .collect::<Vec<_>>();
    let refs = texts.iter().map(String::as_str).collect::<Vec<_>>();
    let input = write_input(dir.path(), &refs);
    let oracle = ScriptedOracle::new(|paragraph| Ok(format!("[[{paragraph}]]")));

    let (result, events) =
        run_with_progress(&pipeline(&oracle), &input, &dir.path().join("out.docx")).await;
    assert!(result.is_success());
    assert_eq!(events.len(), 8);
    assert!(events.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(events.last(), Some(&100));
    assert_eq!(oracle.calls(), 4);
}

#[tokio::test]
async fn failed_save_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["ہیلو (hello)"]);
    let output = dir.path().join("missing-dir").join("out.docx");
    let oracle = ScriptedOracle::new(|_| Ok("[[ہیلو]] (hello) {{سلام}}".to_string()));

    let result = pipeline(&oracle).run(&input, &output, None).await;
    match &result {
        RunResult::Failure(message) => {
            assert!(message.starts_with("annotation finished but saving failed"))
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!output.exists());
}

#[tokio::test]
async fn output_equal_to_input_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &["ہیلو (hello)"]);
    let original = fs::read(&input).unwrap();
    let oracle = ScriptedOracle::new(|_| Ok("[[ہیلو]] (hello) {{سلام}}".to_string()));

    let result = pipeline(&oracle).run(&input, &input, None).await;
    assert!(!result.is_success());
    assert_eq!(fs::read(&input).unwrap(), original);
}

#[tokio::test]
async fn non_docx_input_is_a_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.docx");
    fs::write(&input, "just some text").unwrap();
    let output = dir.path().join("out.docx");
    let oracle = ScriptedOracle::new(|_| Ok("unused".to_string()));

    let result = pipeline(&oracle).run(&input, &output, None).await;
    assert!(result.message().starts_with("failed to load document"));
    assert!(!output.exists());
}
