mod common;

use common::{FakeInspector, FakeMarkdown, FakeRenderer, Fixture, Inspect, Render};
use office2md::pipeline::{protection_warning_message, INPUT_MISSING, NOT_OFFICE_FILE, NO_PDF_OUTPUT};
use office2md::{ConversionReporter, ConversionTask, ConverterConfig, TaskErrorKind, TaskStatus};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn open_document_completes() {
    let fx = Fixture::plain();
    let input = fx.touch("report.docx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.output_file, Some(fx.output_dir().join("report.md")));
    assert_eq!(
        std::fs::read_to_string(fx.output_dir().join("report.md")).unwrap(),
        "# report\n"
    );
    assert_eq!(task.pdf_artifacts.len(), 1);
    assert!(task.pdf_artifacts[0].ends_with("pdf/report/report.pdf"));
    assert!(task.error_kind.is_none());
    assert!(task.error_message.is_none());
    assert!(task.end_time.is_some());
}

#[tokio::test]
async fn encrypted_pdf_gets_placeholder_and_warning() {
    let fx = Fixture::new(
        FakeRenderer::default(),
        FakeInspector::default().with("secure.pdf", Inspect::Encrypted),
        FakeMarkdown::default(),
    );
    let input = fx.touch("secure.pptx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;

    assert_eq!(task.status, TaskStatus::Warning);
    assert_eq!(task.error_kind, Some(TaskErrorKind::ProtectionWarning));
    assert_eq!(task.error_message, Some(protection_warning_message()));
    assert_eq!(task.output_file, Some(fx.output_dir().join("secure.md")));

    let placeholder = std::fs::read_to_string(fx.output_dir().join("secure.md")).unwrap();
    assert!(placeholder.contains("Microsoft Information Protection"));
    assert!(placeholder.contains("secure.pptx"));
    assert_eq!(fx.markdown.call_count(), 0);
}

#[tokio::test]
async fn unwritable_placeholder_still_ends_in_warning() {
    let fx = Fixture::new(
        FakeRenderer::default(),
        FakeInspector::default().with("secure.pdf", Inspect::Encrypted),
        FakeMarkdown::default(),
    );
    let input = fx.touch("secure.pptx");
    // A directory where the placeholder file should go.
    std::fs::create_dir_all(fx.output_dir().join("secure.md")).unwrap();

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;

    assert_eq!(task.status, TaskStatus::Warning);
    assert_eq!(task.error_kind, Some(TaskErrorKind::ProtectionWarning));
    assert_eq!(task.error_message, Some(protection_warning_message()));
    assert_eq!(task.output_file, None);
    assert!(task.end_time.is_some());
    assert_eq!(fx.markdown.call_count(), 0);
}

#[tokio::test]
async fn rights_management_marker_gets_warning() {
    let fx = Fixture::new(
        FakeRenderer::default(),
        FakeInspector::default().with(
            "memo.pdf",
            Inspect::Pages(vec![
                Err("unreadable".into()),
                Ok("This document is protected by Azure Rights Management".into()),
            ]),
        ),
        FakeMarkdown::default(),
    );
    let input = fx.touch("memo.docx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;
    assert_eq!(task.status, TaskStatus::Warning);
    assert_eq!(fx.markdown.call_count(), 0);
}

#[tokio::test]
async fn render_error_is_recorded_verbatim() {
    let fx = Fixture::new(
        FakeRenderer::default().with("bad.xlsx", Render::Fail("soffice: source file could not be loaded".into())),
        FakeInspector::default(),
        FakeMarkdown::default(),
    );
    let input = fx.touch("bad.xlsx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_kind, Some(TaskErrorKind::RenderFailure));
    assert_eq!(
        task.error_message.as_deref(),
        Some("soffice: source file could not be loaded")
    );
    assert!(task.pdf_artifacts.is_empty());
    assert!(task.output_file.is_none());
    assert_eq!(fx.markdown.call_count(), 0);
    assert!(fx.inspector.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_render_result_fails() {
    let fx = Fixture::new(
        FakeRenderer::default().with("hollow.docx", Render::Empty),
        FakeInspector::default(),
        FakeMarkdown::default(),
    );
    let input = fx.touch("hollow.docx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some(NO_PDF_OUTPUT));
    assert_eq!(fx.markdown.call_count(), 0);
}

#[tokio::test]
async fn unsupported_extensions_are_skipped() {
    let fx = Fixture::plain();
    let pipeline = fx.pipeline();
    let existing = fx.touch("notes.txt");

    for input in [existing.as_path(), Path::new("/nowhere/scan.pdf"), Path::new("/nowhere/README")] {
        let task = pipeline.convert(input, &fx.output_dir()).await;
        assert_eq!(task.status, TaskStatus::Skipped, "input: {}", input.display());
        assert_eq!(task.error_kind, Some(TaskErrorKind::Validation));
        assert_eq!(task.error_message.as_deref(), Some(NOT_OFFICE_FILE));
    }
    assert_eq!(fx.renderer.call_count(), 0);
}

#[tokio::test]
async fn missing_input_fails_validation() {
    let fx = Fixture::plain();
    let task = fx
        .pipeline()
        .convert(&fx.input_dir().join("gone.docx"), &fx.output_dir())
        .await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_kind, Some(TaskErrorKind::Validation));
    assert_eq!(task.error_message.as_deref(), Some(INPUT_MISSING));
    assert_eq!(fx.renderer.call_count(), 0);
}

#[tokio::test]
async fn synthesis_error_keeps_artifacts() {
    let fx = Fixture::new(
        FakeRenderer::default(),
        FakeInspector::default(),
        FakeMarkdown::default().failing("deck.pdf", "429 Too Many Requests"),
    );
    let input = fx.touch("deck.pptx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_kind, Some(TaskErrorKind::SynthesisFailure));
    assert_eq!(task.error_message.as_deref(), Some("429 Too Many Requests"));
    assert!(task.output_file.is_none());
    assert!(task.pdf_artifacts[0].exists());
}

#[tokio::test]
async fn inspection_failure_does_not_block_conversion() {
    let fx = Fixture::new(
        FakeRenderer::default(),
        FakeInspector::default().with("odd.pdf", Inspect::Fail("xref table broken".into())),
        FakeMarkdown::default(),
    );
    let input = fx.touch("odd.docx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn only_first_artifact_is_checked_and_converted() {
    let fx = Fixture::new(
        FakeRenderer::default().with("sheets.xlsx", Render::Pdfs(3)),
        FakeInspector::default().with("sheets-2.pdf", Inspect::Encrypted),
        FakeMarkdown::default(),
    );
    let input = fx.touch("sheets.xlsx");

    let task = fx.pipeline().convert(&input, &fx.output_dir()).await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.pdf_artifacts.len(), 3);
    let inspected = fx.inspector.calls.lock().unwrap().clone();
    assert_eq!(inspected, vec![task.pdf_artifacts[0].clone()]);
    let converted = fx.markdown.calls.lock().unwrap().clone();
    assert_eq!(converted.len(), 1);
    assert_eq!(converted[0].0, task.pdf_artifacts[0]);
}

#[tokio::test]
async fn markdown_options_are_forwarded() {
    let fx = Fixture::plain();
    let input = fx.touch("plain.docx");
    let config = ConverterConfig::builder()
        .intermediate_dir(fx.intermediate_dir())
        .preserve_structure(false)
        .build()
        .unwrap();

    fx.pipeline_with(config).convert(&input, &fx.output_dir()).await;

    let calls = fx.markdown.calls.lock().unwrap();
    assert!(!calls[0].1.preserve_structure);
}

#[tokio::test]
async fn constructor_purges_previous_artifacts() {
    let fx = Fixture::plain();
    let stale = fx.intermediate_dir().join("pdf/old");
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("old.pdf"), b"%PDF").unwrap();

    let _pipeline = fx.pipeline();

    assert!(!stale.exists());
    assert!(fx.intermediate_dir().is_dir());
}

#[tokio::test]
async fn output_directory_is_created() {
    let fx = Fixture::plain();
    let input = fx.touch("report.docx");
    let nested = fx.output_dir().join("a/b");

    let task = fx.pipeline().convert(&input, &nested).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(nested.join("report.md").exists());
}

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl ConversionReporter for Counting {
    fn on_task_start(&self, _input: &Path) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_task_complete(&self, task: &ConversionTask) {
        assert!(task.status.is_terminal());
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn reporter_sees_every_task() {
    let fx = Fixture::plain();
    let counting = Arc::new(Counting::default());
    let pipeline = fx.pipeline().with_reporter(counting.clone());

    pipeline.convert(&fx.touch("a.docx"), &fx.output_dir()).await;
    pipeline.convert(Path::new("b.txt"), &fx.output_dir()).await;

    assert_eq!(counting.started.load(Ordering::SeqCst), 2);
    assert_eq!(counting.finished.load(Ordering::SeqCst), 2);
}
