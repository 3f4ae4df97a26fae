mod common;

use common::{harness, stdout, ChunkedServer, MockFileServer, RecordingExecutor};
use scriptlog_core::errors::ExecutorError;
use scriptlog_core::executors::ExecutionResult;
use scriptlog_core::output::OutputRouter;
use scriptlog_core::pipeline::{PipelineOutcome, Stage, NO_CODE_MESSAGE};
use scriptlog_core::settings::Toggle;
use scriptlog_core::source::SourceShape;
use scriptlog_core::transport::{Attachment, CollectedReply, CollectingSink};

fn attachment(url: String) -> Attachment {
    Attachment {
        url,
        filename: Some("script.lua".to_string()),
    }
}

#[tokio::test]
async fn test_plain_text_runs_inline_with_caller_settings() {
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;
    h.store.set("alice", "minifier", true).await.unwrap();

    let sink = CollectingSink::new();
    let outcome = h.pipeline.run("alice", " print('hi') ", &[], &sink).await;

    assert_eq!(
        outcome,
        PipelineOutcome::Delivered {
            shape: SourceShape::PlainText,
            inline: true
        }
    );
    assert_eq!(
        sink.into_replies(),
        vec![CollectedReply::Text("```lua\nprint('hi')\n```".to_string())]
    );

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].code, "print('hi')");
    let env = calls[0].environment();
    assert!(env.contains(&("SETTING_MINIFIER".to_string(), "1".to_string())));
    assert!(env.contains(&("SETTING_HOOKOP".to_string(), "0".to_string())));
    assert!(env.contains(&("SETTING_EXPLORE_FUNCS".to_string(), "1".to_string())));
}

#[tokio::test]
async fn test_fenced_block_strips_language_tag() {
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h
        .pipeline
        .run("bob", "```lua\nlocal x = 1\nprint(x)\n```", &[], &sink)
        .await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Delivered {
            shape: SourceShape::FencedBlock,
            ..
        }
    ));
    assert_eq!(executor.calls()[0].code, "local x = 1\nprint(x)");
}

#[tokio::test]
async fn test_url_payload_is_fetched() {
    let server = MockFileServer::start(&[("remote.lua", "print('remote')")]).await;
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h
        .pipeline
        .run("carol", &server.url("remote.lua"), &[], &sink)
        .await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Delivered {
            shape: SourceShape::Url,
            ..
        }
    ));
    assert_eq!(executor.calls()[0].code, "print('remote')");

    server.shutdown().await;
}

#[tokio::test]
async fn test_attachment_wins_over_message_text() {
    let server = MockFileServer::start(&[("attached.lua", "print('attached')")]).await;
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h
        .pipeline
        .run(
            "dave",
            "```lua\nprint('inline')\n```",
            &[attachment(server.url("attached.lua"))],
            &sink,
        )
        .await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Delivered {
            shape: SourceShape::Attachment,
            ..
        }
    ));
    assert_eq!(executor.calls()[0].code, "print('attached')");

    server.shutdown().await;
}

#[tokio::test]
async fn test_failed_attachment_does_not_fall_back() {
    let server = MockFileServer::start(&[]).await;
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h
        .pipeline
        .run(
            "erin",
            "print('fallback')",
            &[attachment(server.url("gone.lua"))],
            &sink,
        )
        .await;

    match outcome {
        PipelineOutcome::Failed { stage, reason } => {
            assert_eq!(stage, Stage::Fetching);
            assert!(reason.starts_with("Error reading attachment: HTTP 404"), "{}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(executor.calls().is_empty());

    let replies = sink.into_replies();
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], CollectedReply::Text(t) if t.starts_with("Error reading attachment:")));

    server.shutdown().await;
}

#[tokio::test]
async fn test_failed_url_reports_fetch_error() {
    let server = MockFileServer::start(&[]).await;
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h
        .pipeline
        .run("frank", &server.url("missing.lua"), &[], &sink)
        .await;

    assert!(matches!(
        &outcome,
        PipelineOutcome::Failed { stage: Stage::Fetching, reason } if reason.starts_with("Error fetching URL:")
    ));
    assert!(executor.calls().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_chunked_body_is_cut_off() {
    // 64 MiB offered against the harness cap of 64 KiB.
    let server = ChunkedServer::start(64 * 1024, 1024).await;
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let url = server.url();
    let outcome = h.pipeline.run("nora", &url, &[], &sink).await;

    assert_eq!(
        outcome,
        PipelineOutcome::Failed {
            stage: Stage::Fetching,
            reason: format!("Error fetching URL: response from {} exceeds 65536 bytes", url),
        }
    );
    assert!(executor.calls().is_empty());

    let written = server.bytes_written().await;
    assert!(written < 16 * 1024 * 1024, "server pushed {} bytes", written);
}

#[tokio::test]
async fn test_empty_payload_asks_for_code() {
    for payload in ["", "   ", "```lua\n```"] {
        let executor = RecordingExecutor::echo();
        let h = harness(executor.clone(), OutputRouter::default()).await;

        let sink = CollectingSink::new();
        let outcome = h.pipeline.run("gina", payload, &[], &sink).await;

        assert_eq!(outcome, PipelineOutcome::NoCode, "payload {:?}", payload);
        assert_eq!(
            sink.into_replies(),
            vec![CollectedReply::Text(NO_CODE_MESSAGE.to_string())]
        );
        assert!(executor.calls().is_empty());
    }
}

#[tokio::test]
async fn test_timeout_sends_only_the_notice() {
    let executor = RecordingExecutor::new(|_| Ok(ExecutionResult::timed_out()));
    let h = harness(executor, OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h.pipeline.run("hank", "while true do end", &[], &sink).await;

    assert_eq!(
        outcome,
        PipelineOutcome::Failed {
            stage: Stage::Executing,
            reason: "Execution timed out (30s limit).".to_string()
        }
    );
    assert_eq!(
        sink.into_replies(),
        vec![CollectedReply::Text("Execution timed out (30s limit).".to_string())]
    );
}

#[tokio::test]
async fn test_long_output_becomes_file() {
    let executor = RecordingExecutor::new(|_| Ok(stdout(&"x".repeat(1900))));
    let h = harness(executor, OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h.pipeline.run("ivy", "print(1)", &[], &sink).await;

    assert_eq!(
        outcome,
        PipelineOutcome::Delivered {
            shape: SourceShape::PlainText,
            inline: false
        }
    );
    match &sink.into_replies()[..] {
        [CollectedReply::File {
            message,
            filename,
            bytes,
        }] => {
            assert_eq!(message, "✅ Reconstructed code (executable Lua):");
            assert_eq!(filename, "reconstructed.lua");
            assert_eq!(bytes.len(), 1900);
        }
        other => panic!("unexpected replies: {:?}", other),
    }
}

#[tokio::test]
async fn test_stderr_is_appended_after_marker() {
    let executor = RecordingExecutor::new(|_| {
        Ok(ExecutionResult {
            stdout: "out".to_string(),
            stderr: "warn".to_string(),
            exit_code: Some(0),
            timed_out: false,
        })
    });
    let h = harness(executor, OutputRouter::default()).await;

    let sink = CollectingSink::new();
    h.pipeline.run("jack", "print(1)", &[], &sink).await;

    assert_eq!(
        sink.into_replies(),
        vec![CollectedReply::Text(
            "```lua\nout\n-- STDERR --\nwarn\n```".to_string()
        )]
    );
}

#[tokio::test]
async fn test_engine_failure_with_output_is_routed_with_caption() {
    let executor = RecordingExecutor::new(|_| {
        Err(ExecutorError::ProcessFailed {
            exit_code: Some(2),
            stdout: String::new(),
            stderr: "syntax error near 'end'".to_string(),
        })
    });
    let h = harness(executor, OutputRouter::default()).await;

    let sink = CollectingSink::new();
    let outcome = h.pipeline.run("kim", "end end", &[], &sink).await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Failed {
            stage: Stage::Executing,
            ..
        }
    ));
    assert_eq!(
        sink.into_replies(),
        vec![CollectedReply::Text(
            "❌ Script engine exited with code 2:\n```lua\n\n-- STDERR --\nsyntax error near 'end'\n```"
                .to_string()
        )]
    );
}

#[tokio::test]
async fn test_missing_engine_reports_generic_error() {
    let executor = RecordingExecutor::new(|_| {
        Err(ExecutorError::EngineNotFound {
            searched: vec!["./lune".to_string(), "lune".to_string()],
        })
    });
    let h = harness(executor, OutputRouter::default()).await;

    let sink = CollectingSink::new();
    h.pipeline.run("lee", "print(1)", &[], &sink).await;

    match &sink.into_replies()[..] {
        [CollectedReply::Text(text)] => {
            assert!(text.starts_with("An error occurred: Script engine not found"), "{}", text);
        }
        other => panic!("unexpected replies: {:?}", other),
    }
}

#[tokio::test]
async fn test_settings_are_snapshotted_per_request() {
    let executor = RecordingExecutor::echo();
    let h = harness(executor.clone(), OutputRouter::default()).await;

    let sink = CollectingSink::new();
    h.pipeline.run("mia", "print(1)", &[], &sink).await;
    h.store.toggle("mia", Toggle::HookOp).await.unwrap();
    h.pipeline.run("mia", "print(2)", &[], &sink).await;

    let calls = executor.calls();
    assert!(!calls[0].settings.get(Toggle::HookOp));
    assert!(calls[1].settings.get(Toggle::HookOp));
}
