// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cascade_core::Story;

#[test]
fn assistant_text_blocks_accumulate() {
    let backend = StreamingCliBackend::new("claude-code", "claude");
    let mut state = StreamState::default();

    let event = serde_json::json!({
        "type": "assistant",
        "message": { "content": [
            { "type": "text", "text": "first" },
            { "type": "tool_use", "name": "read_file", "input": {"path": "a.rs"} },
        ]}
    });
    backend.handle_event(&event, &mut state);

    assert_eq!(state.output_lines, vec!["first"]);
    assert_eq!(state.tool_calls.len(), 1);
    assert_eq!(state.tool_calls[0].name, "read_file");
}

#[test]
fn result_event_sets_final_and_session() {
    let backend = StreamingCliBackend::new("claude-code", "claude");
    let mut state = StreamState::default();

    let event = serde_json::json!({
        "type": "result",
        "result": "final text",
        "session_id": "sess-42"
    });
    backend.handle_event(&event, &mut state);

    assert_eq!(state.final_result.as_deref(), Some("final text"));
    assert_eq!(state.session_id.as_deref(), Some("sess-42"));
    // Empty output so far: result text becomes the output
    assert_eq!(state.output_lines, vec!["final text"]);
}

#[test]
fn result_text_does_not_duplicate_existing_output() {
    let backend = StreamingCliBackend::new("claude-code", "claude");
    let mut state = StreamState::default();
    state.output_lines.push("already here".to_string());

    let event = serde_json::json!({ "type": "result", "result": "summary" });
    backend.handle_event(&event, &mut state);
    assert_eq!(state.output_lines, vec!["already here"]);
    assert_eq!(state.final_result.as_deref(), Some("summary"));
}

#[test]
fn callbacks_receive_deltas() {
    use parking_lot::Mutex;
    use std::sync::Arc;

    let texts = Arc::new(Mutex::new(Vec::new()));
    let thinks = Arc::new(Mutex::new(Vec::new()));
    let texts_cb = texts.clone();
    let thinks_cb = thinks.clone();

    let backend = StreamingCliBackend::new("claude-code", "claude").with_callbacks(StreamCallbacks {
        on_text: Some(Arc::new(move |t: &str| texts_cb.lock().push(t.to_string()))),
        on_thinking: Some(Arc::new(move |t: &str| thinks_cb.lock().push(t.to_string()))),
        on_tool_call: None,
    });
    let mut state = StreamState::default();

    backend.handle_event(
        &serde_json::json!({
            "type": "stream_event",
            "event": { "delta": { "type": "text_delta", "text": "chunk" } }
        }),
        &mut state,
    );
    backend.handle_event(
        &serde_json::json!({
            "type": "stream_event",
            "event": { "delta": { "type": "thinking_delta", "thinking": "hmm" } }
        }),
        &mut state,
    );

    assert_eq!(texts.lock().as_slice(), &["chunk".to_string()]);
    assert_eq!(thinks.lock().as_slice(), &["hmm".to_string()]);
}

#[test]
fn unknown_event_types_are_ignored() {
    let backend = StreamingCliBackend::new("claude-code", "claude");
    let mut state = StreamState::default();
    backend.handle_event(&serde_json::json!({"type": "message_stop"}), &mut state);
    backend.handle_event(&serde_json::json!({"no_type": true}), &mut state);
    assert!(state.output_lines.is_empty());
    assert!(state.tool_calls.is_empty());
}

#[cfg(unix)]
mod unix {
    use super::*;
    use crate::{Backend, ExecutionContext};
    use tempfile::TempDir;

    #[tokio::test]
    async fn executes_a_stream_emitting_script() {
        let dir = TempDir::new().unwrap();
        // A stand-in CLI that emits two JSON events and exits 0. The
        // prompt arrives as the final argument and is ignored.
        let script = dir.path().join("fake-cli.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             echo '{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"working\"}]}}'\n\
             echo '{\"type\":\"result\",\"result\":\"all done\",\"session_id\":\"sess-1\"}'\n",
        )
        .unwrap();
        #[allow(clippy::expect_used)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
        }

        let backend = StreamingCliBackend::new("claude-code", script.to_string_lossy());
        let story = Story::new("story-001", "stream test");
        let result = backend
            .execute(&story, &ExecutionContext::new(dir.path()))
            .await;

        assert!(result.success);
        assert!(result.output.contains("working"));
        assert_eq!(backend.session_id().as_deref(), Some("sess-1"));
        assert_eq!(result.metadata["final_result"], "all done");
    }

    #[tokio::test]
    async fn missing_cli_reports_command_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = StreamingCliBackend::new("claude-code", "not-a-real-cli-xyz");
        let story = Story::new("story-001", "nope");
        let result = backend
            .execute(&story, &ExecutionContext::new(dir.path()))
            .await;
        assert!(!result.success);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .starts_with("Command not found"));
    }
}
