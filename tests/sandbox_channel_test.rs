//! Integration tests for the sandboxed execution channel

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use concept_trainer::config::SandboxLimits;
use concept_trainer::sandbox::{
    ChannelState, Evaluation, ExecutionChannel, ExecutionResult, Interpreter, SandboxError,
};

/// Echoes the code back as output and counts evaluations
struct Counting {
    calls: Arc<AtomicUsize>,
}

impl Interpreter for Counting {
    fn evaluate(&mut self, code: &str) -> Evaluation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(code != "panic", "boom");
        match code.strip_prefix("fail:") {
            Some(error) => Evaluation {
                output: "partial".to_string(),
                error: Some(error.to_string()),
            },
            None => Evaluation {
                output: code.to_string(),
                error: None,
            },
        }
    }
}

fn counting() -> (Counting, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Counting {
            calls: Arc::clone(&calls),
        },
        calls,
    )
}

// ============================================================================
// Readiness handshake
// ============================================================================

#[tokio::test]
async fn test_run_before_ready_is_not_ready_and_skips_sandbox() {
    let (interpreter, calls) = counting();
    let (release, gate) = mpsc::channel::<()>();
    let channel = ExecutionChannel::spawn(move || {
        gate.recv().map_err(|e| e.to_string())?;
        Ok(interpreter)
    });

    assert_eq!(channel.state(), ChannelState::Initializing);
    let early = channel.run("hello", "c1").await;
    assert_eq!(
        early,
        ExecutionResult::InfrastructureError(SandboxError::NotReady)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    release.send(()).unwrap();
    assert_eq!(channel.ready().await, ChannelState::Ready);

    let result = channel.run("hello", "c1").await;
    assert_eq!(
        result,
        ExecutionResult::Success {
            output: "hello".to_string()
        }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_init_failure_is_sticky() {
    let channel = ExecutionChannel::spawn(|| Err::<Counting, _>("Failed to load".to_string()));

    assert_eq!(
        channel.ready().await,
        ChannelState::Failed("Failed to load".to_string())
    );
    for _ in 0..3 {
        assert_eq!(
            channel.run("print(1);", "c1").await,
            ExecutionResult::InfrastructureError(SandboxError::InitFailure(
                "Failed to load".to_string()
            ))
        );
    }
}

#[tokio::test]
async fn test_factory_panic_fails_channel() {
    let channel = ExecutionChannel::spawn(|| -> Result<Counting, String> {
        panic!("no interpreter today");
    });

    match channel.ready().await {
        ChannelState::Failed(reason) => assert!(reason.contains("no interpreter today")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

// ============================================================================
// Run semantics
// ============================================================================

#[tokio::test]
async fn test_user_failure_keeps_partial_output() {
    let (interpreter, _calls) = counting();
    let channel = ExecutionChannel::spawn(move || Ok(interpreter));
    channel.ready().await;

    let result = channel.run("fail:index out of range", "c1").await;

    assert_eq!(
        result,
        ExecutionResult::Failure {
            error: "index out of range".to_string(),
            output: "partial".to_string(),
        }
    );
    assert_eq!(channel.state(), ChannelState::Ready);
}

#[tokio::test]
async fn test_panicking_run_does_not_leave_ready() {
    let (interpreter, calls) = counting();
    let channel = ExecutionChannel::spawn(move || Ok(interpreter));
    channel.ready().await;

    match channel.run("panic", "c1").await {
        ExecutionResult::Failure { error, .. } => {
            assert!(error.starts_with("Execution error:"));
            assert!(error.contains("boom"));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    assert_eq!(channel.state(), ChannelState::Ready);
    assert!(channel.run("after", "c1").await.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_runs_are_correlated() {
    let (interpreter, _calls) = counting();
    let channel = Arc::new(ExecutionChannel::spawn(move || Ok(interpreter)));
    channel.ready().await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { (i, channel.run(&format!("run-{i}"), "c1").await) })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.await.unwrap();
        assert_eq!(result.output(), format!("run-{i}"));
    }
}

// ============================================================================
// Rhai interpreter end to end
// ============================================================================

#[tokio::test]
async fn test_rhai_channel_runs_code() {
    let channel = ExecutionChannel::rhai(SandboxLimits::default());
    assert_eq!(channel.ready().await, ChannelState::Ready);

    let result = channel.run("let answer = 6 * 7; print(answer);", "arith").await;
    assert_eq!(
        result,
        ExecutionResult::Success {
            output: "42\n".to_string()
        }
    );

    let broken = channel.run("let = ;", "arith").await;
    assert!(broken
        .message()
        .unwrap()
        .starts_with("Compilation error:"));
}

#[tokio::test]
async fn test_rhai_runaway_loop_is_a_user_failure() {
    let limits = SandboxLimits {
        max_operations: 50_000,
        ..SandboxLimits::default()
    };
    let channel = ExecutionChannel::rhai(limits);
    channel.ready().await;

    let result = channel.run("let x = 0; loop { x += 1; }", "loops").await;

    assert!(matches!(result, ExecutionResult::Failure { .. }));
    assert!(channel.run("print(1);", "loops").await.is_success());
}

#[tokio::test]
async fn test_rhai_print_flood_is_capped_failure() {
    let limits = SandboxLimits {
        max_output_size: 4_096,
        ..SandboxLimits::default()
    };
    let channel = ExecutionChannel::rhai(limits);
    channel.ready().await;

    let result = channel
        .run(r#"loop { print("spam spam spam"); }"#, "flood")
        .await;

    match result {
        ExecutionResult::Failure { output, error } => {
            assert!(!output.is_empty());
            assert!(output.len() <= 4_096);
            assert!(error.starts_with("Output limit exceeded"));
        }
        other => panic!("expected a capped failure, got {other:?}"),
    }
    assert!(channel.run("print(1);", "flood").await.is_success());
}
