#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anifin_engine::{DownloadError, FetchTool, ToolLine, ToolRequest};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn shell(script: &str) -> FetchTool {
    FetchTool::new("sh").with_leading_args(["-c", script, "fetch-tool"])
}

fn request(output: PathBuf) -> ToolRequest {
    ToolRequest {
        url: "https://cdn.example/ep.m3u8".into(),
        output,
        quality: None,
        format: None,
    }
}

#[tokio::test]
async fn output_lines_reach_the_sink_and_args_are_passed() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("ep.mp4");
    let tool = shell(
        r#"printf '%s\n' "$@" > "$3.args"
echo "[info] ignored"
echo "[download]  50.0% of 1MiB"
echo "[Merger] Merging formats"
echo "WARNING: throttled" >&2
touch "$3""#,
    );
    let lines = Mutex::new(Vec::new());

    tool.run(
        &request(output.clone()),
        |line| lines.lock().unwrap().push(line),
        &CancellationToken::new(),
    )
    .await
    .expect("tool succeeds");

    assert!(output.exists());
    let mut seen = lines.into_inner().unwrap();
    // stdout and stderr interleave nondeterministically.
    seen.sort_by_key(|line| format!("{line:?}"));
    assert_eq!(
        seen,
        vec![
            ToolLine::Merging,
            ToolLine::Progress("[download]  50.0% of 1MiB".into()),
            ToolLine::Warning("WARNING: throttled".into()),
        ]
    );

    let args = std::fs::read_to_string(tmp.path().join("ep.mp4.args")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(
        args,
        vec![
            "https://cdn.example/ep.m3u8",
            "-o",
            output.to_str().unwrap(),
            "--no-playlist",
            "--concurrent-fragments",
            "8",
            "--newline",
        ]
    );
}

#[tokio::test]
async fn non_zero_exit_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = shell("echo 'ERROR: 403' >&2; exit 3")
        .run(&request(tmp.path().join("x.mp4")), |_| {}, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        DownloadError::ToolExit { tool, code } => {
            assert_eq!(tool, "sh");
            assert_eq!(code, Some(3));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_program_is_a_launch_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = FetchTool::new("definitely-not-a-real-fetch-tool")
        .run(&request(tmp.path().join("x.mp4")), |_| {}, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::ToolLaunch { .. }), "{err}");
}

#[tokio::test]
async fn cancellation_kills_the_child() {
    let tmp = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = shell("exec sleep 30")
        .run(&request(tmp.path().join("x.mp4")), |_| {}, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::Cancelled), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn invalid_utf8_output_does_not_stall_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    // Well past the pipe buffer on both streams after the bad line.
    let tool = shell(
        r#"printf '[download] \377 bad bytes\n'
i=0
while [ $i -lt 4096 ]; do
  echo "[download]  $i of 4096 fragments"
  echo "WARNING: fragment $i retried" >&2
  i=$((i+1))
done
exit 0"#,
    );
    let progress = Mutex::new(Vec::new());
    let warnings = Mutex::new(0usize);

    let result = tokio::time::timeout(
        Duration::from_secs(30),
        tool.run(
            &request(tmp.path().join("x.mp4")),
            |line| match line {
                ToolLine::Progress(text) => progress.lock().unwrap().push(text),
                ToolLine::Warning(_) => *warnings.lock().unwrap() += 1,
                ToolLine::Merging => {}
            },
            &CancellationToken::new(),
        ),
    )
    .await
    .expect("run finishes once the tool exits");

    result.expect("tool succeeds");
    let progress = progress.into_inner().unwrap();
    assert_eq!(progress.len(), 4097);
    assert_eq!(progress[0], "[download] \u{FFFD} bad bytes");
    assert_eq!(*warnings.lock().unwrap(), 4096);
}
