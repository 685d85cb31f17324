use test_util::run_local;

#[test]
fn runs_commands_until_end_of_input() {
    let (code, out, _) = run_local(&["-q"], "echo hello\necho \"two  words\"\n");
    assert_eq!(code, 0);
    assert!(out.contains("hello\n"), "stdout: {out}");
    assert!(out.contains("two  words\n"), "stdout: {out}");
    assert!(out.starts_with("dsh4> "));
}

#[test]
fn pipeline_prints_last_stage_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("file.txt");
    std::fs::write(&path, b"a\nb\nc\nd\n").unwrap();
    let (_, out, _) = run_local(&["-q"], &format!("cat {} | wc -l\n", path.display()));
    assert!(out.lines().any(|l| l.trim_start_matches("dsh4> ").trim() == "4"), "stdout: {out}");
    assert!(!out.contains("a\nb\n"));
}

#[test]
fn exit_stops_the_loop() {
    let (code, out, _) = run_local(&["-q"], "echo before\nexit\necho after\n");
    assert_eq!(code, 0);
    assert!(out.contains("before\n"));
    assert!(out.contains("exiting...\n"));
    assert!(!out.contains("after"));
}

#[test]
fn exit_at_head_of_pipeline_also_exits() {
    let (_, out, _) = run_local(&["-q"], "exit | cat\necho after\n");
    assert!(out.contains("exiting...\n"));
    assert!(!out.contains("after"));
}

#[test]
fn cd_applies_to_later_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let canon = dir.path().canonicalize().unwrap();
    let (_, out, err) = run_local(&["-q"], &format!("cd {}\npwd\ncd /definitely/missing\n", canon.display()));
    assert!(out.contains(&format!("{}\n", canon.display())), "stdout: {out}");
    assert!(err.contains("cd: /definitely/missing: No such file or directory"), "stderr: {err}");
}

#[test]
fn diagnostics_for_bad_lines() {
    let deep = vec!["cat"; 9].join(" | ");
    let (code, out, err) = run_local(&["-q"], &format!("\n   \n{deep}\necho hi >\nls | | true\necho still\n"));
    assert_eq!(code, 0);
    assert_eq!(out.matches("warning: no commands provided\n").count(), 2, "stdout: {out}");
    assert!(out.contains("error: piping limited to 8 commands\n"));
    assert!(out.contains("error: redirection requires a target file\n"));
    assert!(err.contains("warning: empty pipeline segment ignored"), "stderr: {err}");
    assert!(out.contains("still\n"));
}

#[test]
fn overlong_line_is_rejected() {
    let long = format!("echo {}\n", "x".repeat(400));
    let (_, out, _) = run_local(&["-q"], &long);
    assert!(out.contains("error: command line too long\n"));
    assert!(!out.contains("xxxx"));
}

#[test]
fn overlong_line_is_skipped_whole() {
    let long = format!("echo {}\necho next\n", "y".repeat(100_000));
    let (code, out, _) = run_local(&["-q"], &long);
    assert_eq!(code, 0);
    assert_eq!(out.matches("error: command line too long\n").count(), 1, "stdout: {out}");
    assert!(out.contains("next\n"));
    assert!(!out.contains("yyyy"));
}

#[test]
fn non_utf8_arguments_reach_the_program() {
    use std::os::unix::ffi::OsStrExt;
    let dir = tempfile::tempdir().expect("tempdir");
    let name = std::ffi::OsStr::from_bytes(b"caf\xe9.txt");
    std::fs::write(dir.path().join(name), b"latin-1 name\n").unwrap();
    let mut script = b"cat ".to_vec();
    script.extend_from_slice(dir.path().join(name).as_os_str().as_bytes());
    script.push(b'\n');
    let (_, out, err) = run_local(&["-q"], &script);
    assert!(out.contains("latin-1 name\n"), "stdout: {out} stderr: {err}");
    assert!(err.is_empty(), "stderr: {err}");
}

#[test]
fn missing_program_reports_and_continues() {
    let (_, out, err) = run_local(&["-q"], "no-such-program-dsh arg\necho next\n");
    assert!(err.contains("no-such-program-dsh: No such file or directory"), "stderr: {err}");
    assert!(out.contains("next\n"));
}

#[test]
fn redirection_truncates_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_path = dir.path().join("out.txt");
    std::fs::write(&out_path, b"old contents that are long\n").unwrap();
    let (_, out, _) = run_local(&["-q"], &format!("echo fresh > {}\n", out_path.display()));
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "fresh\n");
    assert!(!out.contains("fresh"));
}

#[test]
fn buffer_view_follows_each_command() {
    let (_, out, _) = run_local(&[], "echo   hi\n");
    let expected = format!("Buffer:  [echo hi{}]", ".".repeat(50 - 7));
    assert!(out.contains(&expected), "stdout: {out}");
}

#[test]
fn remote_only_builtins_are_plain_commands_locally() {
    let (_, out, _) = run_local(&["-q"], "stop-server\necho alive\n");
    assert!(out.contains("alive\n"));
}
