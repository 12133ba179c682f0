use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

fn shell() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pipeshell"));
    // Under an unsupported TERM such as "dumb" the line editor prints its
    // prompt to stdout; pin a supported one so stdout holds only output.
    cmd.env("TERM", "xterm");
    cmd
}

fn run_line(line: &str) -> Output {
    shell()
        .args(["-c", line])
        .stdin(Stdio::null())
        .output()
        .expect("failed to run pipeshell")
}

/// Feeds `script` to an interactive session on standard input.
fn run_script(script: &str) -> Output {
    let mut child = shell()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run pipeshell");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("cli_tests_{}_{name}", std::process::id()))
}

#[test]
fn echo_through_cat() {
    let output = run_line("echo hello | cat");
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "hello\n");
}

#[test]
fn three_stage_pipeline() {
    let output = run_line("printf b\\na\\nb\\n | sort | uniq");
    assert_eq!(stdout_of(&output), "a\nb\n");
}

#[test]
fn redirect_out_then_in() {
    let path = temp_path("redirect");
    let script = format!("echo hi > {p}\ncat < {p}\n", p = path.display());
    let output = run_script(&script);
    assert!(stdout_of(&output).starts_with("hi\n"), "stdout: {:?}", stdout_of(&output));
    let _ = std::fs::remove_file(path);
}

#[test]
fn blank_and_ampersand_lines_spawn_nothing() {
    for line in ["", "    ", "&"] {
        let output = run_line(line);
        assert!(output.status.success());
        assert!(output.stdout.is_empty());
        assert!(output.stderr.is_empty());
    }
}

#[test]
fn dangling_pipe_is_rejected() {
    let output = run_line("echo hi |");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(stderr_of(&output).contains("empty command"));
}

#[test]
fn missing_program_is_reported_and_loop_continues() {
    let output = run_script("definitely_not_a_program_4242\necho after\n");
    assert!(output.status.success());
    assert!(stderr_of(&output).contains("definitely_not_a_program_4242"));
    assert!(stdout_of(&output).contains("after\n"));
}

#[test]
fn missing_redirect_target_fails_only_that_stage() {
    let output = run_script("echo one > \necho two\n");
    assert!(stderr_of(&output).contains("missing file name after '>'"));
    assert!(stdout_of(&output).contains("two\n"));
}

#[test]
fn background_pipeline_returns_immediately() {
    let started = Instant::now();
    let status = shell()
        .args(["-c", "sleep 3 | sleep 3 | sleep 3 &"])
        .stdin(Stdio::null())
        // The background children keep these open; don't wait on them.
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn foreground_waits_for_completion() {
    let started = Instant::now();
    let output = run_line("sleep 1");
    assert!(output.status.success());
    assert!(started.elapsed() >= Duration::from_millis(900));
}

#[test]
fn history_lists_entered_lines() {
    let output = run_script("echo a\n\nhistory\nexit\necho never\n");
    let stdout = stdout_of(&output);
    assert!(stdout.contains("1  echo a\n2  history\n"), "stdout: {stdout:?}");
    assert!(!stdout.contains("never"));
}

#[test]
fn cd_to_missing_directory_reports_errno() {
    let output = run_line("cd /nonexistent/cli_tests");
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Error 2 ("));
}

#[test]
fn cd_changes_directory_for_later_commands() {
    let output = run_script("cd /\npwd\n");
    assert!(stdout_of(&output).starts_with("/\n"));
}

#[cfg(target_os = "linux")]
#[test]
fn no_descriptor_leaks_into_children() {
    fn parse_fds(stdout: &[u8]) -> Vec<u32> {
        let mut fds: Vec<u32> = String::from_utf8_lossy(stdout)
            .lines()
            .map(|l| l.trim().parse().unwrap())
            .collect();
        fds.sort_unstable();
        fds
    }

    // Whatever the test harness itself hands down is the baseline.
    let direct = Command::new("ls")
        .arg("/proc/self/fd")
        .stdout(Stdio::piped())
        .stdin(Stdio::null())
        .output()
        .unwrap();
    let baseline = parse_fds(&direct.stdout);

    let output = run_line("ls /proc/self/fd | cat | cat");
    let fds = parse_fds(&output.stdout);
    assert!(fds.contains(&0) && fds.contains(&1) && fds.contains(&2));
    assert_eq!(fds, baseline, "pipeline leaked descriptors");
}

#[cfg(unix)]
#[test]
fn interrupt_during_foreground_wait_is_survived() {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let mut child = shell()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"sleep 2\necho survived\n")
        .unwrap();

    sleep(Duration::from_millis(500));
    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("survived"));
}

#[cfg(unix)]
#[test]
fn interrupt_to_foreground_group_spares_background_jobs() {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    use std::os::unix::process::CommandExt;

    let marker = temp_path("bg_marker");
    let script = temp_path("bg_script.sh");
    let _ = std::fs::remove_file(&marker);
    std::fs::write(&script, format!("sleep 1\ntouch {}\n", marker.display())).unwrap();

    // The shell leads its own group, standing in for the terminal's
    // foreground group.
    let mut child = shell()
        .process_group(0)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let input = format!("sh {} &\nsleep 2\n", script.display());
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();

    sleep(Duration::from_millis(400));
    killpg(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();
    assert!(child.wait().unwrap().success());

    let deadline = Instant::now() + Duration::from_secs(5);
    while !marker.exists() && Instant::now() < deadline {
        sleep(Duration::from_millis(50));
    }
    assert!(marker.exists(), "background job did not survive the interrupt");
    let _ = std::fs::remove_file(marker);
    let _ = std::fs::remove_file(script);
}

#[cfg(unix)]
#[test]
fn pipe_exhaustion_abandons_the_rest_of_the_pipeline() {
    use std::os::unix::process::CommandExt;

    let mut cmd = shell();
    cmd.args(["--log-level", "debug"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Leaves room for the standard streams and one pipe, so the second
    // pipe of a longer pipeline can't be created.
    // SAFETY: only async-signal-safe calls between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            for fd in 3..1024 {
                libc::close(fd);
            }
            let limit = libc::rlimit {
                rlim_cur: 5,
                rlim_max: 5,
            };
            if libc::setrlimit(libc::RLIMIT_NOFILE, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    let mut child = cmd.spawn().unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"true | true | true | true\necho after\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let stderr = stderr_of(&output);
    assert!(stderr.contains("pipeshell: pipe: "), "stderr: {stderr:?}");
    assert!(stderr.contains("(1 stage(s) already started)"), "stderr: {stderr:?}");
    assert!(stderr.contains("left running in the background"), "stderr: {stderr:?}");
    assert!(stdout_of(&output).contains("after\n"));
    assert!(output.status.success());
}
