//! Integration tests that build projects and execute the generated pools.
//!
//! Every test builds into its own temporary directory and drives the pools
//! and the nexus as real processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use morloc_core::{BuildConfig, BuildOutput, Program, ProjectBuilder};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// A built project with automatic cleanup.
struct TestProject {
    temp_dir: TempDir,
    output: BuildOutput,
}

impl TestProject {
    fn build(lil: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let program = Program::from_lil(lil).expect("Failed to parse LIL");
        let config = BuildConfig {
            home: temp_dir.path().join("home"),
            nexus_path: temp_dir.path().join("manifold-nexus"),
            ..Default::default()
        };
        let output = ProjectBuilder::new(&program, &config)
            .build()
            .expect("Failed to build project");
        Self { temp_dir, output }
    }

    fn pool(&self, lang: &str) -> PathBuf {
        self.output.workspace.pool_path(lang)
    }

    /// Path of a scratch file the pool functions can write to.
    fn log(&self) -> PathBuf {
        self.temp_dir.path().join("calls.log")
    }

    fn call(&self, lang: &str, args: &[&str]) -> Output {
        Command::new(self.pool(lang))
            .args(args)
            .env("CALL_LOG", self.log())
            .output()
            .expect("Failed to run pool")
    }

    fn nexus(&self, args: &[&str]) -> Output {
        Command::new(&self.output.nexus)
            .args(args)
            .env("CALL_LOG", self.log())
            .output()
            .expect("Failed to run nexus")
    }

    fn calls(&self) -> usize {
        fs::read_to_string(self.log())
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn has_interpreter(name: &str) -> bool {
    which::which(name).is_ok()
}

// =============================================================================
// End to end
// =============================================================================

#[test]
fn test_hello_world_through_nexus() {
    let project = TestProject::build(
        "\
NSRC\tsh
    hello () {
        echo 'hello world'
    }
EMIT\tm0\tsh
FUNC\tm0\thello
",
    );

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "hello world\n");
}

#[test]
fn test_unknown_export_spawns_nothing() {
    let project = TestProject::build(
        "\
NSRC\tsh
    hello () {
        echo called >> \"$CALL_LOG\"
    }
EMIT\tm0\tsh
FUNC\tm0\thello
EXPT\tm0\tgreet
",
    );

    let output = project.nexus(&["nope"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("unknown command 'nope'"));
    assert_eq!(project.calls(), 0);
}

#[test]
fn test_pool_rejects_unknown_manifold() {
    let project = TestProject::build("EMIT\tm0\tsh\nFUNC\tm0\tdate\n");

    let output = project.call("sh", &["m7"]);
    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_parameters_reach_the_function() {
    let project = TestProject::build(
        "\
NSRC\tsh
    join () {
        echo \"$1+$2\"
    }
EMIT\tm0\tsh
FUNC\tm0\tjoin
TYPE\tm0\tString -> Int -> String
INPA\tm0\t0\t0
INPA\tm0\t1\t1
",
    );

    let output = project.nexus(&["main", "a b", "42"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "a b+42\n");
}

// =============================================================================
// Caching
// =============================================================================

fn counting_lil(cached: bool) -> String {
    let mut lil = String::from(
        "\
NSRC\tsh
    tick () {
        echo run >> \"$CALL_LOG\"
        echo \"$1-done\"
    }
EMIT\tm0\tsh
FUNC\tm0\ttick
TYPE\tm0\tString -> String
INPA\tm0\t0\t0
",
    );
    if cached {
        lil.push_str("CACH\tm0\tdatcache\n");
    }
    lil
}

#[test]
fn test_uncached_manifold_runs_every_time() {
    let project = TestProject::build(&counting_lil(false));

    for _ in 0..2 {
        let output = project.call("sh", &["m0", "a"]);
        assert_eq!(stdout(&output), "a-done\n");
    }
    assert_eq!(project.calls(), 2);
    assert!(!project.output.workspace.cache_dir.exists());
}

#[test]
fn test_cached_manifold_runs_once_per_key() {
    let project = TestProject::build(&counting_lil(true));

    let first = project.call("sh", &["m0", "a"]);
    let second = project.call("sh", &["m0", "a"]);
    assert_eq!(stdout(&first), "a-done\n");
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(project.calls(), 1);

    let other = project.call("sh", &["m0", "b"]);
    assert_eq!(stdout(&other), "b-done\n");
    assert_eq!(project.calls(), 2);

    // The transient artifact never outlives the call
    assert!(!project.output.workspace.root.join("m0_tmp").exists());
}

#[test]
fn test_cache_keys_do_not_collide() {
    // These two arguments share a 32-bit CRC
    let project = TestProject::build(&counting_lil(true));

    let first = project.call("sh", &["m0", "item-7437-data-58893603"]);
    let second = project.call("sh", &["m0", "item-21224-data-168072856"]);
    assert_eq!(stdout(&first), "item-7437-data-58893603-done\n");
    assert_eq!(stdout(&second), "item-21224-data-168072856-done\n");
    assert_eq!(project.calls(), 2);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_failed_validation_emits_fallback() {
    let project = TestProject::build(
        "\
NSRC\tsh
    compute () {
        echo computed >> \"$CALL_LOG\"
        echo computed
    }
    reject () {
        echo false
    }
    backup () {
        echo fallback
    }
EMIT\tm0\tsh
FUNC\tm0\tcompute
CHEK\tm0\tm1
FAIL\tm0\tm2
MESG\tm0\tinput rejected
EMIT\tm1\tsh
FUNC\tm1\treject
TYPE\tm1\tBool
EMIT\tm2\tsh
FUNC\tm2\tbackup
EXPT\tm0\tmain
",
    );

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "fallback\n");
    assert!(stderr(&output).contains("input rejected"));
    assert_eq!(project.calls(), 0);
}

#[test]
fn test_passing_validation_runs_function() {
    let project = TestProject::build(
        "\
NSRC\tsh
    compute () {
        echo computed
    }
    accept () {
        echo true
    }
EMIT\tm0\tsh
FUNC\tm0\tcompute
CHEK\tm0\tm1
EMIT\tm1\tsh
FUNC\tm1\taccept
TYPE\tm1\tBool
EXPT\tm0\tmain
",
    );

    let output = project.nexus(&["main"]);
    assert_eq!(stdout(&output), "computed\n");
}

// =============================================================================
// Uids
// =============================================================================

#[test]
fn test_uids_increase_within_a_pool() {
    // m0 references m2 twice; m2's entry hook reports m2's uid on stderr
    let project = TestProject::build(
        "\
EMIT\tm0\tsh
FUNC\tm0\techo
INPM\tm0\t0\tm2
INPM\tm0\t1\tm2
EMIT\tm1\tsh
FUNC\tm1\techo
INPA\tm1\t0\t0
EMIT\tm2\tsh
FUNC\tm2\techo
TYPE\tm2\tString -> String
INPP\tm2\t0\tx
HOOK\tm2\t0\tm1
EXPT\tm0\tmain
",
    );

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "x x\n");
    assert_eq!(stderr(&output), "1\n2\n");
}

// =============================================================================
// Cross-language calls
// =============================================================================

#[test]
fn test_failed_foreign_call_yields_absent() {
    let project = TestProject::build(
        "\
NSRC\tsh
    wrap () {
        echo \"got:$1\"
    }
EMIT\tm0\tsh
FUNC\tm0\twrap
INPM\tm0\t0\tm1
EMIT\tm1\tpy
FUNC\tm1\tno_such_function
EXPT\tm0\tmain
",
    );

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "got:\n");
}

#[test]
fn test_sh_calls_py() {
    if !has_interpreter("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }

    let project = TestProject::build(
        "\
NSRC\tsh
    wrap () {
        echo \"got:$1\"
    }
EMIT\tm0\tsh
FUNC\tm0\twrap
INPM\tm0\t0\tm1
EMIT\tm1\tpy
FUNC\tm1\tlen
TYPE\tm1\tString -> Int
INPP\tm1\t0\thello
EXPT\tm0\tmain
",
    );

    // Same result as piping the py pool by hand
    let direct = project.call("py", &["m1"]);
    assert_eq!(stdout(&direct), "5\n");

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "got:5\n");
}

#[test]
fn test_foreign_results_keep_trailing_blank_lines() {
    if !has_interpreter("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }

    // One newline terminates the pool output, the rest belong to the value
    let project = TestProject::build(
        "\
NSRC\tsh
    wrap () {
        printf 'got:%s|' \"$1\"
    }
    lines () {
        printf 'b\\n\\n\\n'
    }
EMIT\tm0\tsh
FUNC\tm0\twrap
INPM\tm0\t0\tm1
EMIT\tm1\tpy
FUNC\tm1\ttrail
EMIT\tm2\tpy
FUNC\tm2\tlen
TYPE\tm2\tString -> Int
INPM\tm2\t0\tm3
EMIT\tm3\tsh
FUNC\tm3\tlines
NSRC\tpy
    def trail():
        return \"a\\n\\n\"
EXPT\tm0\tsh_side
EXPT\tm2\tpy_side
",
    );

    let output = project.nexus(&["sh_side"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "got:a\n\n|");

    let output = project.nexus(&["py_side"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "3\n");
}

#[test]
fn test_py_composite_roundtrip() {
    if !has_interpreter("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }

    let project = TestProject::build(
        "\
EMIT\tm0\tpy
FUNC\tm0\tsorted
TYPE\tm0\t[Int] -> [Int]
INPA\tm0\t0\t0
",
    );

    let output = project.nexus(&["main", "[3,1,2]"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "[1,2,3]\n");
}

// =============================================================================
// Python pools
// =============================================================================

const PY_SOURCE: &str = "\
NSRC\tpy
    import os

    def tick(x):
        with open(os.environ[\"CALL_LOG\"], \"a\") as f:
            f.write(\"run\\n\")
        return x + \"-done\"

    def compute():
        with open(os.environ[\"CALL_LOG\"], \"a\") as f:
            f.write(\"run\\n\")
        return \"computed\"

    def reject():
        return False

    def backup():
        return \"fallback\"

    def ident(x):
        return x

    def pair(a, b):
        return a + \" \" + b
";

#[test]
fn test_py_cached_manifold_runs_once_per_key() {
    if !has_interpreter("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }

    let project = TestProject::build(&format!(
        "{PY_SOURCE}\
EMIT\tm0\tpy
FUNC\tm0\ttick
TYPE\tm0\tString -> String
INPA\tm0\t0\t0
CACH\tm0\tdatcache
"
    ));

    let first = project.call("py", &["m0", "a"]);
    let second = project.call("py", &["m0", "a"]);
    assert_eq!(stdout(&first), "a-done\n", "stderr: {}", stderr(&first));
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(project.calls(), 1);

    let other = project.call("py", &["m0", "b"]);
    assert_eq!(stdout(&other), "b-done\n");
    assert_eq!(project.calls(), 2);
    assert!(!project.output.workspace.root.join("m0_tmp").exists());
}

#[test]
fn test_py_failed_validation_emits_fallback() {
    if !has_interpreter("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }

    let project = TestProject::build(&format!(
        "{PY_SOURCE}\
EMIT\tm0\tpy
FUNC\tm0\tcompute
CHEK\tm0\tm1
FAIL\tm0\tm2
MESG\tm0\tinput rejected
EMIT\tm1\tpy
FUNC\tm1\treject
TYPE\tm1\tBool
EMIT\tm2\tpy
FUNC\tm2\tbackup
EXPT\tm0\tmain
"
    ));

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "fallback\n");
    assert!(stderr(&output).contains("input rejected"));
    assert_eq!(project.calls(), 0);
}

#[test]
fn test_py_uids_increase_within_a_pool() {
    if !has_interpreter("python3") {
        eprintln!("python3 not found, skipping");
        return;
    }

    let project = TestProject::build(&format!(
        "{PY_SOURCE}\
EMIT\tm0\tpy
FUNC\tm0\tpair
INPM\tm0\t0\tm2
INPM\tm0\t1\tm2
EMIT\tm1\tpy
FUNC\tm1\tident
INPA\tm1\t0\t0
EMIT\tm2\tpy
FUNC\tm2\tident
TYPE\tm2\tString -> String
INPP\tm2\t0\tx
HOOK\tm2\t0\tm1
EXPT\tm0\tmain
"
    ));

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "x x\n");
    assert_eq!(stderr(&output), "1\n2\n");
}

// =============================================================================
// R pools
// =============================================================================

const R_SOURCE: &str = "\
NSRC\tR
    tick <- function(x) {
        cat(\"run\\n\", file = Sys.getenv(\"CALL_LOG\"), append = TRUE)
        paste0(x, \"-done\")
    }

    compute <- function() {
        cat(\"run\\n\", file = Sys.getenv(\"CALL_LOG\"), append = TRUE)
        \"computed\"
    }

    reject <- function() FALSE

    backup <- function() \"fallback\"

    hello <- function() \"hello world\"

    tenths <- function() 0.1 + 0.2
";

#[test]
fn test_r_hello_world_through_nexus() {
    if !has_interpreter("Rscript") {
        eprintln!("Rscript not found, skipping");
        return;
    }

    let project = TestProject::build(&format!(
        "{R_SOURCE}\
EMIT\tm0\tR
FUNC\tm0\thello
"
    ));

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "hello world\n");
}

#[test]
fn test_r_num_keeps_full_precision() {
    if !has_interpreter("Rscript") {
        eprintln!("Rscript not found, skipping");
        return;
    }

    let project = TestProject::build(&format!(
        "{R_SOURCE}\
EMIT\tm0\tR
FUNC\tm0\ttenths
TYPE\tm0\tNum
EXPT\tm0\tsum
"
    ));

    let output = project.nexus(&["sum"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "0.30000000000000004\n");
}

#[test]
fn test_r_cached_manifold_runs_once_per_key() {
    if !has_interpreter("Rscript") {
        eprintln!("Rscript not found, skipping");
        return;
    }

    let project = TestProject::build(&format!(
        "{R_SOURCE}\
EMIT\tm0\tR
FUNC\tm0\ttick
TYPE\tm0\tString -> String
INPA\tm0\t0\t0
CACH\tm0\tdatcache
"
    ));

    let first = project.call("R", &["m0", "a"]);
    let second = project.call("R", &["m0", "a"]);
    assert_eq!(stdout(&first), "a-done\n", "stderr: {}", stderr(&first));
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(project.calls(), 1);

    let other = project.call("R", &["m0", "b"]);
    assert_eq!(stdout(&other), "b-done\n");
    assert_eq!(project.calls(), 2);
}

#[test]
fn test_r_failed_validation_emits_fallback() {
    if !has_interpreter("Rscript") {
        eprintln!("Rscript not found, skipping");
        return;
    }

    let project = TestProject::build(&format!(
        "{R_SOURCE}\
EMIT\tm0\tR
FUNC\tm0\tcompute
CHEK\tm0\tm1
FAIL\tm0\tm2
MESG\tm0\tinput rejected
EMIT\tm1\tR
FUNC\tm1\treject
TYPE\tm1\tBool
EMIT\tm2\tR
FUNC\tm2\tbackup
EXPT\tm0\tmain
"
    ));

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "fallback\n");
    assert!(stderr(&output).contains("input rejected"));
    assert_eq!(project.calls(), 0);
}

#[test]
fn test_r_uids_increase_within_a_pool() {
    if !has_interpreter("Rscript") {
        eprintln!("Rscript not found, skipping");
        return;
    }

    let project = TestProject::build(
        "\
EMIT\tm0\tR
FUNC\tm0\tpaste
INPM\tm0\t0\tm2
INPM\tm0\t1\tm2
EMIT\tm1\tR
FUNC\tm1\tidentity
INPA\tm1\t0\t0
EMIT\tm2\tR
FUNC\tm2\tidentity
TYPE\tm2\tString -> String
INPP\tm2\t0\tx
HOOK\tm2\t0\tm1
EXPT\tm0\tmain
",
    );

    let output = project.nexus(&["main"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "x x\n");
    assert_eq!(stderr(&output), "1\n2\n");
}

#[test]
fn test_pools_are_executable() {
    let project = TestProject::build("EMIT\tm0\tsh\nFUNC\tm0\tdate\n");
    assert!(is_executable(&project.pool("sh")));
    assert!(is_executable(&project.output.nexus));
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.exists()
}
