use std::fs;
use std::process::Command;

use tpcmask::{parse_directives, rewrite_file, RewriteOptions};

const GAUSSIAN: &str = "\
__global__ void Fan1(float *m) { }
__global__ void Fan2(float *m) { }

void run(float *m) {
    /* Fan1<<<1, 1>>>(m); */
    for (int t = 0; t < 3; t++) {
        Fan1<<<grid, block>>>(m);
        Fan2<<<grid, block>>>(m); // second
    }
}
";

fn tpcmask() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tpcmask"))
}

#[test]
fn test_rewrite_file_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gaussian.cu");
    let output = dir.path().join("partitioned.cu");
    fs::write(&input, GAUSSIAN).unwrap();

    let kernels = parse_directives(["Fan1:1-4", "Fan2:5,6"]).unwrap();
    let report = rewrite_file(&input, &output, &kernels, &RewriteOptions::default()).unwrap();
    assert!(report.unmatched.is_empty());
    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.lines, 10);

    let out = fs::read_to_string(&output).unwrap();
    insta::assert_snapshot!(out, @r###"
    #include <libsmctrl.h>
    // Use a constructor to call set_global_mask before any kernels can be launched
    class GlobalMaskSetter {
    public:
        GlobalMaskSetter() {
            libsmctrl_set_global_mask(~0x1ull);
        }
    };
    GlobalMaskSetter setter;
    __global__ void Fan1(float *m) { }
    __global__ void Fan2(float *m) { }

    void run(float *m) {
        /* Fan1<<<1, 1>>>(m); */
        for (int t = 0; t < 3; t++) {
            libsmctrl_set_next_mask(~0xfull);Fan1<<<grid, block>>>(m);
            libsmctrl_set_next_mask(~0x30ull);Fan2<<<grid, block>>>(m); // second
        }
    }
    "###);
}

#[test]
fn test_input_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gaussian.cu");
    let output = dir.path().join("out.cu");
    fs::write(&input, GAUSSIAN).unwrap();

    let kernels = parse_directives(["Fan1:2"]).unwrap();
    rewrite_file(&input, &output, &kernels, &RewriteOptions::default()).unwrap();
    assert_eq!(fs::read_to_string(&input).unwrap(), GAUSSIAN);
}

#[test]
fn test_missing_input_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let kernels = parse_directives(["k:1"]).unwrap();
    let err = rewrite_file(
        &dir.path().join("missing.cu"),
        &dir.path().join("out.cu"),
        &kernels,
        &RewriteOptions::default(),
    )
    .unwrap_err();
    assert!(err.message.starts_with("cannot read"));
    assert!(!dir.path().join("out.cu").exists());
}

#[test]
fn test_unwritable_output_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("k.cu");
    fs::write(&input, "k<<<1,1>>>();\n").unwrap();
    let kernels = parse_directives(["k:1"]).unwrap();
    let err = rewrite_file(
        &input,
        &dir.path().join("no_such_dir").join("out.cu"),
        &kernels,
        &RewriteOptions::default(),
    )
    .unwrap_err();
    assert!(err.message.starts_with("cannot write"));
}

// --- Binary ---

#[test]
fn test_cli_partition() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gaussian.cu");
    let output = dir.path().join("partitioned.cu");
    fs::write(&input, GAUSSIAN).unwrap();

    let result = tpcmask()
        .arg("partition")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-k", "Fan1:1-2", "Missing:3", "-v"])
        .output()
        .unwrap();
    assert!(result.status.success());

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("kernel call Fan1 found, line 7"));
    assert!(stderr.contains("Missing"));

    let out = fs::read_to_string(&output).unwrap();
    assert!(out.contains("libsmctrl_set_next_mask(~0x3ull);Fan1<<<grid, block>>>(m);"));
    assert!(!out.contains("~0x3ull);Fan2"));
}

#[test]
fn test_cli_bad_directive_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gaussian.cu");
    let output = dir.path().join("partitioned.cu");
    fs::write(&input, GAUSSIAN).unwrap();

    let result = tpcmask()
        .arg("partition")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-k", "Fan1:4-2"])
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
    assert!(!output.exists());
}

#[test]
fn test_cli_project_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gaussian.cu");
    fs::write(&input, GAUSSIAN).unwrap();
    fs::write(
        dir.path().join("tpcmask.toml"),
        "[rewrite]\noutput = \"masked.cu\"\nglobal = \"2\"\n\n[kernels]\nFan1 = \"1\"\nFan2 = \"1\"\n",
    )
    .unwrap();

    // Command-line directive overrides the project one for Fan2.
    let result = tpcmask()
        .arg("partition")
        .arg(&input)
        .args(["-k", "Fan2:3"])
        .output()
        .unwrap();
    assert!(result.status.success());

    let out = fs::read_to_string(dir.path().join("masked.cu")).unwrap();
    assert!(out.contains("libsmctrl_set_global_mask(~0x2ull);"));
    assert!(out.contains("libsmctrl_set_next_mask(~0x1ull);Fan1<<<"));
    assert!(out.contains("libsmctrl_set_next_mask(~0x4ull);Fan2<<<"));
}

#[test]
fn test_cli_refuses_to_overwrite_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gaussian.cu");
    fs::write(&input, GAUSSIAN).unwrap();

    let result = tpcmask()
        .arg("partition")
        .arg(&input)
        .arg("-o")
        .arg(&input)
        .args(["-k", "Fan1:1"])
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
    assert_eq!(fs::read_to_string(&input).unwrap(), GAUSSIAN);
}

#[test]
fn test_cli_mask() {
    let result = tpcmask().args(["mask", "1-2"]).output().unwrap();
    assert!(result.status.success());
    assert_eq!(String::from_utf8_lossy(&result.stdout), "~0x3ull\n");

    let result = tpcmask().args(["mask", "1,x"]).output().unwrap();
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn test_cli_bench_bad_partition_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("k.cu");
    let csv = dir.path().join("out.csv");
    fs::write(&source, "void run() { k<<<1, 1>>>(); }\n").unwrap();

    let result = tpcmask()
        .arg("bench")
        .arg(&source)
        .args(["-k", "k", "--partitions", "1", "3-1", "--runs", "1"])
        .args(["--command", "true", "--clean", "true"])
        .args(["--build", "echo built >> build.log"])
        .arg("--csv")
        .arg(&csv)
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
    assert!(!csv.exists());
    assert!(!dir.path().join("build.log").exists());
    assert!(!dir.path().join("k.cu.old").exists());
    assert!(String::from_utf8_lossy(&result.stderr).contains("3-1"));
}

#[test]
fn test_cli_bench_rejects_zero_runs() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("k.cu");
    let csv = dir.path().join("out.csv");
    fs::write(&source, "void run() { k<<<1, 1>>>(); }\n").unwrap();

    let result = tpcmask()
        .arg("bench")
        .arg(&source)
        .args(["-k", "k", "--partitions", "1", "--runs", "0"])
        .args(["--command", "true", "--clean", "true"])
        .args(["--build", "echo built >> build.log"])
        .arg("--csv")
        .arg(&csv)
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
    assert!(!csv.exists());
    assert!(!dir.path().join("build.log").exists());
}
