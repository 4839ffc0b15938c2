use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let commit = String::from_utf8_lossy(&out.stdout).trim().to_string();
            println!("cargo:rustc-env=GIT_COMMIT={}", commit);
        }
        Ok(out) => {
            println!("cargo:rustc-env=GIT_COMMIT=dev");
            println!(
                "cargo:warning=git rev-parse failed: {}",
                String::from_utf8_lossy(&out.stderr)
            );
        }
        Err(e) => {
            println!("cargo:rustc-env=GIT_COMMIT=dev");
            println!("cargo:warning=failed to run git: {}", e);
        }
    }
}
