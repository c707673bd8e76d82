// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("quartermaster")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Declarative package state management")
        .subcommand(
            Command::new("list")
                .about("List packages or repositories")
                .arg(
                    Arg::new("args")
                        .required(true)
                        .num_args(1..)
                        .help("What to list: installed, upgrades, available, repositories, or package specs"),
                ),
        )
        .subcommand(
            Command::new("ensure")
                .about("Drive packages toward a desired state")
                .arg(
                    Arg::new("action")
                        .required(true)
                        .help("Desired state: present, latest, absent, or autoremove"),
                )
                .arg(
                    Arg::new("specs")
                        .num_args(0..)
                        .help("Package specs (names, globs, or NEVRA forms)"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("quartermaster.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
