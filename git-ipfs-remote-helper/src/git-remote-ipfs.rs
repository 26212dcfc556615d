use std::env;
use std::io;
use std::process;

use git_ipfs::{logger, version};
use git_ipfs_remote_helper::VERSION;

fn main() {
    let mut args = env::args();

    if args.nth(1).as_deref() == Some("--version") {
        if let Err(e) = version::print(io::stdout(), &VERSION) {
            eprintln!("fatal: {e}");
            process::exit(1);
        };
        process::exit(0);
    }

    if let Err(e) = logger::init() {
        eprintln!("warning: couldn't initialize logger: {e}");
    }

    match git_ipfs_remote_helper::run() {
        Ok(()) => process::exit(0),
        Err(err) => {
            log::error!(target: "remote-helper", "Closing on error: {err}");
            eprintln!("fatal: {err}");
            process::exit(err.exit_code());
        }
    }
}
