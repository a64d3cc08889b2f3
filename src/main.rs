//! sessionkeeper main entrypoint.

use sessionkeeper::run;
use sessionkeeper::ui::messages;

fn main() {
    if let Err(e) = run() {
        messages::error(format!("Error: {}", e));
        std::process::exit(1);
    }
}
