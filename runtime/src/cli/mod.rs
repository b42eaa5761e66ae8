//! CLI subcommand implementations for the pod-alert binary.

pub mod doctor;
pub mod extract_cmd;
pub mod output;
pub mod run_cmd;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` directives extend the default
/// `pod_alert=info`.
pub fn init_tracing(json: bool) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "pod_alert=info".parse() {
        filter = filter.add_directive(directive);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = installed {
        eprintln!("tracing already initialized: {e}");
    }
}
