use std::{env, env::VarError};

/// The server takes no arguments. Any argument at all prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Only these. Keys, secrets and client ids are never printed.
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "WL_HOST",
        "WL_PORT",
        "WL_DATABASE_URL",
        "WL_PUBLIC_URL",
        "WL_CURRENCY",
        "WL_UNPAID_ORDER_TIMEOUT",
        "WL_EXPIRY_CHECK_INTERVAL",
        "WL_STRIPE_API_URL",
        "WL_PAYPAL_API_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
